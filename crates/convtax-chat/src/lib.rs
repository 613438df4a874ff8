//! Conversation handling for ConversationalTax.
//!
//! Turns recognized intents into contract mutations, picks the text shown to
//! the user and records every exchange in the conversation history.

pub mod composer;
pub mod dispatcher;
pub mod error;
pub mod explanation;

pub use composer::ResponseComposer;
pub use dispatcher::{Dispatcher, IntentKind, END_DATE_ERROR, NO_CONTRACTS, START_DATE_ERROR};
pub use error::ChatError;
pub use explanation::{ExplanationCatalog, ExplanationLookup};
