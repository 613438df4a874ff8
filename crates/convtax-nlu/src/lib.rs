//! Natural-language understanding for ConversationalTax.
//!
//! Wraps the Dialogflow detect-intent API behind the [`IntentDetector`] trait,
//! turns its loosely shaped responses into explicit optional types, and maps
//! client platforms to the audio settings Dialogflow expects.

pub mod audio;
pub mod detector;
pub mod dialogflow;
pub mod error;
pub mod mock;
pub mod response;

pub use audio::{encode_audio, AudioEncoding, AudioSettings};
pub use detector::IntentDetector;
pub use dialogflow::DialogflowClient;
pub use error::NluError;
pub use mock::{DetectCall, ScriptedDetector};
pub use response::{DetectIntentResponse, Intent, QueryParameters, QueryResult, StartDateParam};
