//! ConversationalTax API crate - axum HTTP server and route handlers.
//!
//! Exposes text and audio intent endpoints for the mobile client, the
//! conversation history, user notifications and a health check.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
