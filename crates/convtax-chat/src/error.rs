//! Error types for conversation handling.

use convtax_core::error::ConvTaxError;
use convtax_nlu::NluError;

/// Errors from the dispatcher and response composer.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("intent detection failed: {0}")]
    Nlu(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<ConvTaxError> for ChatError {
    fn from(err: ConvTaxError) -> Self {
        ChatError::Storage(err.to_string())
    }
}

impl From<NluError> for ChatError {
    fn from(err: NluError) -> Self {
        ChatError::Nlu(err.to_string())
    }
}

impl From<ChatError> for ConvTaxError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Nlu(msg) => ConvTaxError::Nlu(msg),
            ChatError::Storage(msg) => ConvTaxError::Storage(msg),
        }
    }
}
