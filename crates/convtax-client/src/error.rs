//! Error types for the client core.

use convtax_core::error::ConvTaxError;

/// Errors from capture, upload and server calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("recording permission was not granted")]
    PermissionDenied,
    #[error("invalid capture state: {0}")]
    InvalidState(String),
    #[error("recorder error: {0}")]
    Recorder(String),
    #[error("server returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request failed: {0}")]
    Http(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Http(err.to_string())
    }
}

impl From<ClientError> for ConvTaxError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Status { .. } | ClientError::Http(_) => {
                ConvTaxError::Upload(err.to_string())
            }
            other => ConvTaxError::Capture(other.to_string()),
        }
    }
}
