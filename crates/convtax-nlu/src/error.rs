//! Error types for the NLU client.

use convtax_core::error::ConvTaxError;

/// Errors from talking to the intent-recognition service.
#[derive(Debug, thiserror::Error)]
pub enum NluError {
    #[error("NLU request failed: {0}")]
    Request(String),
    #[error("NLU returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("NLU response could not be decoded: {0}")]
    Decode(String),
    #[error("NLU client misconfigured: {0}")]
    Config(String),
    #[error("no scripted response left for '{0}'")]
    Exhausted(String),
}

impl From<reqwest::Error> for NluError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            NluError::Decode(err.to_string())
        } else {
            NluError::Request(err.to_string())
        }
    }
}

impl From<NluError> for ConvTaxError {
    fn from(err: NluError) -> Self {
        ConvTaxError::Nlu(err.to_string())
    }
}
