use thiserror::Error;

/// Top-level error type for ConversationalTax.
///
/// Subsystem crates keep their own error enums and convert into this one so
/// that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConvTaxError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("NLU error: {0}")]
    Nlu(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Contract not found: {0}")]
    ContractNotFound(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for ConvTaxError {
    fn from(err: toml::de::Error) -> Self {
        ConvTaxError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ConvTaxError {
    fn from(err: toml::ser::Error) -> Self {
        ConvTaxError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ConvTaxError {
    fn from(err: serde_json::Error) -> Self {
        ConvTaxError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for ConversationalTax operations.
pub type Result<T> = std::result::Result<T, ConvTaxError>;
