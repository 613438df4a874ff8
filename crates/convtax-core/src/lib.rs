pub mod config;
pub mod error;
pub mod types;

pub use config::ConvTaxConfig;
pub use error::{ConvTaxError, Result};
pub use types::*;
