//! Error types for filters

use thiserror::Error;

/// Filter errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid sentiment rule: {0}")]
    InvalidRule(String),
}

/// Result type alias for filter operations
pub type Result<T> = std::result::Result<T, Error>;
