//! Error types for the cleaning pipeline

use thiserror::Error;

/// Core pipeline errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Format(#[from] reviewclean_formats::Error),

    #[error(transparent)]
    Filter(#[from] reviewclean_filters::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A blocking quality gate failed at the checkpoint before `stage`
    #[error("Stage '{stage}' blocked by data quality gate: {}", .reasons.join("; "))]
    StageBlocked { stage: String, reasons: Vec<String> },
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;
