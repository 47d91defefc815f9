//! Error types for the companion_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for companion_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed exercise content, rejected when a session starts
    #[error("Invalid exercise definition: {0}")]
    InvalidDefinition(String),

    /// Camera or other frame source could not be acquired
    #[error("Frame source unavailable: {0}")]
    SourceUnavailable(String),

    /// Peak detection found no heartbeats in the accumulated signal
    #[error("Heart rate estimation inconclusive: no peaks detected")]
    EstimationInconclusive,

    /// Catalog validation error
    #[error("Catalog validation error: {0}")]
    CatalogValidation(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
