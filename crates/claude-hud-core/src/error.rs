//! Error types for claude-hud-core
//!
//! Readers never return these to the orchestrator: they collapse failures to
//! `None` or a connection status. The error type covers the ambient,
//! fallible operations (config loading, logging setup, the usage process).

use thiserror::Error;

/// Main error type for claude-hud-core
#[derive(Debug, Error)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Logging could not be initialized
    #[error("logging error: {0}")]
    Logging(String),

    /// The usage process could not be run or exited unsuccessfully
    #[error("usage process error: {0}")]
    Process(String),

    /// An operation exceeded its time limit
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Result type alias for claude-hud-core
pub type Result<T> = std::result::Result<T, Error>;
