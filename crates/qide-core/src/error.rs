//! Error types for the Q IDE console engine.

use thiserror::Error;

/// Main error type for interpreter session operations.
///
/// The session controller never lets these cross its boundary: they are
/// rendered with `Display` and delivered as error events instead.
#[derive(Debug, Error)]
pub enum Error {
    /// No interpreter executable on PATH or in the well-known locations
    #[error("R executable not found. Please install R.")]
    ExecutableNotFound,

    /// The interpreter could not be launched
    #[error("Failed to start R process: {0}")]
    FailedToStart(String),

    /// The interpreter exited abnormally
    #[error("R process crashed: {0}")]
    ProcessCrashed(String),

    /// Timeout waiting for the interpreter
    #[error("R process timed out after {0}ms")]
    ProcessTimeout(u64),

    /// Writing to the interpreter's stdin failed
    #[error("Write error to R process: {0}")]
    WriteError(String),

    /// Reading the interpreter's output failed
    #[error("Read error from R process: {0}")]
    ReadError(String),

    /// Operation needs a running interpreter
    #[error("R process is not running.")]
    NotRunning,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input or parameters (generic)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with custom message
    #[error("{0}")]
    Other(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
