//! Unified error types for snapdiff

use thiserror::Error;

/// Unified error type for all snapdiff operations
#[derive(Error, Debug)]
pub enum SnapdiffError {
    // Script errors
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    // Browser errors
    #[error("session error: {0}")]
    Session(String),

    #[error("timed out after {0}ms: {1}")]
    ActionTimeout(u64, String),

    // Golden store errors
    #[error("golden store error: {0}")]
    Store(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    // Configuration errors are fatal to the whole run before scheduling
    #[error("configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

/// Result type alias using SnapdiffError
pub type Result<T> = std::result::Result<T, SnapdiffError>;
