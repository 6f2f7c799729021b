//! Error types for pbirkit.
//!
//! Library crates use [`PbirError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all pbirkit operations.
#[derive(Debug, thiserror::Error)]
pub enum PbirError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A PBIR document could not be parsed as JSON.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (missing CSV columns, bad project root, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// CSV reading or writing error.
    #[error("csv error: {0}")]
    Csv(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PbirError>;

impl PbirError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<csv::Error> for PbirError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err.to_string())
    }
}
