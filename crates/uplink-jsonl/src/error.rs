//! Error types for uplink-jsonl operations.

use std::io;
use thiserror::Error;

/// The error type for uplink-jsonl operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error occurred while reading or writing.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A line could not be decoded in strict mode.
    #[error("Invalid JSONL at line {line_number}: {message}")]
    InvalidFormat {
        /// The 1-based line number of the offending line.
        line_number: usize,
        /// Decoder message.
        message: String,
    },
}

/// A specialized Result type for uplink-jsonl operations.
pub type Result<T> = std::result::Result<T, Error>;
