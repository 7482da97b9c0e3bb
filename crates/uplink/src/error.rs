//! Error types for uplink operations.
//!
//! Structural gaps in a snapshot (missing records, dangling links, no
//! ancestor in range) are not errors and never appear here. What does:
//!
//! - **`ConfigError`**: precondition failures, surfaced before any work starts
//! - **`ClientError`**: remote failures left over after the retry policy gave up
//! - I/O and decoding failures of input files

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The error type for uplink operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON document could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON Lines file could not be read or written.
    #[error(transparent)]
    Jsonl(#[from] uplink_jsonl::Error),

    /// Invalid or missing configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Remote API call failed.
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Configuration and precondition failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variables are unset or empty.
    #[error("Missing environment for issue tracker access: {}", .0.join(", "))]
    MissingEnv(Vec<&'static str>),

    /// An explicitly named env file does not exist.
    #[error("Env file not found: {}", .0.display())]
    EnvFileNotFound(PathBuf),

    /// An env file has a line that cannot be parsed.
    #[error("Invalid env file {}: {message}", path.display())]
    InvalidEnvFile {
        /// Path of the env file.
        path: PathBuf,
        /// Parser diagnostic.
        message: String,
    },

    /// A date bound is not in `YYYY/MM/DD` form.
    #[error("Invalid date '{value}', expected YYYY/MM/DD")]
    InvalidDate {
        /// The rejected input.
        value: String,
        /// Parser diagnostic.
        #[source]
        source: chrono::ParseError,
    },

    /// The config file could not be parsed.
    #[error("Invalid config file {}: {message}", path.display())]
    InvalidFile {
        /// Path of the config file.
        path: PathBuf,
        /// Parser diagnostic.
        message: String,
    },

    /// A setting has an unusable value.
    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        /// Setting name.
        field: &'static str,
        /// Why it was rejected.
        message: String,
    },
}

/// Failures of the issue tracker API client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Server answered with a non-success status that is not retried, or
    /// kept answering with a retryable one until retries ran out.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Response status code.
        status: u16,
        /// Request URL (without query string).
        url: String,
        /// Leading part of the response body.
        body: String,
    },

    /// Connection, timeout or body transfer failure.
    #[error("Request to {url} failed: {message}")]
    Transport {
        /// Request URL (without query string).
        url: String,
        /// Transport diagnostic.
        message: String,
    },

    /// Response body was not the expected JSON.
    #[error("Unexpected response from {url}: {source}")]
    Decode {
        /// Request URL (without query string).
        url: String,
        /// Decoder diagnostic.
        #[source]
        source: serde_json::Error,
    },
}

impl ClientError {
    /// HTTP status of the failure, if the server answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport { .. } | Self::Decode { .. } => None,
        }
    }
}

/// A specialized Result type for uplink operations.
pub type Result<T> = std::result::Result<T, Error>;
