//! Non-fatal problems found while loading JSON Lines data.
//!
//! Snapshot files are produced by external exporters and are sometimes
//! hand-edited or truncated. Resilient loading keeps every record it can
//! decode and reports the rest as [`Warning`]s so the caller can log them.
//!
//! # Examples
//!
//! ```
//! use uplink_jsonl::warning::Warning;
//!
//! let warning = Warning::MalformedJson {
//!     line_number: 5,
//!     error: "unexpected end of input".to_string(),
//! };
//! assert_eq!(warning.line_number(), 5);
//! assert_eq!(warning.kind(), "malformed_json");
//! ```

/// A non-fatal warning that occurred during JSONL processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A line was not valid JSON, or did not match the expected record shape.
    MalformedJson {
        /// The 1-based line number where the error occurred.
        line_number: usize,
        /// A description of the decoding error.
        error: String,
    },

    /// A line was skipped before decoding was attempted.
    ///
    /// Currently raised for lines that are not valid UTF-8.
    SkippedLine {
        /// The 1-based line number that was skipped.
        line_number: usize,
        /// The reason the line was skipped.
        reason: String,
    },
}

impl Warning {
    /// Returns the line number associated with this warning.
    #[must_use]
    pub fn line_number(&self) -> usize {
        match self {
            Self::MalformedJson { line_number, .. } | Self::SkippedLine { line_number, .. } => {
                *line_number
            }
        }
    }

    /// Returns a static string identifying the warning kind.
    ///
    /// Useful as a structured logging field.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedJson { .. } => "malformed_json",
            Self::SkippedLine { .. } => "skipped_line",
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedJson { line_number, error } => {
                write!(f, "line {line_number}: malformed JSON: {error}")
            }
            Self::SkippedLine {
                line_number,
                reason,
            } => write!(f, "line {line_number}: skipped: {reason}"),
        }
    }
}

impl std::error::Error for Warning {}
