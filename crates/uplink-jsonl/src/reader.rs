//! JSONL reading operations.
//!
//! This module provides async, line-by-line decoding of JSONL data with line
//! number tracking, in a strict flavour ([`JsonlReader::read_line`]) and a
//! resilient one ([`JsonlReader::read_all_resilient`]) that skips bad lines.

use crate::error::{Error, Result};
use crate::warning::Warning;
use serde::de::DeserializeOwned;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// One physical line pulled from the underlying reader.
enum RawLine {
    /// Whitespace-only line; never decoded and never reported.
    Blank,
    /// Line that is not valid UTF-8.
    NotUtf8,
    /// Decodable text with surrounding whitespace removed.
    Text(String),
}

/// Async reader for JSONL (JSON Lines) data.
///
/// `JsonlReader` wraps an async reader in a [`BufReader`] and tracks line
/// numbers so decoding problems can be reported precisely.
///
/// # Examples
///
/// ```no_run
/// use uplink_jsonl::JsonlReader;
/// use serde_json::Value;
/// use tokio::fs::File;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let file = File::open("snapshot.jsonl").await?;
/// let mut reader = JsonlReader::new(file);
/// while let Some(record) = reader.read_line::<Value>().await? {
///     println!("{record}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct JsonlReader<R> {
    /// Buffered reader wrapping the underlying async reader.
    reader: BufReader<R>,
    /// Number of physical lines consumed so far (1-based once reading starts).
    line_number: usize,
    /// Reusable line buffer.
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> JsonlReader<R> {
    /// Creates a new `JsonlReader` wrapping the given async reader.
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line_number: 0,
            buf: Vec::new(),
        }
    }

    /// Returns the number of the last line read, or 0 before any read.
    #[must_use]
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Pulls the next physical line, or `None` at end of input.
    async fn next_raw(&mut self) -> Result<Option<RawLine>> {
        self.buf.clear();
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 {
            return Ok(None);
        }
        self.line_number += 1;

        let Ok(text) = std::str::from_utf8(&self.buf) else {
            return Ok(Some(RawLine::NotUtf8));
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            Ok(Some(RawLine::Blank))
        } else {
            Ok(Some(RawLine::Text(trimmed.to_string())))
        }
    }

    /// Reads and decodes the next non-blank line.
    ///
    /// Returns `Ok(None)` at end of input.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] for a line that is not valid UTF-8 or
    /// does not decode as `T`, and [`Error::Io`] for read failures.
    pub async fn read_line<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        loop {
            match self.next_raw().await? {
                None => return Ok(None),
                Some(RawLine::Blank) => {}
                Some(RawLine::NotUtf8) => {
                    return Err(Error::InvalidFormat {
                        line_number: self.line_number,
                        message: "invalid UTF-8".to_string(),
                    });
                }
                Some(RawLine::Text(text)) => {
                    return serde_json::from_str(&text).map(Some).map_err(|e| {
                        Error::InvalidFormat {
                            line_number: self.line_number,
                            message: e.to_string(),
                        }
                    });
                }
            }
        }
    }

    /// Reads every remaining line, keeping the ones that decode as `T`.
    ///
    /// Lines that fail are reported as warnings in input order; only I/O
    /// failures abort the read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the underlying reader fails.
    pub async fn read_all_resilient<T: DeserializeOwned>(
        &mut self,
    ) -> Result<(Vec<T>, Vec<Warning>)> {
        let mut records = Vec::new();
        let mut warnings = Vec::new();

        while let Some(raw) = self.next_raw().await? {
            match raw {
                RawLine::Blank => {}
                RawLine::NotUtf8 => warnings.push(Warning::SkippedLine {
                    line_number: self.line_number,
                    reason: "invalid UTF-8".to_string(),
                }),
                RawLine::Text(text) => match serde_json::from_str(&text) {
                    Ok(record) => records.push(record),
                    Err(e) => warnings.push(Warning::MalformedJson {
                        line_number: self.line_number,
                        error: e.to_string(),
                    }),
                },
            }
        }

        Ok((records, warnings))
    }
}

/// Opens `path` and reads it resiliently.
///
/// Every warning is also logged at `warn` level with its line number.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be opened or read.
pub async fn read_jsonl_resilient<T, P>(path: P) -> Result<(Vec<T>, Vec<Warning>)>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = tokio::fs::File::open(path).await?;
    let mut reader = JsonlReader::new(file);
    let (records, warnings) = reader.read_all_resilient().await?;

    for warning in &warnings {
        tracing::warn!(
            path = %path.display(),
            line = warning.line_number(),
            kind = warning.kind(),
            "skipping unreadable JSONL line: {warning}"
        );
    }
    tracing::debug!(
        path = %path.display(),
        records = records.len(),
        warnings = warnings.len(),
        "loaded JSONL file"
    );

    Ok((records, warnings))
}
