//! JSONL writing operations.
//!
//! This module provides async, buffered writing of values as JSON Lines.

use crate::error::Result;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

/// Async writer for JSONL (JSON Lines) data.
///
/// Each value is serialized compactly on its own line followed by `\n`.
///
/// # Examples
///
/// ```no_run
/// use uplink_jsonl::JsonlWriter;
/// use tokio::fs::File;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let file = File::create("rows.jsonl").await?;
/// let mut writer = JsonlWriter::new(file);
/// writer.write(&serde_json::json!({"root_key": "MGTT-1"})).await?;
/// writer.flush().await?;
/// # Ok(())
/// # }
/// ```
pub struct JsonlWriter<W> {
    /// Buffered writer wrapping the underlying async writer.
    writer: BufWriter<W>,
    /// Reusable serialization buffer.
    line: Vec<u8>,
}

impl<W: AsyncWrite + Unpin> JsonlWriter<W> {
    /// Creates a new `JsonlWriter` wrapping the given async writer.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            line: Vec::new(),
        }
    }

    /// Serializes one value as a single line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the underlying write fails.
    pub async fn write<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.line.clear();
        serde_json::to_writer(&mut self.line, value)?;
        self.line.push(b'\n');
        self.writer.write_all(&self.line).await?;
        Ok(())
    }

    /// Writes every value from the iterator, one per line.
    ///
    /// # Errors
    ///
    /// Stops at the first serialization or write failure.
    pub async fn write_all<T, I>(&mut self, values: I) -> Result<()>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        for value in values {
            self.write(&value).await?;
        }
        Ok(())
    }

    /// Flushes buffered data to the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub async fn flush(&mut self) -> Result<()> {
        self.writer.flush().await?;
        Ok(())
    }

    /// Consumes the writer, returning the underlying buffered writer.
    ///
    /// This does not flush; call [`flush`](Self::flush) first.
    #[must_use]
    pub fn into_inner(self) -> BufWriter<W> {
        self.writer
    }
}
