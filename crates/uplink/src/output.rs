//! Output formatting for CLI commands.
//!
//! Row data is JSON Lines on stdout or in an atomically written file;
//! summaries are either short text lines or one pretty JSON document.

use serde::Serialize;
use std::io::{self, Write};
use uplink_jsonl::JsonlWriter;

/// Output format mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable text format
    Text,
    /// JSON format for programmatic use
    Json,
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(handle, "{json}")
}

/// Stream values to stdout, one JSON document per line.
pub async fn print_jsonl<T, I>(values: I) -> uplink_jsonl::Result<()>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut writer = JsonlWriter::new(tokio::io::stdout());
    writer.write_all(values).await?;
    writer.flush().await
}

/// Print plain lines on stdout.
pub fn print_lines<I, S>(lines: I) -> io::Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    for line in lines {
        writeln!(handle, "{}", line.as_ref())?;
    }
    handle.flush()
}
