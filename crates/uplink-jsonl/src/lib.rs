//! JSON Lines support for uplink.
//!
//! Snapshots of issue records, trace rows and enrichment caches all pass
//! through this crate: line-oriented reading with per-line error recovery,
//! buffered writing, and crash-safe replacement of files on disk.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod atomic;
pub mod error;
pub mod reader;
pub mod warning;
pub mod writer;

pub use atomic::{write_json_atomic, write_jsonl_atomic};
pub use error::{Error, Result};
pub use reader::{JsonlReader, read_jsonl_resilient};
pub use warning::Warning;
pub use writer::JsonlWriter;
