//! Uplink - nearest-ancestor search over issue tracker snapshots.
//!
//! This crate provides both a CLI application and a library for answering
//! "which issue in project X does this issue ultimately belong to?" from an
//! offline snapshot of an issue tracker, with optional enrichment from the
//! tracker's REST API.
//!
//! The pieces, bottom-up:
//!
//! - [`snapshot`]: key-addressable index over exported issue records
//! - [`graph`]: read-only relationship view over the index
//! - [`search`]: bounded breadth-first ancestor search and edge listing
//! - [`client`]: paginated, rate-limit aware API client
//! - [`cache`] and [`merge_date`]: cached mainline merge date lookups
//! - [`batch`]: per-root orchestration producing output rows

#![forbid(unsafe_code)]

pub mod app;
pub mod batch;
pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod graph;
pub mod merge_date;
pub mod output;
pub mod search;
pub mod snapshot;

pub use error::{Error, Result};
