//! CLI argument structs for all commands.
//!
//! Each command has its own argument struct with clap derive attributes
//! for parsing and validation. Options that also exist in the config file
//! are `Option`s here: `None` means "use the configured value".

use clap::{ArgGroup, Parser};
use chrono::NaiveDate;
use std::path::PathBuf;

use super::types::RoleModeArg;
use super::validators::{validate_concurrency, validate_date, validate_issue_key, validate_namespace};

/// Arguments for the `trace` command
#[derive(Parser, Debug, Clone)]
pub struct TraceArgs {
    /// Snapshot file (JSON array, or JSON Lines if it ends in `.jsonl`)
    pub snapshot: PathBuf,

    /// Root list: one issue key per line
    #[arg(short, long, alias = "batch-file")]
    pub roots: PathBuf,

    /// Namespace an ancestor must belong to
    #[arg(short, long, value_parser = validate_namespace)]
    pub namespace: Option<String>,

    /// Maximum number of hops from a root
    #[arg(short = 'd', long)]
    pub max_depth: Option<usize>,

    /// Attach the root's mainline merge date to each row
    #[arg(long, alias = "include-master-merge")]
    pub with_merge_date: bool,

    /// Preset: `dev` turns merge dates on, `plan_qa` turns them off
    #[arg(long, value_enum, env = "ROLE_MODE")]
    pub role_mode: Option<RoleModeArg>,

    /// Pre-computed merge dates (JSON object of key → timestamp); no API calls
    #[arg(long)]
    pub merge_map: Option<PathBuf>,

    /// Merge date cache file, reused across runs
    #[arg(long, alias = "devstatus-cache", env = "DEVSTATUS_CACHE")]
    pub merge_cache: Option<PathBuf>,

    /// Keep rows merged on or after this date (YYYY/MM/DD)
    #[arg(long, value_parser = validate_date)]
    pub merge_start: Option<NaiveDate>,

    /// Keep rows merged before this date (YYYY/MM/DD)
    #[arg(long, value_parser = validate_date)]
    pub merge_end: Option<NaiveDate>,

    /// Branch counted as mainline
    #[arg(long)]
    pub target_branch: Option<String>,

    /// Roots enriched concurrently
    #[arg(short = 'j', long, value_parser = validate_concurrency)]
    pub concurrency: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub http_timeout: Option<u64>,

    /// Env file with JIRA_* credentials (never overrides the environment)
    #[arg(long)]
    pub env_file: Option<PathBuf>,

    /// Write rows to this JSON Lines file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl TraceArgs {
    /// Whether merge dates should be attached, after applying the role
    /// preset.
    #[must_use]
    pub fn merge_dates_enabled(&self) -> bool {
        self.role_mode
            .map_or(self.with_merge_date, RoleModeArg::wants_merge_dates)
    }
}

/// Arguments for the `traverse` command
#[derive(Parser, Debug, Clone)]
#[command(group(ArgGroup::new("start").required(true).args(["root", "roots"])))]
pub struct TraverseArgs {
    /// Snapshot file
    pub snapshot: PathBuf,

    /// Root issue key (e.g., MGTT-14108)
    #[arg(value_parser = validate_issue_key)]
    pub root: Option<String>,

    /// Root list file instead of a single root
    #[arg(short, long, alias = "batch-file")]
    pub roots: Option<PathBuf>,

    /// Maximum number of hops from a root
    #[arg(short = 'd', long)]
    pub max_depth: Option<usize>,

    /// Only list edges into this namespace
    #[arg(long, value_parser = validate_namespace)]
    pub only_namespace: Option<String>,

    /// Write the edge listing (JSON) to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Write every key missing from the snapshot to this file, one per line
    #[arg(long)]
    pub missing_output: Option<PathBuf>,
}

/// Arguments for the `roots` command
#[derive(Parser, Debug, Clone)]
pub struct RootsArgs {
    /// Snapshot file
    pub snapshot: PathBuf,

    /// Key prefix to select, including the hyphen
    #[arg(short, long, default_value = "MGTT-")]
    pub prefix: String,

    /// Write keys to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the `merge` command
#[derive(Parser, Debug, Clone)]
pub struct MergeArgs {
    /// Base snapshot; its records win
    pub base: PathBuf,

    /// Supplement snapshot; only keys missing from the base are taken
    pub supplement: PathBuf,

    /// Output snapshot
    pub output: PathBuf,
}

/// Arguments for the `export` command
#[derive(Parser, Debug, Clone)]
pub struct ExportArgs {
    /// Search expression selecting the issues to export
    #[arg(long)]
    pub jql: String,

    /// Output snapshot
    pub output: PathBuf,

    /// Results per page
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Stop after this many pages (0 = no limit)
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Character bound of description summaries
    #[arg(long)]
    pub description_max_len: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub http_timeout: Option<u64>,

    /// Env file with JIRA_* credentials (never overrides the environment)
    #[arg(long)]
    pub env_file: Option<PathBuf>,
}
