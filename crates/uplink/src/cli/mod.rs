//! CLI argument parsing and command dispatch.
//!
//! # Commands
//!
//! - `trace`: Find the nearest ancestor of each root inside a namespace
//! - `traverse`: List every edge reachable from one or more roots
//! - `roots`: List snapshot keys with a given prefix
//! - `merge`: Fill a snapshot with records it lacks from another one
//! - `export`: Page a search through the remote API into a snapshot
//!
//! # Global Flags
//!
//! - `--json`: Output summaries in JSON format
//! - `--config`: Use this config file instead of searching for `.uplink/config.yaml`
//!
//! # Example
//!
//! ```bash
//! uplink trace issues.json --roots roots.txt --namespace ITPT --max-depth 4
//! uplink trace issues.json --roots roots.txt --role-mode dev --merge-cache cache.json
//! uplink traverse issues.json MGTT-14108 --only-namespace ITPT
//! uplink export --jql 'project = MGTT' issues.jsonl
//! ```

mod args;
mod execute;
mod types;
mod validators;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use args::{ExportArgs, MergeArgs, RootsArgs, TraceArgs, TraverseArgs};
pub use types::RoleModeArg;
pub use validators::{validate_concurrency, validate_date, validate_issue_key, validate_namespace};

/// Uplink - nearest-ancestor search over issue tracker snapshots
///
/// Walks issue links in an offline snapshot to find, for every root issue,
/// the closest related issue in a target project, optionally annotated with
/// the date the root's code reached the mainline branch.
#[derive(Parser, Debug)]
#[command(name = "uplink")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file to use instead of the nearest `.uplink/config.yaml`
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Find the nearest ancestor in a namespace for each root
    ///
    /// Reads roots from a file, runs a breadth-first search over the
    /// snapshot's links, and writes one JSON Lines row per root.
    Trace(TraceArgs),

    /// List all edges reachable from a root
    ///
    /// Emits the traversal as JSON, along with the keys referenced by
    /// links but absent from the snapshot.
    Traverse(TraverseArgs),

    /// List snapshot keys that start with a prefix
    Roots(RootsArgs),

    /// Merge two snapshots
    ///
    /// Records from the base win; the supplement only contributes keys the
    /// base lacks.
    Merge(MergeArgs),

    /// Export a snapshot from the remote API
    ///
    /// Needs `JIRA_BASE_URL`, `JIRA_EMAIL` and `JIRA_API_TOKEN` in the
    /// environment or in an env file.
    Export(ExportArgs),
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing)
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        use crate::app::App;
        use crate::output::OutputMode;

        let output_mode = if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        };

        let Some(command) = &self.command else {
            println!("No command specified. Run 'uplink --help' for usage.");
            return Ok(());
        };

        let app = App::from_directory(&std::env::current_dir()?, self.config.as_deref()).await?;
        if let Some(path) = app.config_path() {
            tracing::debug!(path = %path.display(), "using config file");
        }

        match command {
            Commands::Trace(args) => execute::execute_trace(&app, args, output_mode).await,
            Commands::Traverse(args) => execute::execute_traverse(&app, args).await,
            Commands::Roots(args) => execute::execute_roots(args, output_mode).await,
            Commands::Merge(args) => execute::execute_merge(args, output_mode).await,
            Commands::Export(args) => execute::execute_export(&app, args, output_mode).await,
        }
    }
}
