//! Command execution logic.
//!
//! This module contains the implementation of all CLI commands. Each
//! command merges its flags over the resolved configuration, does its work
//! through the library modules, and reports in the requested output mode.

use anyhow::Result;
use serde_json::json;
use std::collections::BTreeSet;

use super::args::{ExportArgs, MergeArgs, RootsArgs, TraceArgs, TraverseArgs};
use crate::app::App;
use crate::batch::{DateRange, MergeDateSource, TraceBatch, read_roots};
use crate::cache::{CacheStore, EnrichmentCache};
use crate::client::ApiClient;
use crate::config::Environment;
use crate::domain::IssueKey;
use crate::export::export_snapshot;
use crate::graph::GraphView;
use crate::merge_date::MergeDateEnricher;
use crate::output::{self, OutputMode};
use crate::search::{Traversal, traverse};
use crate::snapshot::SnapshotIndex;

/// Execute the trace command
pub async fn execute_trace(app: &App, args: &TraceArgs, output_mode: OutputMode) -> Result<()> {
    let config = app.config();
    let namespace = args.namespace.as_deref().unwrap_or(&config.namespace);
    let max_depth = args.max_depth.unwrap_or(config.max_depth);
    let concurrency = args.concurrency.unwrap_or(config.concurrency);
    let target_branch = args.target_branch.as_deref().unwrap_or(&config.target_branch);
    let mut http = config.http.clone();
    if let Some(timeout) = args.http_timeout {
        http.timeout_secs = timeout;
    }

    let enrich = args.merge_dates_enabled();
    let live = enrich && args.merge_map.is_none();
    if !enrich && (args.merge_start.is_some() || args.merge_end.is_some()) {
        tracing::warn!("merge date range ignored without --with-merge-date");
    }

    // Credentials and caches are settled before any input is read.
    let mut live_parts = None;
    let mut browse_base = None;
    if live {
        let env = Environment::load(args.env_file.as_deref()).await?;
        let credentials = env.credentials()?;
        let client = ApiClient::connect(&credentials, &http)?;
        let cache = match &args.merge_cache {
            Some(path) => EnrichmentCache::load(path).await?,
            None => EnrichmentCache::in_memory(),
        };
        browse_base = Some(credentials.base_url.clone());
        live_parts = Some((client, cache));
    }

    let index = SnapshotIndex::load(&args.snapshot).await?;
    let roots = read_roots(&args.roots).await?;

    let source = match (&args.merge_map, &live_parts) {
        _ if !enrich => MergeDateSource::Disabled,
        (Some(path), _) => MergeDateSource::Map(CacheStore::<String>::read_map(path).await?),
        (None, Some((client, cache))) => {
            MergeDateSource::Live(MergeDateEnricher::new(client, cache, target_branch))
        }
        (None, None) => MergeDateSource::Disabled,
    };

    let mut batch = TraceBatch::new(GraphView::new(&index), namespace, max_depth)
        .with_merge_dates(source)
        .with_range(DateRange::new(args.merge_start, args.merge_end))
        .with_concurrency(concurrency);
    if let Some(base) = browse_base {
        batch = batch.with_browse_base(base);
    }

    let outcome = batch.run(&roots).await;

    if let Some((_, cache)) = &live_parts {
        cache.save().await?;
    }
    match &args.output {
        Some(path) => uplink_jsonl::write_jsonl_atomic(path, &outcome.rows).await?,
        None => output::print_jsonl(&outcome.rows).await?,
    }

    if let Some(path) = &args.output {
        match output_mode {
            OutputMode::Json => output::print_json(&json!({
                "output": path.display().to_string(),
                "rows": outcome.rows.len(),
                "stats": outcome.stats,
            }))?,
            OutputMode::Text => println!(
                "Wrote {} rows for {} roots to {} ({} matched, {} filtered out, {} lookups failed)",
                outcome.rows.len(),
                outcome.stats.roots,
                path.display(),
                outcome.stats.matched,
                outcome.stats.filtered_out,
                outcome.stats.failed,
            ),
        }
    }
    Ok(())
}

/// Execute the traverse command
pub async fn execute_traverse(app: &App, args: &TraverseArgs) -> Result<()> {
    let max_depth = args.max_depth.unwrap_or(app.config().max_depth);
    let index = SnapshotIndex::load(&args.snapshot).await?;
    let view = GraphView::new(&index);

    let roots = match (&args.root, &args.roots) {
        (Some(root), _) => vec![IssueKey::from(root.as_str())],
        (None, Some(path)) => read_roots(path).await?,
        (None, None) => Vec::new(),
    };

    let traversals: Vec<Traversal> = roots
        .iter()
        .map(|root| {
            let mut traversal = traverse(&view, root, max_depth);
            if let Some(namespace) = &args.only_namespace {
                traversal.retain_namespace(namespace);
            }
            traversal
        })
        .collect();

    if let Some(path) = &args.missing_output {
        let missing: BTreeSet<&IssueKey> = traversals
            .iter()
            .flat_map(|t| t.missing_keys.iter())
            .collect();
        let content: String = missing.iter().map(|k| format!("{k}\n")).collect();
        tokio::fs::write(path, content).await?;
        tracing::info!(path = %path.display(), keys = missing.len(), "wrote missing keys");
    }

    let document = match traversals.as_slice() {
        [single] => serde_json::to_value(single)?,
        many => serde_json::to_value(many)?,
    };
    match &args.output {
        Some(path) => uplink_jsonl::write_json_atomic(path, &document).await?,
        None => output::print_json(&document)?,
    }
    Ok(())
}

/// Execute the roots command
pub async fn execute_roots(args: &RootsArgs, output_mode: OutputMode) -> Result<()> {
    let index = SnapshotIndex::load(&args.snapshot).await?;
    let keys = index.keys_with_prefix(&args.prefix);

    match (&args.output, output_mode) {
        (Some(path), _) => {
            let content: String = keys.iter().map(|k| format!("{k}\n")).collect();
            tokio::fs::write(path, content).await?;
            tracing::info!(path = %path.display(), roots = keys.len(), "wrote root list");
        }
        (None, OutputMode::Json) => output::print_json(&keys)?,
        (None, OutputMode::Text) => output::print_lines(keys.iter().map(IssueKey::as_str))?,
    }
    Ok(())
}

/// Execute the merge command
pub async fn execute_merge(args: &MergeArgs, output_mode: OutputMode) -> Result<()> {
    let mut base = SnapshotIndex::load(&args.base).await?;
    let supplement = SnapshotIndex::load(&args.supplement).await?;
    let base_len = base.len();

    base.merge_missing(supplement);
    base.save(&args.output).await?;

    let added = base.len() - base_len;
    match output_mode {
        OutputMode::Json => output::print_json(&json!({
            "output": args.output.display().to_string(),
            "records": base.len(),
            "added": added,
        }))?,
        OutputMode::Text => println!(
            "Merged {} records ({added} from supplement) into {}",
            base.len(),
            args.output.display()
        ),
    }
    Ok(())
}

/// Execute the export command
pub async fn execute_export(app: &App, args: &ExportArgs, output_mode: OutputMode) -> Result<()> {
    let config = app.config();
    let mut http = config.http.clone();
    if let Some(timeout) = args.http_timeout {
        http.timeout_secs = timeout;
    }
    let page_size = args.page_size.unwrap_or(http.page_size);
    let max_pages = args.max_pages.unwrap_or(http.max_pages);
    let description_limit = args.description_max_len.unwrap_or(config.description_max_len);

    let env = Environment::load(args.env_file.as_deref()).await?;
    let credentials = env.credentials()?;
    let client = ApiClient::connect(&credentials, &http)?;

    let index = export_snapshot(&client, &args.jql, page_size, max_pages, description_limit).await?;
    index.save(&args.output).await?;

    match output_mode {
        OutputMode::Json => output::print_json(&json!({
            "output": args.output.display().to_string(),
            "records": index.len(),
        }))?,
        OutputMode::Text => println!("Exported {} records to {}", index.len(), args.output.display()),
    }
    Ok(())
}
