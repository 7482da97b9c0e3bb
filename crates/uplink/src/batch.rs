//! Batch orchestration: one trace row per unique root.
//!
//! For each root the orchestrator runs the ancestor search, optionally
//! attaches a merge date, and applies the merge date range. Searches are
//! synchronous over the shared snapshot; enrichment runs through an ordered
//! buffered stream, so up to `concurrency` roots wait on the network at
//! once while output order stays equal to root order.

use crate::domain::{IssueKey, Relation};
use crate::error::Result;
use crate::graph::GraphView;
use crate::merge_date::{MergeDateEnricher, parse_timestamp_str};
use crate::search::{SearchResult, find_first_match};
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// One output row: a root and its nearest ancestor in the target namespace.
///
/// Unmatched roots keep the root columns and leave the ancestor columns
/// empty (`null` for typed columns).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRow {
    /// Root issue
    pub root_key: IssueKey,
    /// Browser link to the root, when the tracker URL is known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_url: Option<String>,
    /// Root summary
    pub root_summary: String,
    /// Issue whose edge reached the ancestor
    pub from_key: Option<IssueKey>,
    /// The ancestor
    pub upper_key: Option<IssueKey>,
    /// Ancestor summary
    pub upper_summary: String,
    /// Ancestor description summary
    pub upper_description: String,
    /// Relation of the final hop
    pub relation_type: Option<Relation>,
    /// Hops from root to ancestor
    pub depth: Option<usize>,
    /// Mainline merge date of the root; `""` when looked up and not found,
    /// absent when enrichment is off
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<String>,
}

impl From<SearchResult> for TraceRow {
    fn from(result: SearchResult) -> Self {
        let mut row = Self {
            root_key: result.root_key,
            root_url: None,
            root_summary: result.root_summary,
            from_key: None,
            upper_key: None,
            upper_summary: String::new(),
            upper_description: String::new(),
            relation_type: None,
            depth: None,
            merged_at: None,
        };
        if let Some(hit) = result.hit {
            row.from_key = Some(hit.from_key);
            row.upper_key = Some(hit.upper_key);
            row.upper_summary = hit.upper_summary;
            row.upper_description = hit.upper_description;
            row.relation_type = Some(hit.relation);
            row.depth = Some(hit.depth);
        }
        row
    }
}

/// Half-open `[start, end)` range over merge calendar dates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    /// First admitted date
    pub start: Option<NaiveDate>,
    /// First date no longer admitted
    pub end: Option<NaiveDate>,
}

impl DateRange {
    /// Creates a range; either bound may be open.
    #[must_use]
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    /// Whether neither bound is set.
    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Whether a row with this merge timestamp passes.
    ///
    /// With no bounds everything passes. With any bound, a missing or
    /// unparsable timestamp fails. The calendar date is taken in the
    /// timestamp's own offset.
    #[must_use]
    pub fn admits(&self, merged_at: Option<&str>) -> bool {
        if self.is_unbounded() {
            return true;
        }
        let Some(ts) = merged_at.and_then(|raw| parse_timestamp_str(raw.trim())) else {
            return false;
        };
        let day = ts.date_naive();
        self.start.is_none_or(|start| day >= start) && self.end.is_none_or(|end| day < end)
    }
}

/// Where merge dates come from.
#[derive(Debug, Default)]
pub enum MergeDateSource<'a> {
    /// No enrichment; rows carry no merge date and the range is not applied
    #[default]
    Disabled,
    /// Pre-computed key → timestamp map; missing keys get `""`
    Map(HashMap<String, String>),
    /// Live lookups through the API and enrichment cache
    Live(MergeDateEnricher<'a>),
}

/// Counters for one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Unique roots processed
    pub roots: usize,
    /// Roots with an ancestor in range
    pub matched: usize,
    /// Roots whose merge date lookup failed
    pub failed: usize,
    /// Rows dropped by the date range
    pub filtered_out: usize,
}

/// Rows in root order plus counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Surviving rows
    pub rows: Vec<TraceRow>,
    /// Counters
    pub stats: BatchStats,
}

/// Drives ancestor search, enrichment and filtering over a list of roots.
#[derive(Debug)]
pub struct TraceBatch<'a> {
    view: GraphView<'a>,
    namespace: String,
    max_depth: usize,
    merge_dates: MergeDateSource<'a>,
    range: DateRange,
    concurrency: usize,
    browse_base: Option<String>,
}

impl<'a> TraceBatch<'a> {
    /// Creates a batch searching `view` for ancestors in `namespace`.
    pub fn new(view: GraphView<'a>, namespace: impl Into<String>, max_depth: usize) -> Self {
        Self {
            view,
            namespace: namespace.into(),
            max_depth,
            merge_dates: MergeDateSource::Disabled,
            range: DateRange::default(),
            concurrency: 1,
            browse_base: None,
        }
    }

    /// Sets the merge date source.
    #[must_use]
    pub fn with_merge_dates(mut self, source: MergeDateSource<'a>) -> Self {
        self.merge_dates = source;
        self
    }

    /// Sets the merge date range.
    #[must_use]
    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }

    /// Sets how many roots may be enriched at once (at least one).
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Emits `root_url` as `<base>/browse/<key>`.
    #[must_use]
    pub fn with_browse_base(mut self, base_url: impl Into<String>) -> Self {
        self.browse_base = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    /// Runs the batch. Duplicate roots are processed once, at their first
    /// position.
    ///
    /// Never fails: a root whose merge date lookup fails is logged, cached
    /// as having no date, and kept with `merged_at = ""`.
    pub async fn run(&self, roots: &[IssueKey]) -> BatchOutcome {
        let roots = unique_keys(roots);
        tracing::info!(
            roots = roots.len(),
            namespace = %self.namespace,
            max_depth = self.max_depth,
            concurrency = self.concurrency,
            "tracing roots"
        );

        let traced: Vec<(TraceRow, bool)> = stream::iter(roots.iter().map(|root| self.trace_root(root)))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut outcome = BatchOutcome::default();
        outcome.stats.roots = roots.len();
        for (row, failed) in traced {
            if failed {
                outcome.stats.failed += 1;
            }
            let filtering = !matches!(self.merge_dates, MergeDateSource::Disabled);
            if filtering && !self.range.admits(row.merged_at.as_deref()) {
                outcome.stats.filtered_out += 1;
                continue;
            }
            if row.upper_key.is_some() {
                outcome.stats.matched += 1;
            }
            outcome.rows.push(row);
        }

        tracing::info!(
            rows = outcome.rows.len(),
            matched = outcome.stats.matched,
            failed = outcome.stats.failed,
            filtered_out = outcome.stats.filtered_out,
            "batch complete"
        );
        outcome
    }

    /// Traces one root; the flag reports a failed merge date lookup.
    async fn trace_root(&self, root: &IssueKey) -> (TraceRow, bool) {
        let result = find_first_match(&self.view, root, self.max_depth, &self.namespace);
        let mut row = TraceRow::from(result);
        row.root_url = self
            .browse_base
            .as_ref()
            .map(|base| format!("{base}/browse/{root}"));

        let mut failed = false;
        row.merged_at = match &self.merge_dates {
            MergeDateSource::Disabled => None,
            MergeDateSource::Map(map) => Some(map.get(root.as_str()).cloned().unwrap_or_default()),
            MergeDateSource::Live(enricher) => match enricher.merge_date(root.as_str()).await {
                Ok(merged_at) => Some(merged_at),
                Err(e) => {
                    tracing::warn!(root = %root, error = %e, "merge date lookup failed, recording none");
                    enricher.mark_unresolved(root.as_str()).await;
                    failed = true;
                    Some(String::new())
                }
            },
        };
        (row, failed)
    }
}

/// Keys in first-occurrence order, duplicates and empty keys removed.
#[must_use]
pub fn unique_keys(keys: &[IssueKey]) -> Vec<IssueKey> {
    let mut seen = HashSet::new();
    keys.iter()
        .filter(|k| !k.is_empty() && seen.insert(k.as_str()))
        .cloned()
        .collect()
}

/// Parses a root list: one key per line, surrounding whitespace and blank
/// lines ignored, duplicates dropped.
#[must_use]
pub fn parse_roots(content: &str) -> Vec<IssueKey> {
    let keys: Vec<IssueKey> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(IssueKey::from)
        .collect();
    unique_keys(&keys)
}

/// Reads and parses a root list file.
///
/// # Errors
///
/// I/O errors reading `path`.
pub async fn read_roots(path: &Path) -> Result<Vec<IssueKey>> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(parse_roots(&content))
}
