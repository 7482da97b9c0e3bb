//! Mainline merge dates from change-request relationship detail.
//!
//! The tracker's relationship detail lists change requests (pull requests)
//! linked to an issue. The merge date of an issue is the latest timestamp
//! among those merged into the target branch.
//!
//! Timestamp fields arrive in several shapes: epoch seconds or
//! milliseconds (numbers or digit strings, values above 10^12 are millis)
//! and ISO-8601 strings with or without fractional seconds and offset.

use crate::cache::EnrichmentCache;
use crate::client::ApiClient;
use crate::error::ClientError;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::Deserialize;
use serde::de::IgnoredAny;
use serde_json::Value;

/// Epoch values above this are milliseconds.
const MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Timestamp fields in order of preference.
pub const TIMESTAMP_FIELDS: [&str; 5] = [
    "mergedTimestamp",
    "completedTimestamp",
    "lastUpdate",
    "updatedOn",
    "closedTimestamp",
];

/// Change request as listed in relationship detail.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullRequest {
    /// Lifecycle state, e.g. `MERGED`
    #[serde(default)]
    pub status: Option<String>,
    /// Branch the change was merged into
    #[serde(default)]
    pub destination: Option<Destination>,
    /// Every other field, timestamps included
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

/// Destination of a change request in any of its observed shapes.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Destination {
    /// `{"branch": {"name": "master"}}` or `{"branch": "master"}`
    Nested {
        /// The branch reference
        branch: Option<BranchRef>,
    },
    /// `"master"`
    Name(String),
    /// Anything else
    Other(IgnoredAny),
}

/// Branch reference inside a [`Destination::Nested`].
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BranchRef {
    /// `{"name": "master"}`
    Named {
        /// Branch name
        name: Option<String>,
    },
    /// `"master"`
    Name(String),
    /// Anything else
    Other(IgnoredAny),
}

impl PullRequest {
    /// Destination branch name, empty if unknown.
    #[must_use]
    pub fn destination_branch(&self) -> &str {
        match &self.destination {
            Some(Destination::Nested {
                branch: Some(BranchRef::Named { name: Some(name) }),
            }) => name.as_str(),
            Some(Destination::Nested {
                branch: Some(BranchRef::Name(name)),
            })
            | Some(Destination::Name(name)) => name.as_str(),
            _ => "",
        }
    }

    /// Whether the change request was merged.
    #[must_use]
    pub fn is_merged(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("MERGED"))
    }

    /// First present, non-empty timestamp field in preference order.
    #[must_use]
    pub fn merge_timestamp(&self) -> Option<&Value> {
        TIMESTAMP_FIELDS
            .iter()
            .filter_map(|name| self.fields.get(*name))
            .find(|value| is_present(value))
    }
}

/// Null, `""`, `0`, `false` and empty containers count as absent.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Collects change requests from a relationship detail response.
///
/// Each `detail` entry lists them under `pullRequests` or, on some
/// integrations, `pullrequests`. Entries that do not decode are skipped.
#[must_use]
pub fn extract_pull_requests(detail: &Value) -> Vec<PullRequest> {
    let Some(entries) = detail.get("detail").and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            ["pullRequests", "pullrequests"]
                .iter()
                .filter_map(|name| entry.get(*name))
                .find(|value| is_present(value))
                .and_then(Value::as_array)
        })
        .flatten()
        .filter_map(|pr| match PullRequest::deserialize(pr) {
            Ok(pr) => Some(pr),
            Err(e) => {
                tracing::debug!(error = %e, "skipping undecodable change request");
                None
            }
        })
        .collect()
}

/// Parses a timestamp field value.
///
/// Offset-less ISO strings and epoch values are taken as UTC.
#[must_use]
pub fn parse_merge_timestamp(value: &Value) -> Option<DateTime<FixedOffset>> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(epoch) => from_epoch(epoch),
            None => n.as_f64().and_then(from_fractional_epoch),
        },
        Value::String(s) => parse_timestamp_str(s.trim()),
        _ => None,
    }
}

/// Parses a timestamp string in any of the accepted forms.
#[must_use]
pub fn parse_timestamp_str(raw: &str) -> Option<DateTime<FixedOffset>> {
    if raw.is_empty() {
        return None;
    }
    if raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw.parse::<i64>().ok().and_then(from_epoch);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed);
    }
    if let Ok(parsed) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(parsed);
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().fixed_offset())
}

fn from_epoch(epoch: i64) -> Option<DateTime<FixedOffset>> {
    let utc = if epoch > MILLIS_THRESHOLD {
        DateTime::<Utc>::from_timestamp_millis(epoch)
    } else {
        DateTime::<Utc>::from_timestamp(epoch, 0)
    };
    utc.map(|t| t.fixed_offset())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn from_fractional_epoch(epoch: f64) -> Option<DateTime<FixedOffset>> {
    if !epoch.is_finite() {
        return None;
    }
    let secs = if epoch > MILLIS_THRESHOLD as f64 { epoch / 1000.0 } else { epoch };
    let millis = (secs * 1000.0).round();
    if millis.abs() >= i64::MAX as f64 {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis(millis as i64).map(|t| t.fixed_offset())
}

/// Latest merge into `target_branch` among `pull_requests`.
///
/// Only merged change requests whose destination equals `target_branch`
/// (case-insensitive) and that carry a parsable timestamp count.
#[must_use]
pub fn find_mainline_merge_date(
    pull_requests: &[PullRequest],
    target_branch: &str,
) -> Option<DateTime<FixedOffset>> {
    pull_requests
        .iter()
        .filter(|pr| pr.is_merged() && pr.destination_branch().eq_ignore_ascii_case(target_branch))
        .filter_map(|pr| pr.merge_timestamp().and_then(parse_merge_timestamp))
        .max()
}

/// Looks up merge dates through the API, memoized in an [`EnrichmentCache`].
#[derive(Debug)]
pub struct MergeDateEnricher<'a> {
    client: &'a ApiClient,
    cache: &'a EnrichmentCache,
    target_branch: String,
}

impl<'a> MergeDateEnricher<'a> {
    /// Creates an enricher for merges into `target_branch`.
    pub fn new(client: &'a ApiClient, cache: &'a EnrichmentCache, target_branch: impl Into<String>) -> Self {
        Self {
            client,
            cache,
            target_branch: target_branch.into(),
        }
    }

    /// RFC 3339 merge date of `key`, or `""` when nothing qualifies or the
    /// tracker has no internal id for it. Cached keys cost no requests.
    ///
    /// # Errors
    ///
    /// Client failures that survived the retry policy. Nothing is cached
    /// for `key` in that case.
    pub async fn merge_date(&self, key: &str) -> Result<String, ClientError> {
        self.cache
            .merge_dates
            .get_or_compute(key, || self.lookup(key))
            .await
    }

    /// Records `key` as looked up with no usable date, so later runs do
    /// not retry it.
    pub async fn mark_unresolved(&self, key: &str) {
        self.cache.merge_dates.insert(key, String::new()).await;
    }

    async fn lookup(&self, key: &str) -> Result<String, ClientError> {
        let issue_id = self
            .cache
            .issue_ids
            .get_or_compute(key, || self.client.resolve_issue_id(key))
            .await?;
        if issue_id.is_empty() {
            tracing::debug!(key, "no internal id, no merge date");
            return Ok(String::new());
        }

        let detail = self.client.dev_status_detail(&issue_id).await?;
        let pull_requests = extract_pull_requests(&detail);
        let merged_at = find_mainline_merge_date(&pull_requests, &self.target_branch)
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        tracing::debug!(key, candidates = pull_requests.len(), merged_at = %merged_at, "merge date");
        Ok(merged_at)
    }
}
