//! Snapshot export from a live search.
//!
//! Search results carry issues in the tracker's nested shape; they are
//! normalised into flat [`IssueRecord`]s with rich-text descriptions
//! flattened to plain text and a bounded, whitespace-collapsed summary.

use crate::client::{ApiClient, SearchQuery};
use crate::domain::{IssueKey, IssueRecord, LinkRecord};
use crate::error::ClientError;
use crate::snapshot::SnapshotIndex;
use serde_json::Value;

/// Fields requested for every exported issue.
pub const EXPORT_FIELDS: [&str; 6] = [
    "summary",
    "description",
    "issuetype",
    "project",
    "parent",
    "issuelinks",
];

/// Marker appended to truncated summaries.
const ELLIPSIS: &str = "...";

/// Flattens a rich-text document to its text content.
///
/// Text nodes contribute their `text`; every other node contributes the
/// concatenation of its `content`. Plain strings pass through unchanged.
#[must_use]
pub fn extract_text(value: &Value) -> String {
    let mut out = String::new();
    push_text(value, &mut out);
    out
}

fn push_text(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Array(items) => items.iter().for_each(|item| push_text(item, out)),
        Value::Object(node) => {
            if node.get("type").and_then(Value::as_str) == Some("text") {
                if let Some(text) = node.get("text").and_then(Value::as_str) {
                    out.push_str(text);
                }
            } else if let Some(content) = node.get("content") {
                push_text(content, out);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

/// Collapses whitespace and bounds the result to `limit` characters,
/// ending truncated text with `...`.
#[must_use]
pub fn summarize_text(text: &str, limit: usize) -> String {
    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.chars().count() <= limit {
        return cleaned;
    }
    let keep = limit.saturating_sub(ELLIPSIS.len());
    let mut truncated: String = cleaned.chars().take(keep).collect();
    truncated.truncate(truncated.trim_end().len());
    truncated.push_str(ELLIPSIS);
    truncated
}

fn nested_str<'v>(value: &'v Value, outer: &str, inner: &str) -> Option<&'v str> {
    value.get(outer)?.get(inner)?.as_str()
}

/// Converts a search result issue into a snapshot record.
#[must_use]
pub fn normalize_issue(issue: &Value, description_limit: usize) -> IssueRecord {
    let fields = issue.get("fields").unwrap_or(&Value::Null);

    let issuelinks = fields
        .get("issuelinks")
        .and_then(Value::as_array)
        .map(|links| links.iter().map(normalize_link).collect())
        .unwrap_or_default();

    let description = fields
        .get("description")
        .map(extract_text)
        .unwrap_or_default();
    let description_summary = summarize_text(&description, description_limit);

    IssueRecord {
        issue_key: issue.get("key").and_then(Value::as_str).map(IssueKey::from),
        summary: fields.get("summary").and_then(Value::as_str).map(str::to_string),
        description: Some(description),
        description_summary: Some(description_summary),
        project_key: nested_str(fields, "project", "key").map(str::to_string),
        issuetype: nested_str(fields, "issuetype", "name").map(str::to_string),
        parent_key: nested_str(fields, "parent", "key").map(IssueKey::from),
        issuelinks,
    }
}

fn normalize_link(link: &Value) -> LinkRecord {
    let linked = link
        .get("inwardIssue")
        .or_else(|| link.get("outwardIssue"))
        .and_then(|issue| issue.get("key"))
        .and_then(Value::as_str);

    LinkRecord {
        link_type: nested_str(link, "type", "name").map(str::to_string),
        inward: nested_str(link, "type", "inward").map(str::to_string),
        outward: nested_str(link, "type", "outward").map(str::to_string),
        issue_key: linked.map(IssueKey::from),
    }
}

/// Runs `jql` to completion and normalises every result into a snapshot.
///
/// # Errors
///
/// The first page request that fails.
pub async fn export_snapshot(
    client: &ApiClient,
    jql: &str,
    page_size: usize,
    max_pages: usize,
    description_limit: usize,
) -> Result<SnapshotIndex, ClientError> {
    let query = SearchQuery::new(jql, EXPORT_FIELDS);
    let issues = client.search_all(&query, page_size, max_pages).await?;
    let records = issues
        .iter()
        .map(|issue| normalize_issue(issue, description_limit));
    let index = SnapshotIndex::from_records(records);
    tracing::info!(records = index.len(), "exported snapshot");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::RetryPolicy;
    use crate::client::mock::{RecordingSleeper, Reply, ScriptedTransport};
    use crate::domain::Relation;
    use crate::graph::GraphView;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn rich_text_is_flattened() {
        let doc = json!({
            "type": "doc",
            "content": [
                {"type": "paragraph", "content": [
                    {"type": "text", "text": "Fix the "},
                    {"type": "text", "text": "login"}
                ]},
                {"type": "paragraph", "content": [{"type": "hardBreak"}, {"type": "text", "text": " flow"}]}
            ]
        });
        assert_eq!(extract_text(&doc), "Fix the login flow");
        assert_eq!(extract_text(&json!("plain")), "plain");
        assert_eq!(extract_text(&Value::Null), "");
    }

    #[rstest]
    #[case("  a \n b\tc ", 280, "a b c")]
    #[case("abcdefghij", 10, "abcdefghij")]
    #[case("abcdefghijk", 10, "abcdefg...")]
    #[case("abcd    efghijk", 8, "abcd...")]
    #[case("", 10, "")]
    #[case("한국어 텍스트 요약", 6, "한국어...")]
    fn summaries_are_bounded(#[case] text: &str, #[case] limit: usize, #[case] expected: &str) {
        assert_eq!(summarize_text(text, limit), expected);
    }

    fn search_issue() -> Value {
        json!({
            "key": "MGTT-7",
            "fields": {
                "summary": "Checkout fails",
                "description": {"type": "doc", "content": [{"type": "text", "text": "Steps   to\nreproduce"}]},
                "project": {"key": "MGTT"},
                "issuetype": {"name": "Bug"},
                "parent": {"key": "MGTT-1"},
                "issuelinks": [
                    {"type": {"name": "Relates", "inward": "relates to", "outward": "relates to"},
                     "outwardIssue": {"key": "ITPT-3"}},
                    {"type": {"name": "Blocks"}, "inwardIssue": {"key": "OPS-2"}}
                ]
            }
        })
    }

    #[test]
    fn issue_is_normalised() {
        let record = normalize_issue(&search_issue(), 280);
        assert_eq!(record.issue_key.as_ref().map(IssueKey::as_str), Some("MGTT-7"));
        assert_eq!(record.summary.as_deref(), Some("Checkout fails"));
        assert_eq!(record.description.as_deref(), Some("Steps   to\nreproduce"));
        assert_eq!(record.description_summary.as_deref(), Some("Steps to reproduce"));
        assert_eq!(record.project_key.as_deref(), Some("MGTT"));
        assert_eq!(record.issuetype.as_deref(), Some("Bug"));
        assert_eq!(record.parent_key.as_ref().map(IssueKey::as_str), Some("MGTT-1"));

        let links: Vec<_> = record
            .issuelinks
            .iter()
            .map(|l| (l.link_type.as_deref(), l.issue_key.as_ref().map(IssueKey::as_str)))
            .collect();
        assert_eq!(links, vec![(Some("Relates"), Some("ITPT-3")), (Some("Blocks"), Some("OPS-2"))]);
    }

    #[test]
    fn sparse_issue_normalises_to_empty_fields() {
        let record = normalize_issue(&json!({"key": "A-1"}), 280);
        assert_eq!(record.summary, None);
        assert_eq!(record.description.as_deref(), Some(""));
        assert!(record.issuelinks.is_empty());
        assert_eq!(record.parent_key, None);
    }

    #[tokio::test]
    async fn exported_snapshot_is_searchable() {
        let transport = ScriptedTransport::new().then(Reply::ok(&json!({
            "issues": [search_issue()],
            "isLast": true
        })));
        let client = ApiClient::new(transport.clone())
            .with_sleeper(RecordingSleeper::new())
            .with_policy(RetryPolicy::new(0, std::time::Duration::ZERO));

        let index = export_snapshot(&client, "project = MGTT", 50, 0, 280).await.unwrap();
        assert_eq!(index.len(), 1);

        let edges = GraphView::edges(index.lookup("MGTT-7").unwrap());
        assert_eq!(edges[0].relation, Relation::Parent);
        assert_eq!(edges.len(), 3);

        let body = transport.requests()[0].body.clone().unwrap();
        assert_eq!(body["fields"].as_array().unwrap().len(), EXPORT_FIELDS.len());
        assert_eq!(body["maxResults"], 50);
    }
}
