//! Domain types for issue snapshots.
//!
//! Field names follow the JSON layout written by `uplink export` (and by the
//! exporters that came before it), so snapshot files stay interchangeable.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Public identifier of an issue, e.g. `MGTT-14108`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueKey(String);

impl IssueKey {
    /// Create a new issue key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the key is the empty string.
    ///
    /// Exporters emit `""` for unset references; those never become edges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for IssueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for IssueKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for IssueKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::borrow::Borrow<str> for IssueKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// One issue as captured in a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    /// Issue key. Records without one are dropped when indexing.
    #[serde(default)]
    pub issue_key: Option<IssueKey>,

    /// One-line summary
    #[serde(default)]
    pub summary: Option<String>,

    /// Plain-text description
    #[serde(default)]
    pub description: Option<String>,

    /// Whitespace-collapsed, length-bounded description
    #[serde(default)]
    pub description_summary: Option<String>,

    /// Explicit project (namespace) key, when the exporter captured it
    #[serde(default)]
    pub project_key: Option<String>,

    /// Issue type name
    #[serde(default)]
    pub issuetype: Option<String>,

    /// Parent issue key
    #[serde(default)]
    pub parent_key: Option<IssueKey>,

    /// Links to other issues, in tracker order
    #[serde(default, deserialize_with = "null_as_empty")]
    pub issuelinks: Vec<LinkRecord>,
}

impl IssueRecord {
    /// Summary text, empty when absent.
    #[must_use]
    pub fn summary_text(&self) -> &str {
        self.summary.as_deref().unwrap_or_default()
    }

    /// Bounded description text, empty when absent.
    #[must_use]
    pub fn description_summary_text(&self) -> &str {
        self.description_summary.as_deref().unwrap_or_default()
    }
}

/// A typed link from one issue to another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRecord {
    /// Link type name (e.g. "Relates", "Blocks")
    #[serde(default, rename = "type")]
    pub link_type: Option<String>,

    /// Inward phrase of the link type
    #[serde(default)]
    pub inward: Option<String>,

    /// Outward phrase of the link type
    #[serde(default)]
    pub outward: Option<String>,

    /// Key of the linked issue
    #[serde(default)]
    pub issue_key: Option<IssueKey>,
}

/// How a traversal step reached its target.
///
/// Link types are not distinguished: every link is a `Relates` edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    /// Child to parent
    Parent,

    /// Any issue link
    Relates,
}

impl Relation {
    /// Lowercase name used in output rows
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parent => "parent",
            Self::Relates => "relates",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Treats an explicit JSON `null` list the same as a missing one.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_decodes_exporter_layout() {
        let json = r#"{
            "issue_key": "MGTT-14108",
            "summary": "Fix login",
            "description": "long text",
            "description_summary": "long text",
            "project_key": "MGTT",
            "issuetype": "Task",
            "parent_key": "MGTT-100",
            "issuelinks": [
                {"type": "Relates", "inward": "relates to", "outward": "relates to", "issue_key": "ITPT-5"}
            ]
        }"#;
        let record: IssueRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.issue_key, Some(IssueKey::from("MGTT-14108")));
        assert_eq!(record.parent_key, Some(IssueKey::from("MGTT-100")));
        assert_eq!(record.issuelinks.len(), 1);
        assert_eq!(record.issuelinks[0].link_type.as_deref(), Some("Relates"));
    }

    #[test]
    fn null_fields_decode_as_absent() {
        let json = r#"{"issue_key": "A-1", "summary": null, "parent_key": null, "issuelinks": null}"#;
        let record: IssueRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.summary_text(), "");
        assert!(record.parent_key.is_none());
        assert!(record.issuelinks.is_empty());
    }

    #[test]
    fn relation_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Relation::Parent).unwrap(), "\"parent\"");
        assert_eq!(Relation::Relates.to_string(), "relates");
    }
}
