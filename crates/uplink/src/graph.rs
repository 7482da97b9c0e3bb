//! Relationship edges derived on demand from the snapshot index.
//!
//! No graph structure is materialised: edges are computed from a record each
//! time they are asked for, and targets are plain keys that may or may not
//! resolve to a record.
//!
//! # Edge order
//!
//! The parent edge comes first, then link edges in the record's link order.
//! Breadth-first discovery follows this order, so it decides which ancestor
//! and which relation are reported when several paths have equal length.

use crate::domain::{IssueKey, IssueRecord, Relation};
use crate::snapshot::SnapshotIndex;

/// One outgoing edge of an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge<'a> {
    /// Key the edge points to; may be absent from the snapshot.
    pub target: &'a IssueKey,
    /// How the edge was derived.
    pub relation: Relation,
}

/// Namespace encoded in a key: the text before the first `-`.
///
/// ```
/// use uplink::graph::infer_namespace;
///
/// assert_eq!(infer_namespace("ITPT-12"), Some("ITPT"));
/// assert_eq!(infer_namespace("A-B-3"), Some("A"));
/// assert_eq!(infer_namespace("nohyphen"), None);
/// ```
#[must_use]
pub fn infer_namespace(key: &str) -> Option<&str> {
    key.split_once('-').map(|(namespace, _)| namespace)
}

/// Adjacency view over a [`SnapshotIndex`].
#[derive(Debug, Clone, Copy)]
pub struct GraphView<'a> {
    index: &'a SnapshotIndex,
}

impl<'a> GraphView<'a> {
    /// Wraps an index.
    #[must_use]
    pub fn new(index: &'a SnapshotIndex) -> Self {
        Self { index }
    }

    /// The underlying index.
    #[must_use]
    pub fn index(&self) -> &'a SnapshotIndex {
        self.index
    }

    /// Outgoing edges of `issue`: parent first, then links in order.
    ///
    /// Empty or missing target keys produce no edge.
    #[must_use]
    pub fn edges(issue: &IssueRecord) -> Vec<Edge<'_>> {
        let parent = issue
            .parent_key
            .as_ref()
            .filter(|k| !k.is_empty())
            .map(|target| Edge {
                target,
                relation: Relation::Parent,
            });

        let links = issue
            .issuelinks
            .iter()
            .filter_map(|link| link.issue_key.as_ref())
            .filter(|k| !k.is_empty())
            .map(|target| Edge {
                target,
                relation: Relation::Relates,
            });

        parent.into_iter().chain(links).collect()
    }

    /// Namespace of `key`: the record's explicit project key when present,
    /// otherwise the prefix of the key itself.
    #[must_use]
    pub fn namespace_of<'k>(&self, key: &'k str) -> Option<&'k str>
    where
        'a: 'k,
    {
        let explicit = self
            .index
            .lookup(key)
            .and_then(|record| record.project_key.as_deref())
            .filter(|ns| !ns.is_empty());
        explicit.or_else(|| infer_namespace(key))
    }
}
