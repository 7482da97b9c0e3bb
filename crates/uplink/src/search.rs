//! Breadth-first ancestor search over the relationship graph.
//!
//! Every search owns its queue and visited set; nothing is shared between
//! roots except the read-only snapshot. The root is visited before the
//! search starts, so it can never be reported as its own ancestor.
//!
//! # Depth bound
//!
//! `max_depth` gates *expansion*, not *matching*: a node dequeued at
//! `depth == max_depth` is not expanded, but every neighbour of a node at
//! `max_depth - 1` is still tested against the namespace.

use crate::domain::{IssueKey, Relation};
use crate::graph::GraphView;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet, VecDeque};

/// The nearest issue in the target namespace, and how it was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AncestorHit {
    /// Issue whose edge led to the match
    pub from_key: IssueKey,
    /// The matching issue
    pub upper_key: IssueKey,
    /// Summary of the match, empty if it is not in the snapshot
    pub upper_summary: String,
    /// Bounded description of the match, empty if it is not in the snapshot
    pub upper_description: String,
    /// Relation of the final hop
    pub relation: Relation,
    /// Hops from the root
    pub depth: usize,
}

/// Outcome of one ancestor search. `hit` is `None` when nothing matched
/// within the depth bound; that is a normal result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    /// Root the search started from
    pub root_key: IssueKey,
    /// Root summary, empty if the root is not in the snapshot
    pub root_summary: String,
    /// Nearest match, if any
    pub hit: Option<AncestorHit>,
}

/// Finds the nearest issue reachable from `root` whose namespace equals
/// `target_namespace`.
///
/// Neighbours are marked visited on discovery, before the namespace test,
/// so each key is examined at most once per search. Ties at equal depth go
/// to the neighbour discovered first.
#[must_use]
pub fn find_first_match(
    view: &GraphView<'_>,
    root: &IssueKey,
    max_depth: usize,
    target_namespace: &str,
) -> SearchResult {
    let index = view.index();
    let root_summary = index
        .lookup(root.as_str())
        .map(|r| r.summary_text().to_string())
        .unwrap_or_default();

    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<(&str, usize)> = VecDeque::new();
    visited.insert(root.as_str());
    queue.push_back((root.as_str(), 0));

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        let Some(issue) = index.lookup(current) else {
            continue;
        };

        for edge in GraphView::edges(issue) {
            let next = edge.target.as_str();
            if !visited.insert(next) {
                continue;
            }

            if view.namespace_of(next) == Some(target_namespace) {
                let matched = index.lookup(next);
                let hit = AncestorHit {
                    from_key: IssueKey::from(current),
                    upper_key: edge.target.clone(),
                    upper_summary: matched
                        .map(|r| r.summary_text().to_string())
                        .unwrap_or_default(),
                    upper_description: matched
                        .map(|r| r.description_summary_text().to_string())
                        .unwrap_or_default(),
                    relation: edge.relation,
                    depth: depth + 1,
                };
                tracing::debug!(
                    root = %root,
                    upper = %hit.upper_key,
                    depth = hit.depth,
                    "found ancestor"
                );
                return SearchResult {
                    root_key: root.clone(),
                    root_summary,
                    hit: Some(hit),
                };
            }

            queue.push_back((next, depth + 1));
        }
    }

    tracing::debug!(root = %root, max_depth, "no ancestor within depth bound");
    SearchResult {
        root_key: root.clone(),
        root_summary,
        hit: None,
    }
}

/// One discovered edge in a full traversal listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraversalEdge {
    /// Issue the edge leaves
    pub from_key: IssueKey,
    /// Issue the edge reaches
    pub to_key: IssueKey,
    /// Relation of the edge
    pub relation_type: Relation,
    /// Namespace of `to_key` (explicit or inferred)
    pub to_project_key: Option<String>,
    /// Hops from the root
    pub depth: usize,
}

/// Every edge reachable from a root, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Traversal {
    /// Root the traversal started from
    pub root_key: IssueKey,
    /// Edges to newly discovered keys, in BFS order
    pub edges: Vec<TraversalEdge>,
    /// Reached keys that have no snapshot record, sorted
    pub missing_keys: BTreeSet<IssueKey>,
}

impl Traversal {
    /// Keeps only edges whose target lies in `namespace`.
    pub fn retain_namespace(&mut self, namespace: &str) {
        self.edges
            .retain(|e| e.to_project_key.as_deref() == Some(namespace));
    }
}

/// Lists every edge reachable from `root` within `max_depth`, recording keys
/// the snapshot does not hold.
///
/// Uses the same discovery order and visited rule as [`find_first_match`]
/// but never stops early.
#[must_use]
pub fn traverse(view: &GraphView<'_>, root: &IssueKey, max_depth: usize) -> Traversal {
    let index = view.index();
    let mut traversal = Traversal {
        root_key: root.clone(),
        edges: Vec::new(),
        missing_keys: BTreeSet::new(),
    };

    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<(&IssueKey, usize)> = VecDeque::new();
    visited.insert(root.as_str());
    queue.push_back((root, 0));

    while let Some((current, depth)) = queue.pop_front() {
        let Some(issue) = index.lookup(current.as_str()) else {
            traversal.missing_keys.insert(current.clone());
            continue;
        };
        if depth >= max_depth {
            continue;
        }

        for edge in GraphView::edges(issue) {
            if !visited.insert(edge.target.as_str()) {
                continue;
            }
            if !index.contains(edge.target.as_str()) {
                traversal.missing_keys.insert(edge.target.clone());
            }
            traversal.edges.push(TraversalEdge {
                from_key: current.clone(),
                to_key: edge.target.clone(),
                relation_type: edge.relation,
                to_project_key: view.namespace_of(edge.target.as_str()).map(str::to_string),
                depth: depth + 1,
            });
            queue.push_back((edge.target, depth + 1));
        }
    }

    traversal
}
