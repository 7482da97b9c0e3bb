//! End-to-end tests over snapshot files on disk: loading, ancestor search,
//! traversal listings and batch runs with persisted merge-date caches.

use serde_json::json;
use std::io::Write;
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};
use uplink::batch::{MergeDateSource, TraceBatch, read_roots};
use uplink::cache::EnrichmentCache;
use uplink::client::mock::{RecordingSleeper, Reply, ScriptedTransport};
use uplink::client::{ApiClient, DEV_STATUS_PATH, RetryPolicy};
use uplink::domain::{IssueKey, Relation};
use uplink::graph::GraphView;
use uplink::merge_date::MergeDateEnricher;
use uplink::search::{find_first_match, traverse};
use uplink::snapshot::SnapshotIndex;

// =============================================================================
// Test Helpers
// =============================================================================

fn file_with(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("create temp file");
    file.write_all(content.as_bytes()).expect("write temp file");
    file.flush().expect("flush temp file");
    file
}

async fn load(snapshot: &serde_json::Value) -> SnapshotIndex {
    let file = file_with(".json", &snapshot.to_string());
    SnapshotIndex::load(file.path()).await.expect("snapshot loads")
}

fn relates(key: &str) -> serde_json::Value {
    json!({"type": "Relates", "inward": "relates to", "outward": "relates to", "issue_key": key})
}

fn key(raw: &str) -> IssueKey {
    IssueKey::from(raw)
}

// =============================================================================
// Ancestor search over loaded snapshots
// =============================================================================

#[tokio::test]
async fn parent_in_namespace_is_found_at_depth_one() {
    let index = load(&json!([
        {"issue_key": "R-1", "summary": "root", "parent_key": "P-1"},
        {"issue_key": "P-1", "summary": "parent", "project_key": "ITPT"}
    ]))
    .await;

    let result = find_first_match(&GraphView::new(&index), &key("R-1"), 5, "ITPT");
    let hit = result.hit.expect("parent matches");
    assert_eq!(hit.upper_key, key("P-1"));
    assert_eq!(hit.upper_summary, "parent");
    assert_eq!(hit.relation, Relation::Parent);
    assert_eq!(hit.depth, 1);
    assert_eq!(result.root_summary, "root");
}

#[tokio::test]
async fn second_link_matches_when_first_is_elsewhere() {
    let index = load(&json!([
        {"issue_key": "R-1", "issuelinks": [relates("X-1"), relates("Y-1")]},
        {"issue_key": "X-1", "project_key": "OTHER"},
        {"issue_key": "Y-1", "project_key": "ITPT"}
    ]))
    .await;

    let hit = find_first_match(&GraphView::new(&index), &key("R-1"), 5, "ITPT")
        .hit
        .expect("Y-1 matches");
    assert_eq!(hit.upper_key, key("Y-1"));
    assert_eq!(hit.relation, Relation::Relates);
    assert_eq!(hit.depth, 1);
}

#[tokio::test]
async fn parent_cycle_terminates_unmatched() {
    let index = load(&json!([
        {"issue_key": "R-1", "parent_key": "A-1"},
        {"issue_key": "A-1", "parent_key": "R-1"}
    ]))
    .await;

    let result = find_first_match(&GraphView::new(&index), &key("R-1"), 50, "ITPT");
    assert!(result.hit.is_none());
}

#[tokio::test]
async fn dangling_link_matches_by_key_prefix() {
    let index = load(&json!([
        {"issue_key": "R-1", "issuelinks": [relates("ITPT-77")]}
    ]))
    .await;

    let hit = find_first_match(&GraphView::new(&index), &key("R-1"), 3, "ITPT")
        .hit
        .expect("prefix decides namespace");
    assert_eq!(hit.upper_key, key("ITPT-77"));
    assert_eq!(hit.upper_summary, "");
}

#[tokio::test]
async fn jsonl_snapshot_skips_corrupt_lines() {
    let file = file_with(
        ".jsonl",
        "{\"issue_key\": \"R-1\", \"parent_key\": \"ITPT-1\"}\n{not json\n{\"issue_key\": \"ITPT-1\"}\n",
    );
    let index = SnapshotIndex::load(file.path()).await.expect("snapshot loads");

    assert_eq!(index.len(), 2);
    let hit = find_first_match(&GraphView::new(&index), &key("R-1"), 1, "ITPT").hit;
    assert!(hit.is_some());
}

// =============================================================================
// Traversal
// =============================================================================

#[tokio::test]
async fn traversal_reports_missing_keys() {
    let index = load(&json!([
        {"issue_key": "R-1", "parent_key": "A-1", "issuelinks": [relates("GONE-1")]},
        {"issue_key": "A-1", "parent_key": "GONE-2"}
    ]))
    .await;

    let traversal = traverse(&GraphView::new(&index), &key("R-1"), 5);
    let targets: Vec<&str> = traversal.edges.iter().map(|e| e.to_key.as_str()).collect();
    assert_eq!(targets, vec!["A-1", "GONE-1", "GONE-2"]);
    let missing: Vec<&str> = traversal.missing_keys.iter().map(IssueKey::as_str).collect();
    assert_eq!(missing, vec!["GONE-1", "GONE-2"]);
}

// =============================================================================
// Batch runs with a persisted cache
// =============================================================================

fn merged_detail(branch: &str, timestamp: &str) -> Reply {
    Reply::ok(&json!({"detail": [{"pullRequests": [{
        "status": "MERGED",
        "destination": {"branch": {"name": branch}},
        "mergedTimestamp": timestamp
    }]}]}))
}

fn api(transport: &ScriptedTransport) -> ApiClient {
    ApiClient::new(transport.clone())
        .with_sleeper(RecordingSleeper::new())
        .with_policy(RetryPolicy::new(0, Duration::from_secs(1)))
}

#[tokio::test]
async fn second_run_is_served_from_the_cache_file() {
    let index = load(&json!([
        {"issue_key": "MGTT-1", "parent_key": "ITPT-1"},
        {"issue_key": "MGTT-2", "parent_key": "ITPT-1"},
        {"issue_key": "ITPT-1", "project_key": "ITPT"}
    ]))
    .await;
    let roots_file = file_with(".txt", "MGTT-1\nMGTT-2\n\nMGTT-1\n");
    let roots = read_roots(roots_file.path()).await.expect("roots load");
    let dir = TempDir::new().expect("temp dir");
    let cache_path = dir.path().join("merge-cache.json");

    let transport = ScriptedTransport::new()
        .route("/rest/api/3/issue/MGTT-1", Reply::ok(&json!({"id": "101"})))
        .route("/rest/api/3/issue/MGTT-2", Reply::ok(&json!({})))
        .route(DEV_STATUS_PATH, merged_detail("master", "2024-06-01T08:30:00Z"));
    let client = api(&transport);

    let first = {
        let cache = EnrichmentCache::load(&cache_path).await.expect("cache loads");
        let batch = TraceBatch::new(GraphView::new(&index), "ITPT", 5).with_merge_dates(
            MergeDateSource::Live(MergeDateEnricher::new(&client, &cache, "master")),
        );
        let outcome = batch.run(&roots).await;
        cache.save().await.expect("cache saves");
        outcome
    };
    let calls_after_first = transport.calls();
    assert_eq!(calls_after_first, 3);
    assert_eq!(first.rows.len(), 2);
    assert_eq!(first.rows[0].merged_at.as_deref(), Some("2024-06-01T08:30:00+00:00"));
    assert_eq!(first.rows[1].merged_at.as_deref(), Some(""));
    assert!(EnrichmentCache::ids_path(&cache_path).exists());

    let cache = EnrichmentCache::load(&cache_path).await.expect("cache loads");
    let batch = TraceBatch::new(GraphView::new(&index), "ITPT", 5).with_merge_dates(
        MergeDateSource::Live(MergeDateEnricher::new(&client, &cache, "master")),
    );
    let second = batch.run(&roots).await;

    assert_eq!(transport.calls(), calls_after_first);
    assert_eq!(second, first);
}

#[tokio::test]
async fn merges_to_other_branches_leave_the_date_blank() {
    let index = load(&json!([{"issue_key": "MGTT-1", "parent_key": "ITPT-1"}])).await;
    let transport = ScriptedTransport::new()
        .route("/rest/api/3/issue/", Reply::ok(&json!({"id": "101"})))
        .route(DEV_STATUS_PATH, merged_detail("dev", "2024-06-01T08:30:00Z"));
    let client = api(&transport);
    let cache = EnrichmentCache::in_memory();

    let batch = TraceBatch::new(GraphView::new(&index), "ITPT", 5).with_merge_dates(
        MergeDateSource::Live(MergeDateEnricher::new(&client, &cache, "master")),
    );
    let outcome = batch.run(&[key("MGTT-1")]).await;

    assert_eq!(outcome.rows[0].merged_at.as_deref(), Some(""));
    assert_eq!(outcome.rows[0].upper_key, Some(key("ITPT-1")));
    assert_eq!(cache.merge_dates.get("MGTT-1").await.as_deref(), Some(""));
}
