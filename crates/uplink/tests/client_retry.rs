//! Integration tests for the API client's retry and pagination behavior,
//! driven through the scripted transport with a recording sleeper so no
//! real time passes.

use serde_json::json;
use std::time::Duration;
use uplink::client::mock::{RecordingSleeper, Reply, ScriptedTransport};
use uplink::client::{ApiClient, ApiRequest, FailureKind, RetryPolicy, SearchQuery};

const SECOND: Duration = Duration::from_secs(1);

fn client(transport: &ScriptedTransport, sleeper: &RecordingSleeper, policy: RetryPolicy) -> ApiClient {
    ApiClient::new(transport.clone())
        .with_sleeper(sleeper.clone())
        .with_policy(policy)
}

// =============================================================================
// Backoff
// =============================================================================

#[tokio::test]
async fn two_throttles_without_hint_double_the_backoff() {
    let transport = ScriptedTransport::new()
        .then(Reply::status(429, ""))
        .then(Reply::status(429, ""))
        .then(Reply::ok(&json!({"ok": true})));
    let sleeper = RecordingSleeper::new();

    let value = client(&transport, &sleeper, RetryPolicy::new(5, 2 * SECOND))
        .request_json(&ApiRequest::get("/rest/api/3/issue/MGTT-1"))
        .await
        .expect("third attempt succeeds");

    assert_eq!(value, json!({"ok": true}));
    assert_eq!(sleeper.slept(), vec![2 * SECOND, 4 * SECOND]);
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn retry_after_hint_is_slept_exactly() {
    let transport = ScriptedTransport::new()
        .then(Reply::status(429, ""))
        .then(Reply::status(429, ""))
        .then(Reply::throttled(429, "5"))
        .then(Reply::ok(&json!({})));
    let sleeper = RecordingSleeper::new();

    client(&transport, &sleeper, RetryPolicy::new(5, 2 * SECOND))
        .request_json(&ApiRequest::get("/x"))
        .await
        .expect("fourth attempt succeeds");

    assert_eq!(sleeper.slept(), vec![2 * SECOND, 4 * SECOND, 5 * SECOND]);
}

#[tokio::test]
async fn hint_does_not_advance_the_backoff() {
    let transport = ScriptedTransport::new()
        .then(Reply::throttled(503, "7"))
        .then(Reply::status(503, ""))
        .then(Reply::ok(&json!({})));
    let sleeper = RecordingSleeper::new();

    client(&transport, &sleeper, RetryPolicy::new(5, 2 * SECOND))
        .request_json(&ApiRequest::get("/x"))
        .await
        .expect("third attempt succeeds");

    assert_eq!(sleeper.slept(), vec![7 * SECOND, 2 * SECOND]);
}

#[tokio::test]
async fn zero_retries_fails_on_first_throttle() {
    let transport = ScriptedTransport::new().then(Reply::status(429, "slow down"));
    let sleeper = RecordingSleeper::new();

    let err = client(&transport, &sleeper, RetryPolicy::new(0, 2 * SECOND))
        .request_json(&ApiRequest::get("/x"))
        .await
        .expect_err("no retries allowed");

    assert_eq!(err.status(), Some(429));
    assert!(sleeper.slept().is_empty());
}

fn only_transport_failures(kind: &FailureKind) -> bool {
    matches!(kind, FailureKind::Transport)
}

#[tokio::test]
async fn custom_predicate_narrows_what_is_retried() {
    let transport = ScriptedTransport::new()
        .then(Reply::Fail("connection refused".to_string()))
        .then(Reply::status(429, ""));
    let sleeper = RecordingSleeper::new();
    let policy = RetryPolicy::new(5, SECOND).with_predicate(only_transport_failures);

    let err = client(&transport, &sleeper, policy)
        .request_json(&ApiRequest::get("/x"))
        .await
        .expect_err("429 is not retried under this predicate");

    assert_eq!(err.status(), Some(429));
    assert_eq!(sleeper.slept(), vec![SECOND]);
    assert_eq!(transport.calls(), 2);
}

// =============================================================================
// Pagination
// =============================================================================

#[tokio::test]
async fn offset_pagination_stops_at_total() {
    let transport = ScriptedTransport::new()
        .then(Reply::ok(&json!({"issues": [{"key": "A-1"}, {"key": "A-2"}], "total": 3})))
        .then(Reply::ok(&json!({"issues": [{"key": "A-3"}], "total": 3})));
    let sleeper = RecordingSleeper::new();

    let issues = client(&transport, &sleeper, RetryPolicy::new(0, SECOND))
        .search_all(&SearchQuery::new("project = A", ["summary"]), 2, 0)
        .await
        .expect("search succeeds");

    assert_eq!(issues.len(), 3);
    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].body.as_ref().expect("body").get("startAt").is_none());
    assert_eq!(requests[1].body.as_ref().expect("body")["startAt"], 2);
}

#[tokio::test]
async fn repeated_offset_page_does_not_end_the_run_before_total() {
    let transport = ScriptedTransport::new()
        .then(Reply::ok(&json!({"issues": [{"key": "A-1"}, {"key": "A-2"}], "total": 6})))
        .then(Reply::ok(&json!({"issues": [{"key": "A-1"}, {"key": "A-2"}], "total": 6})))
        .then(Reply::ok(&json!({"issues": [{"key": "A-5"}, {"key": "A-6"}], "total": 6})));
    let sleeper = RecordingSleeper::new();

    let issues = client(&transport, &sleeper, RetryPolicy::new(0, SECOND))
        .search_all(&SearchQuery::new("project = A", ["summary"]), 2, 0)
        .await
        .expect("search succeeds");

    let keys: Vec<&str> = issues.iter().filter_map(|i| i["key"].as_str()).collect();
    assert_eq!(keys, vec!["A-1", "A-2", "A-5", "A-6"]);
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn max_pages_caps_the_run() {
    let transport = ScriptedTransport::new()
        .then(Reply::ok(&json!({"issues": [{"key": "A-1"}], "nextPageToken": "p2"})))
        .then(Reply::ok(&json!({"issues": [{"key": "A-2"}], "nextPageToken": "p3"})));
    let sleeper = RecordingSleeper::new();

    let issues = client(&transport, &sleeper, RetryPolicy::new(0, SECOND))
        .search_all(&SearchQuery::new("project = A", ["summary"]), 1, 1)
        .await
        .expect("search succeeds");

    assert_eq!(issues.len(), 1);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn throttled_page_is_retried_mid_run() {
    let transport = ScriptedTransport::new()
        .then(Reply::ok(&json!({"issues": [{"key": "A-1"}], "nextPageToken": "p2"})))
        .then(Reply::throttled(429, "1"))
        .then(Reply::ok(&json!({"issues": [{"key": "A-2"}], "isLast": true})));
    let sleeper = RecordingSleeper::new();

    let issues = client(&transport, &sleeper, RetryPolicy::new(3, 2 * SECOND))
        .search_all(&SearchQuery::new("project = A", ["summary"]), 1, 0)
        .await
        .expect("search succeeds");

    assert_eq!(issues.len(), 2);
    assert_eq!(sleeper.slept(), vec![SECOND]);
    let retried = transport.requests()[2].body.clone().expect("body");
    assert_eq!(retried["nextPageToken"], "p2");
}
