//! Resilient client for the issue tracker's REST API.
//!
//! All calls go through [`ApiClient::request_json`], which applies the
//! single [`RetryPolicy`] to every request: throttling and transport
//! failures are retried with backoff, anything else surfaces immediately
//! as a [`ClientError`].
//!
//! # Layers
//!
//! - [`transport`]: one attempt on the wire ([`Transport`], [`HttpTransport`])
//! - [`retry`]: failure classification, backoff, the [`Sleeper`] seam
//! - [`pagination`]: token and offset continuation over search results

pub mod pagination;
pub mod retry;
pub mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use pagination::{PageRequest, PageTracker};
pub use retry::{FailureKind, RetryPolicy, Sleeper, TokioSleeper};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, Transport};

use crate::config::{Credentials, HttpSettings};
use crate::error::ClientError;
use serde_json::{Map, Value, json};

/// Search endpoint supporting both token and offset continuation.
pub const SEARCH_PATH: &str = "/rest/api/3/search/jql";

/// Single issue endpoint; the key is appended as one encoded path segment.
pub const ISSUE_PATH: &str = "/rest/api/3/issue";

/// Relationship detail endpoint, keyed by internal issue id.
pub const DEV_STATUS_PATH: &str = "/rest/dev-status/1.0/issue/detail";

/// Source-hosting integration queried for change requests.
pub const DEV_STATUS_APPLICATION: &str = "bitbucket";

/// Relationship detail kind holding change requests.
pub const DEV_STATUS_DATA_TYPE: &str = "pullrequest";

/// Longest response body excerpt kept in a [`ClientError::Status`].
const ERROR_BODY_LIMIT: usize = 512;

/// A search expression and the fields to return per issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Query expression
    pub jql: String,
    /// Fields to include in each issue
    pub fields: Vec<String>,
}

impl SearchQuery {
    /// Creates a query returning the given fields.
    pub fn new<I, S>(jql: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            jql: jql.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// Issue tracker client: a transport, a sleeper and one retry policy.
pub struct ApiClient {
    transport: Box<dyn Transport>,
    sleeper: Box<dyn Sleeper>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Creates a client over `transport` with the default policy, sleeping
    /// on the tokio timer.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            sleeper: Box::new(TokioSleeper),
            policy: RetryPolicy::default(),
        }
    }

    /// Builds the production client from credentials and HTTP settings.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the HTTP client cannot be built.
    pub fn connect(credentials: &Credentials, http: &HttpSettings) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(credentials, http.timeout())?;
        Ok(Self::new(transport).with_policy(http.retry_policy()))
    }

    /// Replaces the sleeper used between attempts.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The active retry policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Sends `request` under the retry policy and decodes the JSON body.
    ///
    /// An empty success body decodes to `Value::Null`.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Status`] for a non-retryable status, or a retryable
    ///   one that persisted through every retry
    /// - [`ClientError::Transport`] when the connection kept failing
    /// - [`ClientError::Decode`] when a success body is not JSON
    pub async fn request_json(&self, request: &ApiRequest) -> Result<Value, ClientError> {
        let mut state = self.policy.start();

        loop {
            let (error, hint) = match self.transport.send(request).await {
                Ok(response) if response.is_success() => return decode(request, &response.body),
                Ok(response) => {
                    let hint = response
                        .retry_after
                        .as_deref()
                        .and_then(retry::parse_retry_after);
                    let error = ClientError::Status {
                        status: response.status,
                        url: request.path.clone(),
                        body: excerpt(&response.body),
                    };
                    (error, hint)
                }
                Err(error) => (error, None),
            };

            let delay = FailureKind::of(&error).and_then(|kind| state.next_delay(&kind, hint));
            let Some(delay) = delay else {
                tracing::debug!(path = %request.path, attempts = state.attempt() + 1, %error, "request failed");
                return Err(error);
            };

            tracing::warn!(
                path = %request.path,
                retry = state.attempt(),
                max_retries = self.policy.max_retries(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                %error,
                "retrying request"
            );
            self.sleeper.sleep(delay).await;
        }
    }

    /// Fetches one page of search results.
    ///
    /// # Errors
    ///
    /// Propagates [`request_json`](Self::request_json) failures.
    pub async fn search_page(
        &self,
        query: &SearchQuery,
        page: &PageRequest,
    ) -> Result<Value, ClientError> {
        let mut body = Map::new();
        body.insert("jql".to_string(), json!(query.jql));
        body.insert("fields".to_string(), json!(query.fields));
        body.insert("maxResults".to_string(), json!(page.max_results));
        match &page.next_page_token {
            Some(token) => {
                body.insert("nextPageToken".to_string(), json!(token));
            }
            None if page.start_at > 0 => {
                body.insert("startAt".to_string(), json!(page.start_at));
            }
            None => {}
        }

        self.request_json(&ApiRequest::post(SEARCH_PATH, Value::Object(body)))
            .await
    }

    /// Runs a search to completion and returns every distinct issue in
    /// result order.
    ///
    /// `max_pages == 0` means no page cap.
    ///
    /// # Errors
    ///
    /// Fails on the first page that fails; issues gathered so far are
    /// discarded.
    pub async fn search_all(
        &self,
        query: &SearchQuery,
        page_size: usize,
        max_pages: usize,
    ) -> Result<Vec<Value>, ClientError> {
        let mut tracker = PageTracker::new(page_size, max_pages);
        let mut issues = Vec::new();

        while let Some(page) = tracker.next_request() {
            let response = self.search_page(query, &page).await?;
            issues.extend(tracker.accept(response));
        }

        tracing::info!(pages = tracker.pages(), issues = issues.len(), "search complete");
        Ok(issues)
    }

    /// Fetches one issue with the given fields.
    ///
    /// # Errors
    ///
    /// Propagates [`request_json`](Self::request_json) failures.
    pub async fn issue_detail(&self, key: &str, fields: &[&str]) -> Result<Value, ClientError> {
        let request = ApiRequest::get(format!("{ISSUE_PATH}/{}", urlencoding::encode(key)))
            .query("fields", fields.join(","));
        self.request_json(&request).await
    }

    /// Resolves an issue key to the tracker's internal id.
    ///
    /// Returns an empty string when the response carries no id.
    ///
    /// # Errors
    ///
    /// Propagates [`request_json`](Self::request_json) failures.
    pub async fn resolve_issue_id(&self, key: &str) -> Result<String, ClientError> {
        let detail = self.issue_detail(key, &[]).await?;
        let id = match detail.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => String::new(),
        };
        Ok(id)
    }

    /// Fetches change-request relationship detail for an internal issue id.
    ///
    /// # Errors
    ///
    /// Propagates [`request_json`](Self::request_json) failures.
    pub async fn dev_status_detail(&self, issue_id: &str) -> Result<Value, ClientError> {
        let request = ApiRequest::get(DEV_STATUS_PATH)
            .query("issueId", issue_id)
            .query("applicationType", DEV_STATUS_APPLICATION)
            .query("dataType", DEV_STATUS_DATA_TYPE);
        self.request_json(&request).await
    }
}

fn decode(request: &ApiRequest, body: &str) -> Result<Value, ClientError> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|source| ClientError::Decode {
        url: request.path.clone(),
        source,
    })
}

fn excerpt(body: &str) -> String {
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((cut, _)) => body[..cut].to_string(),
        None => body.to_string(),
    }
}
