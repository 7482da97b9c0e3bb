//! The seam between the API client and the wire.
//!
//! [`ApiClient`](super::ApiClient) only ever talks to a [`Transport`]; the
//! retry loop, pagination and decoding sit above it. [`HttpTransport`] is
//! the production implementation over `reqwest`. Tests plug in scripted
//! transports instead.

use crate::config::Credentials;
use crate::error::ClientError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, RETRY_AFTER};
use serde_json::Value;
use std::time::Duration;

/// HTTP verb of an [`ApiRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Read request
    Get,
    /// Request with a JSON body
    Post,
}

/// One request against the issue tracker, relative to its base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP verb
    pub method: Method,
    /// Path below the base URL, starting with `/`
    pub path: String,
    /// Query parameters in order
    pub query: Vec<(String, String)>,
    /// JSON body for `POST`
    pub body: Option<Value>,
}

impl ApiRequest {
    /// A `GET` request without query parameters.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// A `POST` request carrying `body` as JSON.
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }
}

/// Raw response as seen by the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw `Retry-After` header value, if any
    pub retry_after: Option<String>,
    /// Response body text
    pub body: String,
}

impl ApiResponse {
    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request and returns the raw response.
///
/// Implementations report connection, timeout and body transfer failures
/// as [`ClientError::Transport`]; any response the server actually sent,
/// whatever its status, is returned as `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs a single attempt of `request`.
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError>;
}

/// `reqwest`-backed transport with basic auth and a per-call timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    email: String,
    api_token: String,
}

impl HttpTransport {
    /// Builds a transport for the given account.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the TLS backend cannot be
    /// initialised.
    pub fn new(credentials: &Credentials, timeout: Duration) -> Result<Self, ClientError> {
        let base_url = credentials.base_url.trim_end_matches('/').to_string();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Transport {
                url: base_url.clone(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url,
            email: credentials.email.clone(),
            api_token: credentials.api_token.clone(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        let url = format!("{}{}", self.base_url, request.path);
        let transport_error = |e: reqwest::Error| ClientError::Transport {
            url: url.clone(),
            message: e.to_string(),
        };

        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        builder = builder
            .basic_auth(&self.email, Some(&self.api_token))
            .header(ACCEPT, "application/json")
            .query(&request.query);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(transport_error)?;

        tracing::debug!(method = ?request.method, %url, status, "api response");
        Ok(ApiResponse {
            status,
            retry_after,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builders_keep_query_order() {
        let request = ApiRequest::get("/rest/dev-status/1.0/issue/detail")
            .query("issueId", "10001")
            .query("applicationType", "bitbucket")
            .query("dataType", "pullrequest");

        assert_eq!(request.method, Method::Get);
        let names: Vec<&str> = request.query.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["issueId", "applicationType", "dataType"]);
        assert!(request.body.is_none());

        let post = ApiRequest::post("/rest/api/3/search/jql", json!({"jql": "project = A"}));
        assert_eq!(post.method, Method::Post);
        assert_eq!(post.body, Some(json!({"jql": "project = A"})));
    }

    #[test]
    fn success_range() {
        let response = |status| ApiResponse {
            status,
            retry_after: None,
            body: String::new(),
        };
        assert!(response(200).is_success());
        assert!(response(204).is_success());
        assert!(!response(302).is_success());
        assert!(!response(429).is_success());
    }
}
