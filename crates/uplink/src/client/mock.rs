//! Scripted transport and recording sleeper for exercising the client
//! without sockets or real time.
//!
//! Available in unit tests and, for downstream test suites, behind the
//! `test-util` feature.

use super::retry::Sleeper;
use super::transport::{ApiRequest, ApiResponse, Transport};
use crate::error::ClientError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// One scripted outcome.
#[derive(Debug, Clone)]
pub enum Reply {
    /// The server answers.
    Respond(ApiResponse),
    /// The connection fails.
    Fail(String),
}

impl Reply {
    /// A 200 response with a JSON body.
    pub fn ok(body: &serde_json::Value) -> Self {
        Self::status(200, &body.to_string())
    }

    /// A response with the given status and raw body.
    pub fn status(status: u16, body: &str) -> Self {
        Self::Respond(ApiResponse {
            status,
            retry_after: None,
            body: body.to_string(),
        })
    }

    /// A throttling response carrying a `Retry-After` value.
    pub fn throttled(status: u16, retry_after: &str) -> Self {
        Self::Respond(ApiResponse {
            status,
            retry_after: Some(retry_after.to_string()),
            body: String::new(),
        })
    }
}

#[derive(Debug, Default)]
struct Script {
    /// Replies matched by path prefix, consumed in order.
    routes: Vec<(String, VecDeque<Reply>)>,
    /// Replies for requests no route matches, consumed in order.
    fallback: VecDeque<Reply>,
    requests: Vec<ApiRequest>,
}

/// Transport that replays scripted replies and records every request.
///
/// Clones share the same script, so a test can keep a handle for
/// inspection after moving one into the client.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    /// Creates a transport with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply for the next request no route matches.
    #[must_use]
    pub fn then(self, reply: Reply) -> Self {
        self.lock().fallback.push_back(reply);
        self
    }

    /// Queues a reply for the next request whose path starts with `prefix`.
    #[must_use]
    pub fn route(self, prefix: &str, reply: Reply) -> Self {
        {
            let mut script = self.lock();
            match script.routes.iter_mut().find(|(p, _)| p == prefix) {
                Some((_, replies)) => replies.push_back(reply),
                None => script.routes.push((prefix.to_string(), VecDeque::from([reply]))),
            }
        }
        self
    }

    /// Every request sent so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.lock().requests.clone()
    }

    /// Number of requests sent so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.lock().requests.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        let reply = {
            let mut script = self.lock();
            script.requests.push(request.clone());
            let routed = script
                .routes
                .iter_mut()
                .find(|(prefix, replies)| request.path.starts_with(prefix.as_str()) && !replies.is_empty())
                .and_then(|(_, replies)| replies.pop_front());
            routed.or_else(|| script.fallback.pop_front())
        };

        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail(message)) => Err(ClientError::Transport {
                url: request.path.clone(),
                message,
            }),
            None => Ok(ApiResponse {
                status: 404,
                retry_after: None,
                body: format!("no scripted reply for {}", request.path),
            }),
        }
    }
}

/// Sleeper that returns immediately and records each requested delay.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    slept: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    /// Creates a sleeper with no recorded delays.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order.
    #[must_use]
    pub fn slept(&self) -> Vec<Duration> {
        self.slept
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
    }
}
