//! Retry policy for issue tracker calls.
//!
//! One [`RetryPolicy`] value governs every request the client makes. A
//! failure is first classified into a [`FailureKind`]; the policy's
//! predicate decides whether that kind is retried at all, and a
//! per-request [`RetryState`] tracks attempts and the doubling backoff.
//!
//! A server-supplied `Retry-After` hint is honoured exactly and leaves the
//! backoff untouched; without a hint the current backoff is used and then
//! doubled. The backoff has no ceiling.

use crate::error::ClientError;
use async_trait::async_trait;
use std::time::Duration;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default initial backoff.
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_secs(2);

/// Retry-relevant classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Server answered with a non-success status
    Status(u16),
    /// No usable response (connect, timeout, body read)
    Transport,
}

impl FailureKind {
    /// Classifies a client error. Decode failures are never retryable and
    /// have no kind.
    #[must_use]
    pub fn of(error: &ClientError) -> Option<Self> {
        match error {
            ClientError::Status { status, .. } => Some(Self::Status(*status)),
            ClientError::Transport { .. } => Some(Self::Transport),
            ClientError::Decode { .. } => None,
        }
    }
}

/// Default predicate: throttling (429), unavailability (503) and transport
/// failures are retried.
#[must_use]
pub fn retry_throttled_or_unreachable(kind: &FailureKind) -> bool {
    matches!(kind, FailureKind::Status(429 | 503) | FailureKind::Transport)
}

/// Parses a `Retry-After` value given in (possibly fractional) seconds.
///
/// HTTP-date values and garbage yield `None`, which makes the caller fall
/// back to its own backoff.
#[must_use]
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

/// Attempt budget, initial backoff and retry predicate.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_retries: u32,
    base_backoff: Duration,
    retry_on: fn(&FailureKind) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_BASE_BACKOFF)
    }
}

impl RetryPolicy {
    /// Creates a policy with the default predicate.
    #[must_use]
    pub fn new(max_retries: u32, base_backoff: Duration) -> Self {
        Self {
            max_retries,
            base_backoff,
            retry_on: retry_throttled_or_unreachable,
        }
    }

    /// Replaces the retry predicate.
    #[must_use]
    pub fn with_predicate(mut self, retry_on: fn(&FailureKind) -> bool) -> Self {
        self.retry_on = retry_on;
        self
    }

    /// Retries allowed after the first attempt.
    #[must_use]
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Initial backoff.
    #[must_use]
    pub fn base_backoff(&self) -> Duration {
        self.base_backoff
    }

    /// Whether `kind` is retryable at all under this policy.
    #[must_use]
    pub fn retries(&self, kind: &FailureKind) -> bool {
        (self.retry_on)(kind)
    }

    /// Fresh per-request state.
    #[must_use]
    pub fn start(&self) -> RetryState<'_> {
        RetryState {
            policy: self,
            attempt: 0,
            delay: self.base_backoff,
        }
    }
}

/// Attempt counter and current backoff for one logical request.
#[derive(Debug)]
pub struct RetryState<'p> {
    policy: &'p RetryPolicy,
    attempt: u32,
    delay: Duration,
}

impl RetryState<'_> {
    /// Decides what to do after a failed attempt.
    ///
    /// Returns how long to wait before the next attempt, or `None` when the
    /// failure must be surfaced: its kind is not retried, or the retry
    /// budget is spent.
    pub fn next_delay(&mut self, kind: &FailureKind, hint: Option<Duration>) -> Option<Duration> {
        if !self.policy.retries(kind) || self.attempt >= self.policy.max_retries {
            return None;
        }
        self.attempt += 1;

        if let Some(hint) = hint {
            return Some(hint);
        }
        let delay = self.delay;
        self.delay = self.delay.saturating_mul(2);
        Some(delay)
    }

    /// Retries granted so far.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Suspends the calling task between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Waits for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
