use std::sync::Arc;
use std::time::Duration;

use agentscore_core::{AgentScoreError, ChatModel, ChatRequest, ChatResponse};
use async_trait::async_trait;

/// Backoff schedule for judge calls.
///
/// Only rate limits and timeouts are retried; a malformed request or an
/// unparseable reply fails on the first attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total calls, including the first one.
    pub max_attempts: usize,
    pub base_delay: Duration,
    /// Upper bound for a single wait.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Self::default()
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Wait before retry number `retry` (0-based): `base_delay * 2^retry`,
    /// capped at `max_delay`.
    pub fn backoff(&self, retry: u32) -> Duration {
        self.base_delay
            .checked_mul(2u32.saturating_pow(retry))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    pub fn should_retry(&self, error: &AgentScoreError) -> bool {
        matches!(
            error,
            AgentScoreError::RateLimit(_) | AgentScoreError::Timeout(_)
        )
    }
}

/// Wraps the judge's chat model so transient provider errors do not turn
/// into `missing` outputs.
pub struct RetryChatModel {
    inner: Arc<dyn ChatModel>,
    policy: RetryPolicy,
}

impl RetryChatModel {
    pub fn new(inner: Arc<dyn ChatModel>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl ChatModel for RetryChatModel {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, AgentScoreError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut retry = 0u32;
        loop {
            let error = match self.inner.chat(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };
            let attempt = retry as usize + 1;
            if attempt >= attempts || !self.policy.should_retry(&error) {
                return Err(error);
            }
            let delay = self.policy.backoff(retry);
            tracing::warn!(
                attempt,
                max_attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "judge call failed, retrying"
            );
            tokio::time::sleep(delay).await;
            retry += 1;
        }
    }
}
