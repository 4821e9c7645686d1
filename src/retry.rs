//! Exponential backoff for transient gateway failures
//!
//! The wait after failed attempt `n` (1-based) is
//! `clamp(multiplier * 2^(n-1), min_wait, max_wait)`, giving 4, 4, 4, 8, 10, 10...
//! seconds with the default policy. Only errors for which
//! [`ScoutError::is_transient`] holds are retried.

use crate::error::{Result, ScoutError};
use crate::llm::{ChatMessage, ChatModel};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub multiplier: Duration,
    pub min_wait: Duration,
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            multiplier: Duration::from_secs(1),
            min_wait: Duration::from_secs(4),
            max_wait: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Wait to apply after the given failed attempt (1-based)
    pub fn wait_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let raw = self.multiplier.saturating_mul(1u32 << exponent);
        raw.clamp(self.min_wait, self.max_wait.max(self.min_wait))
    }
}

/// Run `operation` until it succeeds, fails fatally, or attempts run out
///
/// The final underlying error is returned when attempts are exhausted.
pub async fn execute_with_retry<T, Op, Fut, Classify>(
    policy: &RetryPolicy,
    classify_error: Classify,
    mut operation: Op,
) -> Result<T>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    Classify: Fn(&ScoutError) -> bool,
{
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < policy.max_attempts && classify_error(&error) => {
                let wait = policy.wait_for(attempt);
                warn!(
                    attempt = attempt,
                    max_attempts = policy.max_attempts,
                    error = %error,
                    "Model call failed with transient error"
                );
                info!(attempt = attempt, "Retrying in {} seconds...", wait.as_secs_f64());
                tokio::time::sleep(wait).await;
            }
            Err(error) => return Err(error),
        }
    }
}

/// Any [`ChatModel`] wrapped with a retry policy
pub struct RetryingModel<M> {
    inner: M,
    policy: RetryPolicy,
}

impl<M: ChatModel> RetryingModel<M> {
    pub fn new(inner: M, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }
}

#[async_trait]
impl<M: ChatModel> ChatModel for RetryingModel<M> {
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String> {
        execute_with_retry(&self.policy, ScoutError::is_transient, || {
            self.inner.invoke(messages)
        })
        .await
    }
}
