//! Bounded retry with exponential backoff for transient storage failures.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::db::errors::DbError;

/// Configuration for retrying transient store failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Retries after the first attempt. Zero disables retrying.
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub backoff_factor: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_ms: 100,
            backoff_factor: 2,
            max_backoff_ms: 2000,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (zero-based): `backoff_ms * factor^attempt`, capped.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let multiplier = self.backoff_factor.saturating_pow(attempt);
        let ms = self.backoff_ms.saturating_mul(multiplier).min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Run `op`, retrying while it fails with a transient [`DbError`].
///
/// Non-transient errors are returned immediately. After `max_retries` retries the last error is
/// returned.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, op_name: &str, mut op: F) -> Result<T, DbError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < config.max_retries => {
                let delay = config.backoff_for(attempt);
                warn!(
                    operation = op_name,
                    attempt = attempt + 1,
                    max_retries = config.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient store failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
