//! Exponential backoff with jitter for idempotent requests

use crate::cancel::Cancellation;
use crate::config::ClientConfig;
use crate::error::RpcError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Fraction of the backoff added or removed at random (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            jitter_factor: 0.2,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            max_attempts: config.max_query_retries.saturating_add(1),
            base_backoff: Duration::from_millis(config.retry_base_backoff_ms),
            max_backoff: Duration::from_millis(config.retry_max_backoff_ms),
            ..Self::default()
        }
    }

    /// Backoff before retry number `attempt + 1` (0-indexed)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_backoff.as_millis() as f64;
        let exp_backoff = base * 2_f64.powi(attempt.min(30) as i32);
        let capped = exp_backoff.min(self.max_backoff.as_millis() as f64);

        let jitter_range = capped * self.jitter_factor.clamp(0.0, 1.0);
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };

        Duration::from_millis((capped + jitter).max(0.0) as u64)
    }
}

/// Retry `operation` on transient errors, backing off between attempts.
/// Permanent errors and cancellation return immediately.
pub async fn retry_with_backoff<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    cancel: &Cancellation,
    mut operation: F,
) -> Result<T, RpcError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RpcError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            debug!(
                operation = operation_name,
                attempt = attempt + 1,
                max_attempts,
                "Retrying operation"
            );
        }

        let err = match cancel.run(operation()).await {
            Ok(result) => return Ok(result),
            Err(err) => err,
        };

        if !err.is_transient() {
            if err != RpcError::Cancelled {
                debug!(operation = operation_name, error = %err, "Permanent error, not retrying");
            }
            return Err(err);
        }

        attempt += 1;
        if attempt >= max_attempts {
            warn!(
                operation = operation_name,
                attempts = attempt,
                error = %err,
                "All retry attempts exhausted"
            );
            return Err(err);
        }

        let backoff = policy.backoff(attempt - 1);
        debug!(
            operation = operation_name,
            attempt,
            backoff_ms = backoff.as_millis() as u64,
            error = %err,
            "Transient error, backing off before retry"
        );
        cancel
            .run(async {
                sleep(backoff).await;
                Ok(())
            })
            .await?;
    }
}
