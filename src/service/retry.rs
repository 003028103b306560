//! Bounded retry with linear backoff for per-entity reads.

use std::future::Future;
use std::time::Duration;

use crate::error::GatewayError;

/// Retry policy for transient read failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Backoff step; attempt `n` waits `n × backoff`.
    pub backoff: Duration,
}

/// Result of a retried operation plus how many retries it took.
#[derive(Debug)]
pub struct Attempted<T> {
    /// Final outcome.
    pub result: Result<T, GatewayError>,
    /// Retries issued (zero when the first attempt settled it).
    pub retries: u32,
}

impl RetryPolicy {
    /// Policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Runs `op`, retrying while it fails with a transient error.
    ///
    /// Non-transient errors (not found, malformed, configuration) are
    /// returned immediately.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Attempted<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let mut retries = 0;
        loop {
            match op().await {
                Err(e) if e.is_transient() && retries < self.max_retries => {
                    retries += 1;
                    tracing::debug!(entity = label, attempt = retries, error = %e, "retrying read");
                    tokio::time::sleep(self.backoff * retries).await;
                }
                result => return Attempted { result, retries },
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 3,
            backoff: Duration::from_millis(1),
        };
        let attempted = policy
            .run("0x5", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(GatewayError::Transport("flaky".to_string()))
                } else {
                    Ok(7)
                }
            })
            .await;
        assert_eq!(attempted.result, Ok(7));
        assert_eq!(attempted.retries, 2);
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_retries: 2,
            backoff: Duration::ZERO,
        };
        let attempted: Attempted<()> = policy
            .run("0x5", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(GatewayError::Rpc {
                    code: -32000,
                    message: "busy".to_string(),
                })
            })
            .await;
        assert!(attempted.result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_errors() {
        let calls = AtomicU32::new(0);
        let attempted: Attempted<()> = RetryPolicy {
            max_retries: 5,
            backoff: Duration::ZERO,
        }
        .run("0x5", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(GatewayError::NotFound("gone".to_string()))
        })
        .await;
        assert_eq!(attempted.retries, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(RetryPolicy::none().max_retries == 0);
    }
}
