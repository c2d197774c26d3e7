//! Fixed-interval polling.
//!
//! Writes to server profiles wait for the backend to settle: the profile must
//! not be mid-apply and the hardware must not be power-locked. Both waits
//! retry at a fixed interval. By default they never give up; a bounded
//! policy turns exhaustion into [`SyncError::TransientGateway`].

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};

/// How often and how long to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between attempts.
    pub interval: Duration,
    /// Attempt limit; `None` polls until the condition holds.
    pub max_attempts: Option<u32>,
}

impl PollPolicy {
    /// Polls forever at `interval`.
    pub const fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }

    /// Polls at most `max_attempts` times.
    pub const fn bounded(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: Some(max_attempts),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Calls `probe` until it returns `Ok(true)`, sleeping between attempts.
///
/// Retryable probe errors count as "not yet"; any other error is returned
/// immediately. Returns the number of attempts made.
pub async fn poll_until<F, Fut>(what: &str, policy: PollPolicy, mut probe: F) -> SyncResult<u32>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SyncResult<bool>>,
{
    let mut attempts: u32 = 0;
    loop {
        attempts = attempts.saturating_add(1);
        match probe().await {
            Ok(true) => return Ok(attempts),
            Ok(false) => debug!("Waiting for {} (attempt {})", what, attempts),
            Err(e) if e.is_retryable() => {
                warn!("Waiting for {} (attempt {}): {}", what, attempts, e)
            }
            Err(e) => return Err(e),
        }

        if let Some(max) = policy.max_attempts {
            if attempts >= max {
                return Err(SyncError::transient(
                    what,
                    format!("condition not met after {} attempts", attempts),
                ));
            }
        }
        tokio::time::sleep(policy.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_eventually_true() {
        let calls = AtomicU32::new(0);
        let attempts = poll_until("lock", PollPolicy::unbounded(Duration::from_secs(30)), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(n >= 3) }
        })
        .await
        .unwrap();
        assert_eq!(attempts, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_policy_exhausts() {
        let err = poll_until("profile", PollPolicy::bounded(Duration::from_secs(5), 3), || async {
            Ok(false)
        })
        .await
        .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(
            err.to_string(),
            "Transient fabric failure during profile: condition not met after 3 attempts"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_errors_keep_polling() {
        let calls = AtomicU32::new(0);
        let attempts = poll_until("hardware", PollPolicy::unbounded(Duration::from_secs(1)), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(SyncError::transient("get", "503"))
                } else {
                    Ok(true)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hard_error_stops_polling() {
        let err = poll_until("hardware", PollPolicy::unbounded(Duration::from_secs(1)), || async {
            Err(SyncError::vanished("sh-1"))
        })
        .await
        .unwrap_err();
        assert!(err.is_vanished());
    }
}
