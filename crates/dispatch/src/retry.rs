//! Bounded retries with backoff around [`dispatch`].

use std::time::Duration;

use mailsync_core::config::RetryConfig;
use mailsync_core::outcome::RETRIES_EXHAUSTED;
use mailsync_core::{DispatchOutcome, MappedContact};
use tracing::warn;

use crate::dispatcher::{dispatch, Attempt};
use crate::traits::ContactApi;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Fixed pause between attempts.
    pub fn fixed(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
            multiplier: 1.0,
            max_backoff: backoff,
        }
    }

    /// Pause after the given failed attempt (1-based).
    ///
    /// A server-provided `Retry-After` lengthens the pause but never past
    /// `max_backoff`.
    pub fn delay_after(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let scaled = self.backoff.as_secs_f64() * self.multiplier.max(1.0).powi(exponent);
        let cap = self.max_backoff.max(self.backoff);
        let base = Duration::try_from_secs_f64(scaled).unwrap_or(cap).min(cap);
        match retry_after {
            Some(hint) if hint > base => hint.min(cap),
            _ => base,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: config.backoff,
            multiplier: config.backoff_multiplier,
            max_backoff: config.max_backoff,
        }
    }
}

/// Dispatch `contact` up to `policy.max_attempts` times.
///
/// Settled attempts end the loop immediately. When every attempt was
/// transient the outcome carries [`RETRIES_EXHAUSTED`] and the last status.
pub async fn with_retries(
    api: &dyn ContactApi,
    contact: &MappedContact,
    policy: &RetryPolicy,
) -> DispatchOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match dispatch(api, contact).await {
            Attempt::Settled(mut outcome) => {
                outcome.attempts_used = attempt;
                return outcome;
            }
            Attempt::Transient { outcome, retry_after } => {
                if attempt >= max_attempts {
                    warn!(
                        email = %contact.email,
                        attempts = attempt,
                        last_error = outcome.error.as_deref().unwrap_or(""),
                        "giving up on contact"
                    );
                    return DispatchOutcome::failed(
                        &contact.email,
                        outcome.status_code,
                        RETRIES_EXHAUSTED,
                        attempt,
                    );
                }
                let delay = policy.delay_after(attempt, retry_after);
                warn!(
                    email = %contact.email,
                    attempt,
                    status = ?outcome.status_code,
                    reason = outcome.error.as_deref().unwrap_or(""),
                    delay_ms = delay.as_millis() as u64,
                    "dispatch failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{ApiResponse, DispatchError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Replays scripted statuses, then repeats the last one.
    struct ScriptedApi {
        statuses: Mutex<Vec<u16>>,
        calls: Arc<AtomicUsize>,
        retry_after: Option<Duration>,
    }

    impl ScriptedApi {
        fn new(statuses: &[u16]) -> Self {
            Self {
                statuses: Mutex::new(statuses.iter().rev().copied().collect()),
                calls: Arc::new(AtomicUsize::new(0)),
                retry_after: None,
            }
        }
    }

    #[async_trait::async_trait]
    impl ContactApi for ScriptedApi {
        async fn create_contact(&self, _contact: &MappedContact) -> Result<ApiResponse, DispatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut statuses = self.statuses.lock().unwrap();
            let status = if statuses.len() > 1 {
                statuses.pop().unwrap()
            } else {
                statuses[0]
            };
            Ok(ApiResponse {
                status,
                body: format!("status {status}"),
                retry_after: self.retry_after,
            })
        }
        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn contact() -> MappedContact {
        MappedContact::new("a@x.com", true)
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_503_uses_every_attempt() {
        let api = ScriptedApi::new(&[503]);
        let policy = RetryPolicy::fixed(3, Duration::from_secs(1));
        let start = tokio::time::Instant::now();

        let outcome = with_retries(&api, &contact(), &policy).await;

        assert_eq!(api.calls.load(Ordering::SeqCst), 3);
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some(RETRIES_EXHAUSTED));
        assert_eq!(outcome.status_code, Some(503));
        assert_eq!(outcome.attempts_used, 3);
        // two pauses between three attempts
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn conflict_short_circuits() {
        let api = ScriptedApi::new(&[409]);
        let outcome = with_retries(&api, &contact(), &RetryPolicy::fixed(3, Duration::from_secs(1))).await;

        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        assert!(outcome.success);
        assert!(outcome.is_already_exists());
        assert_eq!(outcome.attempts_used, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failure() {
        let api = ScriptedApi::new(&[500, 201]);
        let outcome = with_retries(&api, &contact(), &RetryPolicy::fixed(3, Duration::from_secs(1))).await;

        assert!(outcome.success);
        assert_eq!(outcome.status_code, Some(201));
        assert_eq!(outcome.attempts_used, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn client_error_is_not_retried() {
        let api = ScriptedApi::new(&[422]);
        let outcome = with_retries(&api, &contact(), &RetryPolicy::fixed(3, Duration::from_secs(1))).await;

        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("status 422"));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_lengthens_pause() {
        let mut api = ScriptedApi::new(&[429, 201]);
        api.retry_after = Some(Duration::from_secs(5));
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
            multiplier: 1.0,
            max_backoff: Duration::from_secs(30),
        };
        let start = tokio::time::Instant::now();

        let outcome = with_retries(&api, &contact(), &policy).await;

        assert!(outcome.success);
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[test]
    fn exponential_delay_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 5,
            backoff: Duration::from_secs(1),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(3),
        };
        assert_eq!(policy.delay_after(1, None), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2, None), Duration::from_secs(2));
        assert_eq!(policy.delay_after(3, None), Duration::from_secs(3));
        assert_eq!(policy.delay_after(1, Some(Duration::from_secs(60))), Duration::from_secs(3));
    }
}
