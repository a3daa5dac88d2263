//! Retry decisions and backoff computation.

use std::time::Duration;

use crate::Error;

use super::request::Request;

/// What to do with a request after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetryDecision {
    /// Put the request back on the queue after `delay`.
    Requeue { delay: Duration },
    /// Resolve the request with the terminal error.
    Fail,
}

/// Decides whether a failed request goes back on the queue and with what
/// backoff. Deterministic and stateless apart from its delay bounds.
pub(crate) struct RetryCoordinator {
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryCoordinator {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    /// `attempt` failed with `error`; `backoff_factor` comes from the
    /// provider that failed.
    pub fn decide(&self, request: &Request, error: &Error, backoff_factor: f64) -> RetryDecision {
        if !error.is_transient() {
            return RetryDecision::Fail;
        }
        if request.retry_count >= request.max_retries {
            return RetryDecision::Fail;
        }
        RetryDecision::Requeue {
            delay: self.backoff(request.retry_count, backoff_factor),
        }
    }

    /// Exponential backoff: `base * factor^retries`, capped at `max_delay`.
    fn backoff(&self, retry_count: u32, factor: f64) -> Duration {
        let factor = if factor.is_finite() && factor >= 1.0 {
            factor
        } else {
            1.0
        };
        let scaled = self.base_delay.as_millis() as f64 * factor.powi(retry_count as i32);
        let capped = scaled.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn coordinator() -> RetryCoordinator {
        RetryCoordinator::new(Duration::from_millis(100), Duration::from_millis(1_000))
    }

    fn request_with_retries(retry_count: u32, max_retries: u32) -> Request {
        let (mut request, _rx) =
            Request::new(json!({}), Duration::from_secs(1), 0, None, max_retries);
        request.retry_count = retry_count;
        request
    }

    #[test]
    fn test_transient_error_is_requeued() {
        let request = request_with_retries(0, 3);
        let decision = coordinator().decide(&request, &Error::provider("a", "boom"), 2.0);
        assert_eq!(
            decision,
            RetryDecision::Requeue {
                delay: Duration::from_millis(100)
            }
        );
    }

    #[test]
    fn test_backoff_grows_exponentially_and_caps() {
        let coordinator = coordinator();
        assert_eq!(coordinator.backoff(0, 2.0), Duration::from_millis(100));
        assert_eq!(coordinator.backoff(1, 2.0), Duration::from_millis(200));
        assert_eq!(coordinator.backoff(2, 2.0), Duration::from_millis(400));
        // 100 * 2^6 = 6400, capped at 1000.
        assert_eq!(coordinator.backoff(6, 2.0), Duration::from_millis(1_000));
    }

    #[test]
    fn test_degenerate_backoff_factor_falls_back_to_base() {
        let coordinator = coordinator();
        assert_eq!(coordinator.backoff(4, 0.0), Duration::from_millis(100));
        assert_eq!(coordinator.backoff(4, f64::NAN), Duration::from_millis(100));
    }

    #[test]
    fn test_exhausted_budget_fails() {
        let request = request_with_retries(3, 3);
        let decision = coordinator().decide(&request, &Error::provider("a", "boom"), 2.0);
        assert_eq!(decision, RetryDecision::Fail);
    }

    #[test]
    fn test_terminal_errors_fail_immediately() {
        let request = request_with_retries(0, 3);
        let coordinator = coordinator();
        assert_eq!(
            coordinator.decide(&request, &Error::NoProvidersAvailable, 2.0),
            RetryDecision::Fail
        );
        assert_eq!(
            coordinator.decide(&request, &Error::Shutdown, 2.0),
            RetryDecision::Fail
        );
    }

    #[test]
    fn test_rate_limited_and_timeout_are_retried() {
        let request = request_with_retries(1, 3);
        let coordinator = coordinator();
        assert!(matches!(
            coordinator.decide(
                &request,
                &Error::RateLimited {
                    provider: "a".into()
                },
                2.0
            ),
            RetryDecision::Requeue { .. }
        ));
        assert!(matches!(
            coordinator.decide(
                &request,
                &Error::RequestTimeout {
                    provider: "a".into(),
                    timeout_ms: 10
                },
                2.0
            ),
            RetryDecision::Requeue { .. }
        ));
    }
}
