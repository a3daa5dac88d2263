use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Trailing window over which call quota is accounted.
const WINDOW: Duration = Duration::from_secs(60);

/// Poll interval used by `wait_for_slot`.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct RateLimiterSnapshot {
    pub max_calls: u32,
    /// Calls admitted within the current trailing window.
    pub used: u32,
    /// Estimated wait time until a slot frees (ms), if currently exhausted.
    pub estimated_wait_ms: Option<u64>,
}

/// Sliding-window rate limiter.
///
/// Admits at most `max_calls` within any trailing 60-second window. The
/// prune-check-record sequence runs under one lock so concurrent callers
/// cannot overshoot the quota.
pub struct RateLimiter {
    max_calls: u32,
    window_len: Duration,
    window: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_calls: u32) -> Self {
        Self::with_window(max_calls, WINDOW)
    }

    fn with_window(max_calls: u32, window_len: Duration) -> Self {
        Self {
            max_calls,
            window_len,
            window: Mutex::new(VecDeque::new()),
        }
    }

    fn prune(&self, window: &mut VecDeque<Instant>, now: Instant) {
        while let Some(front) = window.front() {
            if now.duration_since(*front) >= self.window_len {
                window.pop_front();
            } else {
                break;
            }
        }
    }

    /// Try to admit one call right now, recording it on success.
    pub async fn acquire(&self) -> bool {
        let mut window = self.window.lock().await;
        let now = Instant::now();
        self.prune(&mut window, now);
        if (window.len() as u32) < self.max_calls {
            window.push_back(now);
            true
        } else {
            false
        }
    }

    /// Poll `acquire` until a slot frees or `timeout` elapses.
    ///
    /// Always makes at least one attempt, so a zero timeout degrades to a
    /// plain `acquire`.
    pub async fn wait_for_slot(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.acquire().await {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    pub async fn snapshot(&self) -> RateLimiterSnapshot {
        let mut window = self.window.lock().await;
        let now = Instant::now();
        self.prune(&mut window, now);
        let used = window.len() as u32;
        let estimated_wait_ms = if used < self.max_calls {
            None
        } else {
            window.front().map(|front| {
                let age = now.duration_since(*front);
                (self.window_len.saturating_sub(age)).as_millis() as u64
            })
        };
        RateLimiterSnapshot {
            max_calls: self.max_calls,
            used,
            estimated_wait_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_admits_up_to_max() {
        let limiter = RateLimiter::new(3);
        assert!(limiter.acquire().await);
        assert!(limiter.acquire().await);
        assert!(limiter.acquire().await);
        // Fourth call within the window is rejected.
        assert!(!limiter.acquire().await);
    }

    #[tokio::test]
    async fn test_rate_limiter_window_rollover() {
        let limiter = RateLimiter::with_window(2, Duration::from_millis(100));
        assert!(limiter.acquire().await);
        assert!(limiter.acquire().await);
        assert!(!limiter.acquire().await);

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(limiter.acquire().await);
    }

    #[tokio::test]
    async fn test_rate_limiter_wait_for_slot_success() {
        let limiter = RateLimiter::with_window(1, Duration::from_millis(150));
        assert!(limiter.acquire().await);
        // Slot frees roughly 150ms in; the poll loop should pick it up.
        assert!(limiter.wait_for_slot(Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn test_rate_limiter_wait_for_slot_timeout() {
        let limiter = RateLimiter::with_window(1, Duration::from_secs(5));
        assert!(limiter.acquire().await);
        assert!(!limiter.wait_for_slot(Duration::from_millis(150)).await);
    }

    #[tokio::test]
    async fn test_rate_limiter_zero_timeout_still_tries_once() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.wait_for_slot(Duration::ZERO).await);
        assert!(!limiter.wait_for_slot(Duration::ZERO).await);
    }

    #[tokio::test]
    async fn test_rate_limiter_snapshot() {
        let limiter = RateLimiter::new(2);
        assert!(limiter.acquire().await);

        let snapshot = limiter.snapshot().await;
        assert_eq!(snapshot.max_calls, 2);
        assert_eq!(snapshot.used, 1);
        assert!(snapshot.estimated_wait_ms.is_none());

        assert!(limiter.acquire().await);
        let snapshot = limiter.snapshot().await;
        assert_eq!(snapshot.used, 2);
        assert!(snapshot.estimated_wait_ms.is_some());
    }

    #[tokio::test]
    async fn test_rate_limiter_concurrent_callers_never_overshoot() {
        use std::sync::Arc;

        let limiter = Arc::new(RateLimiter::new(10));
        let mut handles = vec![];
        for _ in 0..30 {
            let l = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move { l.acquire().await }));
        }

        let mut admitted = 0;
        for h in handles {
            if h.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 10);
    }
}
