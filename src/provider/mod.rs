//! 提供方适配器：为单一后端叠加并发上限、熔断、配额与运行时指标。
//!
//! Provider adapter: wraps one backend with bounded concurrency, its own
//! circuit breaker, rate limiter and running metrics.
//!
//! The semaphore acquisition inside [`Provider::execute_request`] is the
//! engine's primary backpressure point: excess concurrent demand queues
//! there instead of being dropped or overloading the backend.

pub mod backend;
pub mod factory;
pub mod metrics;

pub use backend::{BackendError, BackendResult, ProviderBackend};
pub use factory::BackendRegistry;
pub use metrics::{MetricsSnapshot, ProviderMetrics};

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::resilience::rate_limiter::RateLimiter;
use crate::{Error, Result};

/// Timeout for health-check probe calls.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
struct HealthCache {
    healthy: bool,
    checked_at: Instant,
}

/// One configured backend provider with its runtime state.
pub struct Provider {
    config: ProviderConfig,
    backend: Arc<dyn ProviderBackend>,
    semaphore: Arc<Semaphore>,
    breaker: CircuitBreaker,
    rate_limiter: RateLimiter,
    metrics: Mutex<ProviderMetrics>,
    health: Mutex<Option<HealthCache>>,
    health_ttl: Duration,
}

impl Provider {
    pub fn new(config: ProviderConfig, backend: Arc<dyn ProviderBackend>) -> Self {
        let breaker = CircuitBreaker::new(
            CircuitBreakerConfig::new()
                .with_failure_threshold(config.failure_threshold)
                .with_recovery_timeout(config.recovery_timeout())
                .with_success_threshold(config.success_threshold),
        );
        let rate_limiter = RateLimiter::new(config.rate_limit_per_minute);
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));
        Self {
            config,
            backend,
            semaphore,
            breaker,
            rate_limiter,
            metrics: Mutex::new(ProviderMetrics::new()),
            health: Mutex::new(None),
            health_ttl: Duration::from_secs(300),
        }
    }

    /// Override the health-check cache validity window.
    pub fn with_health_ttl(mut self, ttl: Duration) -> Self {
        self.health_ttl = ttl;
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn weight(&self) -> f64 {
        self.config.weight
    }

    pub fn max_concurrent(&self) -> usize {
        self.config.max_concurrent
    }

    pub fn backoff_factor(&self) -> f64 {
        self.config.backoff_factor
    }

    /// Configured per-attempt call timeout.
    pub fn call_timeout(&self) -> Duration {
        self.config.timeout()
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Free concurrency slots right now.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Read-only eligibility for selection: breaker permits a call without
    /// consuming the half-open probe slot.
    pub fn is_eligible(&self) -> bool {
        self.breaker.is_eligible()
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics
            .lock()
            .map(|m| m.snapshot())
            .unwrap_or_default()
    }

    /// Cached health result, if one exists (fresh or stale). Never probes.
    pub fn cached_health(&self) -> Option<bool> {
        self.health
            .lock()
            .ok()
            .and_then(|guard| (*guard).map(|c| c.healthy))
    }

    /// Execute one request against the wrapped backend.
    ///
    /// Ordering: breaker gate, rate-limit slot, concurrency permit, then
    /// the backend call bounded by `timeout`. Every outcome feeds the
    /// breaker and metrics before the error is surfaced.
    pub async fn execute_request(&self, payload: &Value, timeout: Duration) -> Result<Value> {
        if !self.breaker.can_execute() {
            return Err(Error::ProviderUnavailable {
                provider: self.config.name.clone(),
            });
        }

        if !self.rate_limiter.wait_for_slot(timeout).await {
            // The call never reached the backend; give back any half-open
            // probe slot taken by the gate above.
            self.breaker.release_probe();
            return Err(Error::RateLimited {
                provider: self.config.name.clone(),
            });
        }

        // Primary backpressure point: waits until a concurrency slot frees.
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| Error::provider(&self.config.name, "concurrency semaphore closed"))?;

        let start = Instant::now();
        match tokio::time::timeout(timeout, self.backend.call(payload, timeout)).await {
            Ok(Ok(response)) => {
                self.breaker.call_success();
                if let Ok(mut m) = self.metrics.lock() {
                    m.record_success(start.elapsed());
                }
                debug!(
                    provider = %self.config.name,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "backend call succeeded"
                );
                Ok(response)
            }
            Ok(Err(err)) => {
                self.breaker.call_failure();
                if let Ok(mut m) = self.metrics.lock() {
                    m.record_failure(err.to_string());
                }
                warn!(
                    provider = %self.config.name,
                    error = %err,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "backend call failed"
                );
                Err(Error::Provider {
                    provider: self.config.name.clone(),
                    message: err.to_string(),
                })
            }
            Err(_) => {
                self.breaker.call_failure();
                if let Ok(mut m) = self.metrics.lock() {
                    m.record_failure("request timeout");
                }
                warn!(
                    provider = %self.config.name,
                    timeout_ms = timeout.as_millis() as u64,
                    "backend call timed out"
                );
                Err(Error::RequestTimeout {
                    provider: self.config.name.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Health of the wrapped backend, cached for the configured TTL.
    ///
    /// A stale cache triggers one minimal probe; the probe outcome feeds
    /// the circuit breaker like any other call.
    pub async fn health_check(&self) -> bool {
        if let Ok(cache) = self.health.lock() {
            if let Some(c) = *cache {
                if c.checked_at.elapsed() < self.health_ttl {
                    return c.healthy;
                }
            }
        }

        let healthy = self.backend.probe(PROBE_TIMEOUT).await;
        if healthy {
            self.breaker.call_success();
        } else {
            self.breaker.call_failure();
        }

        if let Ok(mut cache) = self.health.lock() {
            *cache = Some(HealthCache {
                healthy,
                checked_at: Instant::now(),
            });
        }
        healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedBackend {
        calls: AtomicU32,
        probes: AtomicU32,
        fail: bool,
        latency: Duration,
    }

    impl ScriptedBackend {
        fn ok() -> Self {
            Self {
                calls: AtomicU32::new(0),
                probes: AtomicU32::new(0),
                fail: false,
                latency: Duration::ZERO,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::ok()
            }
        }

        fn slow(latency: Duration) -> Self {
            Self {
                latency,
                ..Self::ok()
            }
        }
    }

    #[async_trait]
    impl ProviderBackend for ScriptedBackend {
        async fn call(&self, payload: &Value, _timeout: Duration) -> BackendResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            if self.fail {
                Err(BackendError::new("scripted failure"))
            } else {
                Ok(payload.clone())
            }
        }

        async fn probe(&self, _timeout: Duration) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst);
            !self.fail
        }
    }

    fn provider_with(backend: Arc<ScriptedBackend>, config: ProviderConfig) -> Provider {
        Provider::new(config, backend)
    }

    #[tokio::test]
    async fn test_provider_success_updates_metrics_and_breaker() {
        let backend = Arc::new(ScriptedBackend::ok());
        let provider = provider_with(backend.clone(), ProviderConfig::new("alpha"));

        let response = provider
            .execute_request(&json!({"q": 1}), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(response, json!({"q": 1}));

        let m = provider.metrics_snapshot();
        assert_eq!(m.total_requests, 1);
        assert_eq!(m.successful_requests, 1);
        assert_eq!(provider.circuit_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_provider_failure_feeds_breaker_until_open() {
        let backend = Arc::new(ScriptedBackend::failing());
        let provider = provider_with(
            backend.clone(),
            ProviderConfig::new("alpha").with_failure_threshold(2),
        );

        for _ in 0..2 {
            let err = provider
                .execute_request(&json!({}), Duration::from_secs(1))
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Provider { .. }));
        }
        assert_eq!(provider.circuit_state(), CircuitState::Open);

        // Fail-fast without touching the backend.
        let before = backend.calls.load(Ordering::SeqCst);
        let err = provider
            .execute_request(&json!({}), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProviderUnavailable { .. }));
        assert_eq!(backend.calls.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn test_provider_timeout_is_recorded_as_failure() {
        let backend = Arc::new(ScriptedBackend::slow(Duration::from_millis(200)));
        let provider = provider_with(backend, ProviderConfig::new("alpha"));

        let err = provider
            .execute_request(&json!({}), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RequestTimeout { .. }));

        let m = provider.metrics_snapshot();
        assert_eq!(m.failed_requests, 1);
        assert_eq!(m.last_error.as_deref(), Some("request timeout"));
    }

    #[tokio::test]
    async fn test_provider_rate_limited_when_quota_exhausted() {
        let backend = Arc::new(ScriptedBackend::ok());
        let provider = provider_with(
            backend,
            ProviderConfig::new("alpha").with_rate_limit_per_minute(1),
        );

        provider
            .execute_request(&json!({}), Duration::from_millis(50))
            .await
            .unwrap();
        let err = provider
            .execute_request(&json!({}), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RateLimited { .. }));
    }

    #[tokio::test]
    async fn test_provider_health_check_is_cached() {
        let backend = Arc::new(ScriptedBackend::ok());
        let provider = provider_with(backend.clone(), ProviderConfig::new("alpha"));

        assert!(provider.health_check().await);
        assert!(provider.health_check().await);
        assert_eq!(backend.probes.load(Ordering::SeqCst), 1);
        assert_eq!(provider.cached_health(), Some(true));
    }

    #[tokio::test]
    async fn test_provider_health_check_reprobes_after_ttl() {
        let backend = Arc::new(ScriptedBackend::ok());
        let provider = provider_with(backend.clone(), ProviderConfig::new("alpha"))
            .with_health_ttl(Duration::from_millis(30));

        assert!(provider.health_check().await);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(provider.health_check().await);
        assert_eq!(backend.probes.load(Ordering::SeqCst), 2);
    }
}
