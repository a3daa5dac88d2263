//! Provider selection: eligibility filtering plus pluggable scoring
//! strategies.
//!
//! Selection is split in two: the [`Selector`] applies the hard eligibility
//! filter (circuit breaker permits a call, cached health check passes), and
//! a [`SelectionStrategy`] ranks whatever survives. Strategies are
//! swappable without touching the worker pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::provider::Provider;
use crate::registry::ProviderRegistry;
use crate::{Error, Result};

/// Share of each factor in the weighted score.
const WEIGHT_SHARE: f64 = 0.4;
const SUCCESS_SHARE: f64 = 0.3;
const LATENCY_SHARE: f64 = 0.2;
const CAPACITY_SHARE: f64 = 0.1;

/// Ranks eligible providers and picks one.
///
/// Candidates arrive in registration order; implementations must break ties
/// in favor of the earliest candidate so selection stays deterministic.
pub trait SelectionStrategy: Send + Sync {
    fn select(&self, candidates: &[Arc<Provider>]) -> Option<Arc<Provider>>;

    fn name(&self) -> &'static str;
}

/// Default strategy: composite score of configured weight, observed success
/// rate, average latency and free capacity.
///
/// `score = weight*0.4 + success_rate*0.3 + (1/avg_latency)*0.2 + capacity*0.1`
/// with latency in seconds. Providers without history score with a success
/// rate of 1.0 and a large default latency, so unused providers are neither
/// punished nor over-favored.
#[derive(Debug, Default)]
pub struct WeightedScore;

impl WeightedScore {
    pub fn new() -> Self {
        Self
    }

    fn score(provider: &Provider) -> f64 {
        let metrics = provider.metrics_snapshot();
        // Floor at 1ms so a very fast backend cannot blow up the latency term.
        let avg_latency_secs = (metrics.avg_latency_ms.max(1) as f64) / 1000.0;
        let capacity = if provider.max_concurrent() == 0 {
            0.0
        } else {
            provider.available_permits() as f64 / provider.max_concurrent() as f64
        };
        provider.weight() * WEIGHT_SHARE
            + metrics.success_rate * SUCCESS_SHARE
            + (1.0 / avg_latency_secs) * LATENCY_SHARE
            + capacity * CAPACITY_SHARE
    }
}

impl SelectionStrategy for WeightedScore {
    fn select(&self, candidates: &[Arc<Provider>]) -> Option<Arc<Provider>> {
        let mut best: Option<(&Arc<Provider>, f64)> = None;
        for candidate in candidates {
            let score = Self::score(candidate);
            match best {
                // Strict comparison: ties keep the earlier candidate.
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((candidate, score)),
            }
        }
        best.map(|(p, _)| Arc::clone(p))
    }

    fn name(&self) -> &'static str {
        "weighted_score"
    }
}

/// Rotates through the eligible set with an atomic cursor.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionStrategy for RoundRobin {
    fn select(&self, candidates: &[Arc<Provider>]) -> Option<Arc<Provider>> {
        if candidates.is_empty() {
            return None;
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
        Some(Arc::clone(&candidates[idx]))
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}

/// Picks the provider with the lowest observed average latency.
#[derive(Debug, Default)]
pub struct LeastLatency;

impl LeastLatency {
    pub fn new() -> Self {
        Self
    }
}

impl SelectionStrategy for LeastLatency {
    fn select(&self, candidates: &[Arc<Provider>]) -> Option<Arc<Provider>> {
        let mut best: Option<(&Arc<Provider>, u64)> = None;
        for candidate in candidates {
            let latency = candidate.metrics_snapshot().avg_latency_ms;
            match best {
                Some((_, best_latency)) if latency >= best_latency => {}
                _ => best = Some((candidate, latency)),
            }
        }
        best.map(|(p, _)| Arc::clone(p))
    }

    fn name(&self) -> &'static str {
        "least_latency"
    }
}

/// Applies the eligibility filter and delegates ranking to the strategy.
pub struct Selector {
    registry: Arc<ProviderRegistry>,
    strategy: Arc<dyn SelectionStrategy>,
}

impl Selector {
    pub fn new(registry: Arc<ProviderRegistry>, strategy: Arc<dyn SelectionStrategy>) -> Self {
        Self { registry, strategy }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Pick the best eligible provider for a pending request.
    ///
    /// A `hint` restricts the candidate set to that single provider. A
    /// provider is eligible when its breaker permits a call and its cached
    /// health check passes; an empty eligible set is
    /// [`Error::NoProvidersAvailable`].
    pub async fn select(&self, hint: Option<&str>) -> Result<Arc<Provider>> {
        let pool: Vec<Arc<Provider>> = match hint {
            Some(name) => self.registry.get(name).into_iter().collect(),
            None => self.registry.all().to_vec(),
        };

        let mut eligible = Vec::with_capacity(pool.len());
        for provider in pool {
            if provider.is_eligible() && provider.health_check().await {
                eligible.push(provider);
            }
        }

        self.strategy
            .select(&eligible)
            .ok_or(Error::NoProvidersAvailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::provider::{BackendError, BackendResult, ProviderBackend};
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::time::Duration;

    struct StubBackend {
        healthy: bool,
        fail_calls: bool,
    }

    impl StubBackend {
        fn healthy() -> Self {
            Self {
                healthy: true,
                fail_calls: false,
            }
        }

        fn unhealthy() -> Self {
            Self {
                healthy: false,
                fail_calls: true,
            }
        }
    }

    #[async_trait]
    impl ProviderBackend for StubBackend {
        async fn call(&self, payload: &Value, _timeout: Duration) -> BackendResult {
            if self.fail_calls {
                Err(BackendError::new("stub failure"))
            } else {
                Ok(payload.clone())
            }
        }

        async fn probe(&self, _timeout: Duration) -> bool {
            self.healthy
        }
    }

    fn provider(config: ProviderConfig, backend: StubBackend) -> Arc<Provider> {
        Arc::new(Provider::new(config, Arc::new(backend)))
    }

    fn registry_of(providers: Vec<Arc<Provider>>) -> Arc<ProviderRegistry> {
        let mut registry = ProviderRegistry::new();
        for p in providers {
            registry.register(p).unwrap();
        }
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_weighted_score_prefers_heavier_weight() {
        let a = provider(
            ProviderConfig::new("a").with_weight(1.0),
            StubBackend::healthy(),
        );
        let b = provider(
            ProviderConfig::new("b").with_weight(0.5),
            StubBackend::healthy(),
        );
        let selector = Selector::new(registry_of(vec![a, b]), Arc::new(WeightedScore::new()));

        for _ in 0..10 {
            let picked = selector.select(None).await.unwrap();
            assert_eq!(picked.name(), "a");
        }
    }

    #[tokio::test]
    async fn test_weighted_score_tie_breaks_by_registration_order() {
        let a = provider(ProviderConfig::new("a"), StubBackend::healthy());
        let b = provider(ProviderConfig::new("b"), StubBackend::healthy());
        let selector = Selector::new(registry_of(vec![a, b]), Arc::new(WeightedScore::new()));

        assert_eq!(selector.select(None).await.unwrap().name(), "a");
    }

    #[tokio::test]
    async fn test_weighted_score_penalizes_failures() {
        let a = provider(
            ProviderConfig::new("a").with_failure_threshold(100),
            StubBackend::unhealthy(),
        );
        let b = provider(ProviderConfig::new("b"), StubBackend::healthy());

        // Give provider a a poor success history (breaker stays closed).
        for _ in 0..5 {
            let _ = a.execute_request(&json!({}), Duration::from_secs(1)).await;
        }

        // Bypass the health filter by scoring directly.
        let candidates = vec![Arc::clone(&a), Arc::clone(&b)];
        let picked = WeightedScore::new().select(&candidates).unwrap();
        assert_eq!(picked.name(), "b");
    }

    #[tokio::test]
    async fn test_round_robin_rotates() {
        let a = provider(ProviderConfig::new("a"), StubBackend::healthy());
        let b = provider(ProviderConfig::new("b"), StubBackend::healthy());
        let strategy = RoundRobin::new();
        let candidates = vec![a, b];

        let first = strategy.select(&candidates).unwrap();
        let second = strategy.select(&candidates).unwrap();
        let third = strategy.select(&candidates).unwrap();
        assert_eq!(first.name(), "a");
        assert_eq!(second.name(), "b");
        assert_eq!(third.name(), "a");
    }

    #[tokio::test]
    async fn test_selector_filters_unhealthy_providers() {
        let a = provider(ProviderConfig::new("a"), StubBackend::unhealthy());
        let b = provider(ProviderConfig::new("b"), StubBackend::healthy());
        let selector = Selector::new(registry_of(vec![a, b]), Arc::new(WeightedScore::new()));

        assert_eq!(selector.select(None).await.unwrap().name(), "b");
    }

    #[tokio::test]
    async fn test_selector_hint_restricts_candidates() {
        let a = provider(ProviderConfig::new("a"), StubBackend::healthy());
        let b = provider(ProviderConfig::new("b"), StubBackend::healthy());
        let selector = Selector::new(registry_of(vec![a, b]), Arc::new(WeightedScore::new()));

        assert_eq!(selector.select(Some("b")).await.unwrap().name(), "b");
        assert!(matches!(
            selector.select(Some("missing")).await,
            Err(Error::NoProvidersAvailable)
        ));
    }

    #[tokio::test]
    async fn test_selector_empty_eligible_set() {
        let a = provider(ProviderConfig::new("a"), StubBackend::unhealthy());
        let selector = Selector::new(registry_of(vec![a]), Arc::new(WeightedScore::new()));

        assert!(matches!(
            selector.select(None).await,
            Err(Error::NoProvidersAvailable)
        ));
    }
}
