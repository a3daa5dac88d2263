//! Benchmarks for the dispatch hot path
//!
//! This benchmark measures:
//! - Weighted scoring over a populated registry
//! - Circuit breaker gate overhead
//! - Sliding-window rate limiter admission

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use std::time::Duration;

use ai_dispatch::provider::{BackendResult, Provider, ProviderBackend};
use ai_dispatch::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use ai_dispatch::resilience::rate_limiter::RateLimiter;
use ai_dispatch::selector::{SelectionStrategy, WeightedScore};
use ai_dispatch::ProviderConfig;
use async_trait::async_trait;
use serde_json::Value;

struct NullBackend;

#[async_trait]
impl ProviderBackend for NullBackend {
    async fn call(&self, payload: &Value, _timeout: Duration) -> BackendResult {
        Ok(payload.clone())
    }
}

fn candidates(n: usize) -> Vec<Arc<Provider>> {
    (0..n)
        .map(|i| {
            let config = ProviderConfig::new(format!("provider-{i}"))
                .with_weight(0.5 + (i as f64) * 0.05)
                .with_max_concurrent(8);
            Arc::new(Provider::new(config, Arc::new(NullBackend)))
        })
        .collect()
}

fn bench_weighted_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("weighted_selection");
    for size in [2usize, 8, 32] {
        let pool = candidates(size);
        let strategy = WeightedScore::new();
        group.bench_with_input(BenchmarkId::from_parameter(size), &pool, |b, pool| {
            b.iter(|| black_box(strategy.select(black_box(pool))));
        });
    }
    group.finish();
}

fn bench_circuit_breaker_gate(c: &mut Criterion) {
    let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
    c.bench_function("circuit_breaker_can_execute", |b| {
        b.iter(|| black_box(breaker.can_execute()));
    });

    let breaker = CircuitBreaker::new(CircuitBreakerConfig::default());
    c.bench_function("circuit_breaker_success_cycle", |b| {
        b.iter(|| {
            breaker.can_execute();
            breaker.call_success();
        });
    });
}

fn bench_rate_limiter_acquire(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime");
    // The window saturates at the quota, so iterations past it measure the
    // steady-state prune-and-check path without unbounded growth.
    let limiter = RateLimiter::new(1_000);
    c.bench_function("rate_limiter_acquire", |b| {
        b.iter(|| rt.block_on(async { black_box(limiter.acquire().await) }));
    });
}

criterion_group!(
    benches,
    bench_weighted_selection,
    bench_circuit_breaker_gate,
    bench_rate_limiter_acquire
);
criterion_main!(benches);
