//! Periodic health reporting and on-demand status snapshots.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::dispatch::request::RequestQueue;
use crate::registry::ProviderRegistry;

/// Point-in-time health of one provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    /// Last cached health-check result; `true` until a check has run.
    pub healthy: bool,
    pub circuit_state: String,
    pub success_rate: f64,
    pub avg_latency_ms: u64,
    pub total_requests: u64,
    pub failed_requests: u64,
    pub last_error: Option<String>,
}

/// Point-in-time health of the whole engine, shaped for operational
/// dashboards and health-check endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub providers: HashMap<String, ProviderHealth>,
    pub queue_depth: usize,
    pub active_workers: usize,
}

/// Periodic reporter plus the synchronous snapshot used by
/// `Dispatcher::get_health_status`.
pub struct MetricsCollector {
    registry: Arc<ProviderRegistry>,
    queue: Arc<RequestQueue>,
    workers: usize,
}

impl MetricsCollector {
    pub(crate) fn new(
        registry: Arc<ProviderRegistry>,
        queue: Arc<RequestQueue>,
        workers: usize,
    ) -> Self {
        Self {
            registry,
            queue,
            workers,
        }
    }

    /// Read-only snapshot over the same state the workers mutate; safe to
    /// call concurrently with dispatch traffic.
    pub fn health_status(&self) -> HealthStatus {
        let mut providers = HashMap::new();
        for provider in self.registry.all() {
            let metrics = provider.metrics_snapshot();
            providers.insert(
                provider.name().to_string(),
                ProviderHealth {
                    healthy: provider.cached_health().unwrap_or(true),
                    circuit_state: provider.circuit_state().as_str().to_string(),
                    success_rate: metrics.success_rate,
                    avg_latency_ms: metrics.avg_latency_ms,
                    total_requests: metrics.total_requests,
                    failed_requests: metrics.failed_requests,
                    last_error: metrics.last_error,
                },
            );
        }
        HealthStatus {
            providers,
            queue_depth: self.queue.depth(),
            active_workers: self.workers,
        }
    }

    /// Reporter loop; one aggregate log line per interval plus one per
    /// provider. Exits on shutdown.
    pub(crate) async fn run(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately; skip it so the first report
        // lands one full interval in.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.report(),
            }
        }
    }

    fn report(&self) {
        info!(
            queue_depth = self.queue.depth(),
            active_workers = self.workers,
            providers = self.registry.len(),
            "dispatch status"
        );
        for provider in self.registry.all() {
            let metrics = provider.metrics_snapshot();
            info!(
                provider = provider.name(),
                circuit_state = provider.circuit_state().as_str(),
                total = metrics.total_requests,
                succeeded = metrics.successful_requests,
                failed = metrics.failed_requests,
                avg_latency_ms = metrics.avg_latency_ms,
                "provider status"
            );
        }
    }
}
