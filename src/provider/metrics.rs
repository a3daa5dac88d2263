//! Cumulative per-provider request metrics.

use std::time::{Duration, Instant};

/// Average latency assumed for a provider with no successful history, so
/// latency-sensitive scoring does not over-favor new or unused providers.
pub(crate) const NO_HISTORY_LATENCY: Duration = Duration::from_secs(10);

/// Running counters for one provider. Mutated only along that provider's
/// own request path.
#[derive(Debug, Default)]
pub struct ProviderMetrics {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    total_latency: Duration,
    last_error: Option<String>,
    last_request_at: Option<Instant>,
}

impl ProviderMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, latency: Duration) {
        self.total_requests += 1;
        self.successful_requests += 1;
        self.total_latency += latency;
        self.last_request_at = Some(Instant::now());
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.total_requests += 1;
        self.failed_requests += 1;
        self.last_error = Some(error.into());
        self.last_request_at = Some(Instant::now());
    }

    /// Fraction of successful requests; 1.0 with no history.
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            1.0
        } else {
            self.successful_requests as f64 / self.total_requests as f64
        }
    }

    /// Mean latency over successful requests; a large constant with no
    /// history.
    pub fn avg_latency(&self) -> Duration {
        if self.successful_requests == 0 {
            NO_HISTORY_LATENCY
        } else {
            self.total_latency / self.successful_requests as u32
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests,
            successful_requests: self.successful_requests,
            failed_requests: self.failed_requests,
            success_rate: self.success_rate(),
            avg_latency_ms: self.avg_latency().as_millis() as u64,
            last_error: self.last_error.clone(),
        }
    }
}

/// Read-only copy of a provider's counters.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub success_rate: f64,
    pub avg_latency_ms: u64,
    pub last_error: Option<String>,
}

impl Default for MetricsSnapshot {
    fn default() -> Self {
        ProviderMetrics::new().snapshot()
    }
}
