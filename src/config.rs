//! Engine configuration structures
//!
//! This module contains the provider records and dispatcher knobs supplied by
//! the surrounding application at startup.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Static configuration for one backend provider. Immutable after startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    /// Backend constructor key in the [`BackendRegistry`](crate::provider::BackendRegistry).
    /// Defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Priority weight used by the weighted-score selection strategy.
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Consecutive failures before this provider's breaker opens.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// How long the breaker stays open before probing recovery.
    #[serde(default = "default_recovery_timeout_ms")]
    pub recovery_timeout_ms: u64,
    /// Consecutive successes required to close from half-open.
    #[serde(default = "default_success_threshold")]
    pub success_threshold: u32,
}

fn default_weight() -> f64 {
    1.0
}
fn default_max_concurrent() -> usize {
    5
}
fn default_rate_limit_per_minute() -> u32 {
    60
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_factor() -> f64 {
    2.0
}
fn default_failure_threshold() -> u32 {
    5
}
fn default_recovery_timeout_ms() -> u64 {
    30_000
}
fn default_success_threshold() -> u32 {
    2
}

impl ProviderConfig {
    /// Create a new provider config with default values.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            weight: default_weight(),
            max_concurrent: default_max_concurrent(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_factor: default_backoff_factor(),
            failure_threshold: default_failure_threshold(),
            recovery_timeout_ms: default_recovery_timeout_ms(),
            success_threshold: default_success_threshold(),
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_rate_limit_per_minute(mut self, limit: u32) -> Self {
        self.rate_limit_per_minute = limit;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub fn with_recovery_timeout_ms(mut self, ms: u64) -> Self {
        self.recovery_timeout_ms = ms;
        self
    }

    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Backend constructor key; falls back to the provider name.
    pub fn kind(&self) -> &str {
        self.kind.as_deref().unwrap_or(&self.name)
    }

    /// Per-attempt backend call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_millis(self.recovery_timeout_ms)
    }
}

/// Top-level dispatcher configuration: an ordered provider list plus engine
/// knobs. All knobs have conservative defaults so a YAML document may supply
/// only the provider records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherConfig {
    pub providers: Vec<ProviderConfig>,
    /// Worker task count; defaults to `min(10, 2 × providers)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Grace added to a request's timeout when awaiting its completion
    /// handle in `invoke()`.
    #[serde(default = "default_dispatch_grace_ms")]
    pub dispatch_grace_ms: u64,
    /// Retry budget seeded into each request. A request pinned to a single
    /// provider takes that provider's `max_retries` instead.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    #[serde(default = "default_metrics_interval_secs")]
    pub metrics_interval_secs: u64,
    #[serde(default = "default_health_check_ttl_secs")]
    pub health_check_ttl_secs: u64,
}

fn default_queue_capacity() -> usize {
    1024
}
fn default_dispatch_grace_ms() -> u64 {
    5_000
}
fn default_retry_base_delay_ms() -> u64 {
    500
}
fn default_retry_max_delay_ms() -> u64 {
    30_000
}
fn default_metrics_interval_secs() -> u64 {
    60
}
fn default_health_check_ttl_secs() -> u64 {
    300
}

impl DispatcherConfig {
    /// Create an empty config with default knobs.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            workers: None,
            queue_capacity: default_queue_capacity(),
            dispatch_grace_ms: default_dispatch_grace_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            metrics_interval_secs: default_metrics_interval_secs(),
            health_check_ttl_secs: default_health_check_ttl_secs(),
        }
    }

    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_dispatch_grace(mut self, grace: Duration) -> Self {
        self.dispatch_grace_ms = grace.as_millis() as u64;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval_secs = interval.as_secs();
        self
    }

    pub fn with_health_check_ttl(mut self, ttl: Duration) -> Self {
        self.health_check_ttl_secs = ttl.as_secs();
        self
    }

    /// Load a config from a YAML document.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::configuration(format!("failed to parse config: {}", e)))
    }

    /// Load a config from a YAML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::configuration(format!("failed to read config: {}", e)))?;
        Self::from_yaml_str(&content)
    }

    /// Effective worker count.
    pub fn worker_count(&self) -> usize {
        self.workers
            .unwrap_or_else(|| (2 * self.providers.len()).min(10))
            .max(1)
    }

    pub fn dispatch_grace(&self) -> Duration {
        Duration::from_millis(self.dispatch_grace_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_interval_secs)
    }

    pub fn health_check_ttl(&self) -> Duration {
        Duration::from_secs(self.health_check_ttl_secs)
    }

    /// Fail-fast validation of the whole document.
    pub fn validate(&self) -> Result<()> {
        if self.providers.is_empty() {
            return Err(Error::configuration("at least one provider is required"));
        }
        if self.queue_capacity == 0 {
            return Err(Error::configuration("queue_capacity must be positive"));
        }
        let mut seen = std::collections::HashSet::new();
        for p in &self.providers {
            if p.name.trim().is_empty() {
                return Err(Error::configuration("provider name must be non-empty"));
            }
            if !seen.insert(p.name.as_str()) {
                return Err(Error::configuration(format!(
                    "duplicate provider name '{}'",
                    p.name
                )));
            }
            if p.max_concurrent == 0 {
                return Err(Error::configuration(format!(
                    "provider '{}': max_concurrent must be positive",
                    p.name
                )));
            }
            if p.rate_limit_per_minute == 0 {
                return Err(Error::configuration(format!(
                    "provider '{}': rate_limit_per_minute must be positive",
                    p.name
                )));
            }
            if !p.weight.is_finite() || p.weight < 0.0 {
                return Err(Error::configuration(format!(
                    "provider '{}': weight must be finite and non-negative",
                    p.name
                )));
            }
            if !p.backoff_factor.is_finite() || p.backoff_factor < 1.0 {
                return Err(Error::configuration(format!(
                    "provider '{}': backoff_factor must be >= 1.0",
                    p.name
                )));
            }
            if p.failure_threshold == 0 {
                return Err(Error::configuration(format!(
                    "provider '{}': failure_threshold must be positive",
                    p.name
                )));
            }
        }
        Ok(())
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::new()
    }
}
