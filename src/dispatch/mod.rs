//! 调度器门面：共享请求队列、工作者池与统一的 invoke 入口。
//!
//! Dispatcher facade: owns the shared request queue, runs the worker pool,
//! and exposes [`Dispatcher::invoke`] to callers.
//!
//! The dispatcher is an explicitly constructed object: build it once at
//! process start via [`Dispatcher::builder`] and pass it by reference to
//! all callers; there is no ambient global instance. All worker tasks and
//! the metrics reporter live in one [`tokio::task::JoinSet`], so shutdown
//! cancels and awaits everything deterministically.

pub(crate) mod request;
pub(crate) mod retry;
mod worker;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{DispatcherConfig, ProviderConfig};
use crate::metrics::{HealthStatus, MetricsCollector};
use crate::provider::{BackendRegistry, Provider, ProviderBackend};
use crate::registry::ProviderRegistry;
use crate::selector::{SelectionStrategy, Selector, WeightedScore};
use crate::{Error, Result};

use request::{Request, RequestQueue};
use retry::RetryCoordinator;
use worker::{run_worker, WorkerContext};

/// The engine facade. Owns the request queue, worker pool and metrics
/// reporter for one set of configured providers.
pub struct Dispatcher {
    config: DispatcherConfig,
    queue: Arc<RequestQueue>,
    registry: Arc<ProviderRegistry>,
    collector: Arc<MetricsCollector>,
    shutdown: CancellationToken,
    tasks: tokio::sync::Mutex<JoinSet<()>>,
}

impl Dispatcher {
    /// Start building a dispatcher for `config`.
    pub fn builder(config: DispatcherConfig) -> DispatcherBuilder {
        DispatcherBuilder {
            config,
            backends: BackendRegistry::new(),
            strategy: Arc::new(WeightedScore::new()),
        }
    }

    /// Dispatch one request and await its outcome.
    ///
    /// Equivalent to [`invoke_with_options`](Self::invoke_with_options) with
    /// default priority and no provider pin.
    pub async fn invoke(&self, payload: Value, timeout: Duration) -> Result<Value> {
        self.invoke_with_options(payload, timeout, 0, None).await
    }

    /// Dispatch one request with the full parameter set.
    ///
    /// `provider` pins the request to that single provider; `priority` is
    /// accepted and carried but does not reorder the FIFO queue yet. The
    /// call awaits the request's completion handle for `timeout` plus the
    /// configured grace, then gives up with [`Error::DispatchTimeout`].
    /// Abandoning the wait cancels the in-flight backend call only
    /// best-effort: the transport may continue server-side.
    pub async fn invoke_with_options(
        &self,
        payload: Value,
        timeout: Duration,
        priority: i32,
        provider: Option<&str>,
    ) -> Result<Value> {
        if self.shutdown.is_cancelled() {
            return Err(Error::Shutdown);
        }

        // A pinned request takes its retry budget from that provider's
        // config; otherwise the engine-wide default applies.
        let max_retries = provider
            .and_then(|name| self.registry.get(name))
            .map(|p| p.max_retries())
            .unwrap_or(self.config.max_retries);

        let (request, rx) = Request::new(
            payload,
            timeout,
            priority,
            provider.map(str::to_string),
            max_retries,
        );
        self.queue.push(request);

        let budget = timeout + self.config.dispatch_grace();
        match tokio::time::timeout(budget, rx).await {
            Ok(Ok(result)) => result,
            // The responder was dropped without resolving; only shutdown
            // tears requests down that way.
            Ok(Err(_)) => Err(Error::Shutdown),
            Err(_) => Err(Error::DispatchTimeout),
        }
    }

    /// Dispatch many payloads concurrently with an optional concurrency
    /// limit. Results preserve input order.
    pub async fn invoke_batch(
        &self,
        payloads: Vec<Value>,
        timeout: Duration,
        concurrency_limit: Option<usize>,
    ) -> Vec<Result<Value>> {
        use futures::StreamExt;

        let n = payloads.len();
        if n == 0 {
            return Vec::new();
        }

        let limit = concurrency_limit.unwrap_or(10).max(1);
        let mut out: Vec<Option<Result<Value>>> = (0..n).map(|_| None).collect();

        let results: Vec<(usize, Result<Value>)> =
            futures::stream::iter(payloads.into_iter().enumerate())
                .map(|(idx, payload)| async move {
                    let r = self.invoke(payload, timeout).await;
                    (idx, r)
                })
                .buffer_unordered(limit)
                .collect()
                .await;

        for (idx, r) in results {
            out[idx] = Some(r);
        }

        out.into_iter()
            .map(|o| o.unwrap_or(Err(Error::Shutdown)))
            .collect()
    }

    /// Number of requests currently queued.
    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }

    /// Synchronous, read-only health snapshot for operational endpoints.
    pub fn get_health_status(&self) -> HealthStatus {
        self.collector.health_status()
    }

    /// Look up a configured provider by name.
    pub fn provider(&self, name: &str) -> Option<Arc<Provider>> {
        self.registry.get(name)
    }

    /// Stop the engine: cancel all worker tasks and the metrics reporter,
    /// await their completion swallowing cancellation, and resolve every
    /// still-queued request with [`Error::Shutdown`]. Idempotent.
    pub async fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!("dispatcher shutting down");
            self.shutdown.cancel();
        }

        let drained = self.queue.close();
        let drained_count = drained.len();
        for request in drained {
            request.resolve(Err(Error::Shutdown));
        }

        let mut tasks = self.tasks.lock().await;
        tasks.abort_all();
        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                if !err.is_cancelled() {
                    warn!(error = %err, "dispatcher task ended abnormally");
                }
            }
        }

        info!(drained = drained_count, "dispatcher stopped");
    }
}

/// Builder wiring configuration, backend constructors and the selection
/// strategy into a running [`Dispatcher`].
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    backends: BackendRegistry,
    strategy: Arc<dyn SelectionStrategy>,
}

impl DispatcherBuilder {
    /// Register a backend constructor for a provider kind.
    pub fn register_backend<F>(mut self, kind: impl Into<String>, ctor: F) -> Self
    where
        F: Fn(&ProviderConfig) -> Result<Arc<dyn ProviderBackend>> + Send + Sync + 'static,
    {
        self.backends.register(kind, ctor);
        self
    }

    /// Replace the whole backend registry.
    pub fn with_backends(mut self, backends: BackendRegistry) -> Self {
        self.backends = backends;
        self
    }

    /// Replace the default weighted-score selection strategy.
    pub fn with_strategy(mut self, strategy: impl SelectionStrategy + 'static) -> Self {
        self.strategy = Arc::new(strategy);
        self
    }

    /// Validate the configuration, construct every provider and start the
    /// worker pool. Must be called within a Tokio runtime.
    pub fn build(self) -> Result<Dispatcher> {
        self.config.validate()?;

        let mut registry = ProviderRegistry::new();
        for provider_config in &self.config.providers {
            let backend = self.backends.build(provider_config)?;
            let provider = Provider::new(provider_config.clone(), backend)
                .with_health_ttl(self.config.health_check_ttl());
            registry.register(Arc::new(provider))?;
        }
        let registry = Arc::new(registry);

        let queue = Arc::new(RequestQueue::new(self.config.queue_capacity));
        let selector = Arc::new(Selector::new(Arc::clone(&registry), self.strategy));
        let retry = Arc::new(RetryCoordinator::new(
            self.config.retry_base_delay(),
            self.config.retry_max_delay(),
        ));
        let shutdown = CancellationToken::new();

        let worker_count = self.config.worker_count();
        let collector = Arc::new(MetricsCollector::new(
            Arc::clone(&registry),
            Arc::clone(&queue),
            worker_count,
        ));

        let context = Arc::new(WorkerContext {
            queue: Arc::clone(&queue),
            selector,
            retry,
            shutdown: shutdown.clone(),
        });

        let mut tasks = JoinSet::new();
        for worker_id in 0..worker_count {
            tasks.spawn(run_worker(worker_id, Arc::clone(&context)));
        }
        tasks.spawn(
            Arc::clone(&collector).run(self.config.metrics_interval(), shutdown.clone()),
        );

        info!(
            workers = worker_count,
            providers = registry.len(),
            strategy = context.selector.strategy_name(),
            "dispatcher started"
        );

        Ok(Dispatcher {
            config: self.config,
            queue,
            registry,
            collector,
            shutdown,
            tasks: tokio::sync::Mutex::new(tasks),
        })
    }
}
