//! # ai-dispatch
//!
//! 异步多提供方请求调度引擎：在多个可互换的后端之间路由请求，
//! 在单个后端故障、限流或响应缓慢时保持系统的响应性与正确性。
//!
//! Asynchronous multi-provider request dispatch engine. Routes work
//! requests to one of several interchangeable backend providers while
//! keeping the system responsive and correct despite individual backend
//! outages, rate limits and slow responses.
//!
//! ## Overview
//!
//! The engine is built from small, per-provider resilience primitives
//! composed under one dispatcher facade:
//!
//! - each provider is guarded by its own circuit breaker, sliding-window
//!   rate limiter and concurrency-bounding semaphore (the primary
//!   backpressure point: excess demand queues instead of being dropped)
//! - a pluggable selection strategy scores the eligible providers for each
//!   pending request
//! - a pool of workers drains one shared FIFO queue, retrying transient
//!   failures with exponential backoff on a possibly different provider
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ai_dispatch::{Dispatcher, DispatcherConfig, ProviderConfig};
//! use ai_dispatch::provider::{BackendResult, ProviderBackend};
//! use async_trait::async_trait;
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct HttpBackend; // wraps whatever transport the application uses
//!
//! #[async_trait]
//! impl ProviderBackend for HttpBackend {
//!     async fn call(&self, payload: &Value, _timeout: Duration) -> BackendResult {
//!         Ok(payload.clone())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> ai_dispatch::Result<()> {
//!     let config = DispatcherConfig::new()
//!         .with_provider(ProviderConfig::new("openrouter").with_weight(1.0))
//!         .with_provider(ProviderConfig::new("openai").with_weight(0.5).with_kind("openrouter"));
//!
//!     let dispatcher = Dispatcher::builder(config)
//!         .register_backend("openrouter", |_cfg| {
//!             Ok(Arc::new(HttpBackend) as Arc<dyn ProviderBackend>)
//!         })
//!         .build()?;
//!
//!     let response = dispatcher
//!         .invoke(json!({"prompt": "hello"}), Duration::from_secs(30))
//!         .await?;
//!     println!("{response}");
//!
//!     dispatcher.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Provider records and dispatcher knobs |
//! | [`resilience`] | Circuit breaker and sliding-window rate limiter |
//! | [`provider`] | Backend adapter with semaphore, breaker, limiter, metrics |
//! | [`registry`] | Registration-ordered provider lookup |
//! | [`selector`] | Eligibility filter and pluggable selection strategies |
//! | [`dispatch`] | Request queue, worker pool and the dispatcher facade |
//! | [`metrics`] | Periodic reporting and health snapshots |

pub mod config;
pub mod dispatch;
pub mod metrics;
pub mod provider;
pub mod registry;
pub mod resilience;
pub mod selector;

/// Error type for the library
pub mod error;
pub use error::Error;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

// Re-export main types for convenience
pub use config::{DispatcherConfig, ProviderConfig};
pub use dispatch::{Dispatcher, DispatcherBuilder};
pub use metrics::{HealthStatus, ProviderHealth};
pub use provider::{BackendError, BackendRegistry, Provider, ProviderBackend};
pub use resilience::circuit_breaker::CircuitState;
pub use selector::{LeastLatency, RoundRobin, SelectionStrategy, WeightedScore};
