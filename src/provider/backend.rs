//! Backend call contract consumed by the provider adapter.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

/// Well-known failure type raised by backend adapters.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type BackendResult = std::result::Result<Value, BackendError>;

/// A single async call contract wrapping one backend transport.
///
/// Implemented by the surrounding application (an HTTP client to an LLM,
/// search or scrape service); transport internals are out of scope for the
/// engine. Any `Err` is treated as a backend-level failure; the engine
/// bounds the call with its own timeout.
#[async_trait]
pub trait ProviderBackend: Send + Sync {
    /// Execute one request against the backend.
    async fn call(&self, payload: &Value, timeout: Duration) -> BackendResult;

    /// Minimal probe used by cached health checks.
    ///
    /// Defaults to a trivial `call`; adapters with a cheaper health endpoint
    /// should override this.
    async fn probe(&self, timeout: Duration) -> bool {
        self.call(&json!({ "probe": true }), timeout).await.is_ok()
    }
}
