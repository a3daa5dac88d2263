use thiserror::Error;

/// Unified error type for the dispatch engine.
///
/// This aggregates per-provider failures and engine-level conditions into
/// actionable, high-level categories. The transient kinds are retried by the
/// dispatcher's retry coordinator; everything else resolves the request
/// terminally.
#[derive(Debug, Error)]
pub enum Error {
    /// The provider's circuit breaker rejected the call before it reached
    /// the backend.
    #[error("provider '{provider}' unavailable: circuit breaker open")]
    ProviderUnavailable { provider: String },

    /// No rate-limit slot became available within the request timeout.
    #[error("provider '{provider}' rate limited: no quota slot within timeout")]
    RateLimited { provider: String },

    /// The backend call exceeded its timeout budget.
    #[error("request to provider '{provider}' timed out after {timeout_ms}ms")]
    RequestTimeout { provider: String, timeout_ms: u64 },

    /// Backend-level failure reported by the provider adapter.
    #[error("provider '{provider}' error: {message}")]
    Provider { provider: String, message: String },

    /// The selector found no eligible provider for the request.
    #[error("no providers available")]
    NoProvidersAvailable,

    /// The overall `invoke()` budget (timeout + grace) elapsed before the
    /// request resolved.
    #[error("dispatch timed out")]
    DispatchTimeout,

    /// The request queue is at capacity; the request was never enqueued.
    #[error("request queue full")]
    QueueFull,

    /// The dispatcher is shutting down; the request will not be executed.
    #[error("dispatcher shut down")]
    Shutdown,

    /// Invalid or inconsistent configuration.
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl Error {
    /// Create a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a new backend-level provider error.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this failure is worth another attempt, possibly on a
    /// different provider.
    ///
    /// Rate limiting, timeouts and backend errors are transient; selector
    /// misses, exhausted budgets and engine-level conditions are terminal.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::RateLimited { .. } | Error::RequestTimeout { .. } | Error::Provider { .. }
        )
    }

    /// Name of the provider this error originated from, if any.
    pub fn provider_name(&self) -> Option<&str> {
        match self {
            Error::ProviderUnavailable { provider }
            | Error::RateLimited { provider }
            | Error::RequestTimeout { provider, .. }
            | Error::Provider { provider, .. } => Some(provider),
            _ => None,
        }
    }
}
