//! 弹性模式模块：提供熔断器和滑动窗口限流器等可靠性保障机制。
//!
//! # Resilience Primitives Module
//!
//! This module provides the per-provider resilience patterns the dispatch
//! engine is built on, protecting backends against overload and isolating
//! failures.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`circuit_breaker`] | Three-state circuit breaker for failure isolation |
//! | [`rate_limiter`] | Sliding-window rate limiter for quota control |
//!
//! ## Circuit Breaker
//!
//! The circuit breaker prevents repeated calls to a failing backend:
//! - **Closed**: Normal operation, requests pass through
//! - **Open**: Failures exceeded threshold, requests fail fast
//! - **Half-Open**: Testing if the backend has recovered
//!
//! ```rust
//! use ai_dispatch::resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
//! use std::time::Duration;
//!
//! let config = CircuitBreakerConfig::new()
//!     .with_failure_threshold(5)
//!     .with_recovery_timeout(Duration::from_secs(30));
//! let breaker = CircuitBreaker::new(config);
//!
//! if breaker.can_execute() {
//!     // Make the backend call...
//!     breaker.call_success();
//! }
//! ```
//!
//! ## Rate Limiter
//!
//! The rate limiter bounds how many calls are admitted within any trailing
//! 60-second window:
//!
//! ```rust,no_run
//! use ai_dispatch::resilience::rate_limiter::RateLimiter;
//!
//! # async fn demo() {
//! let limiter = RateLimiter::new(60); // 60 calls per minute
//! if limiter.acquire().await {
//!     // Proceed with the call...
//! }
//! # }
//! ```

pub mod circuit_breaker;
pub mod rate_limiter;
