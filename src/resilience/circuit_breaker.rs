use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, calls pass through.
    Closed,
    /// Failures exceeded the threshold; calls fail fast.
    Open,
    /// Probing whether the backend has recovered.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the breaker opens.
    pub failure_threshold: u32,
    /// How long the breaker stays open before allowing a probe.
    pub recovery_timeout: Duration,
    /// Consecutive successes required to close from half-open.
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the failure threshold
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the recovery timeout
    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    /// Set the half-open success threshold
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_streak: u32,
    /// Remaining open time in ms, if currently open.
    pub open_remaining_ms: Option<u64>,
}

#[derive(Debug)]
struct State {
    state: CircuitState,
    failure_count: u32,
    success_streak: u32,
    last_failure_time: Option<Instant>,
    probe_inflight: bool,
}

/// Three-state circuit breaker (closed / open / half-open).
///
/// - Counts consecutive failures while closed; opens at the threshold
/// - After `recovery_timeout`, admits exactly one half-open probe at a time
/// - Requires `success_threshold` consecutive successes to close again;
///   any half-open failure reopens immediately
pub struct CircuitBreaker {
    cfg: CircuitBreakerConfig,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(cfg: CircuitBreakerConfig) -> Self {
        Self {
            cfg,
            state: Mutex::new(State {
                state: CircuitState::Closed,
                failure_count: 0,
                success_streak: 0,
                last_failure_time: None,
                probe_inflight: false,
            }),
        }
    }

    fn recovery_elapsed(&self, st: &State) -> bool {
        match st.last_failure_time {
            Some(t) => t.elapsed() >= self.cfg.recovery_timeout,
            None => true,
        }
    }

    /// Execution-path gate: may this call proceed right now?
    ///
    /// While closed this is a pure query. Once the recovery timeout has
    /// elapsed on an open breaker, the first caller shifts it to half-open
    /// and takes the single probe slot; further callers are rejected until
    /// that probe reports back via [`call_success`](Self::call_success) or
    /// [`call_failure`](Self::call_failure).
    pub fn can_execute(&self) -> bool {
        let Ok(mut st) = self.state.lock() else {
            return false;
        };
        match st.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if self.recovery_elapsed(&st) {
                    st.state = CircuitState::HalfOpen;
                    st.success_streak = 0;
                    st.probe_inflight = true;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if st.probe_inflight {
                    false
                } else {
                    st.probe_inflight = true;
                    true
                }
            }
        }
    }

    /// Read-only eligibility query used by provider selection.
    ///
    /// Unlike [`can_execute`](Self::can_execute) this never takes the
    /// half-open probe slot, so filtering candidates does not starve the
    /// provider that is about to execute.
    pub fn is_eligible(&self) -> bool {
        let Ok(st) = self.state.lock() else {
            return false;
        };
        match st.state {
            CircuitState::Closed => true,
            CircuitState::Open => self.recovery_elapsed(&st),
            CircuitState::HalfOpen => !st.probe_inflight,
        }
    }

    /// Record a successful call.
    pub fn call_success(&self) {
        if let Ok(mut st) = self.state.lock() {
            match st.state {
                CircuitState::Closed => {
                    st.failure_count = 0;
                }
                CircuitState::HalfOpen => {
                    st.probe_inflight = false;
                    st.success_streak = st.success_streak.saturating_add(1);
                    if st.success_streak >= self.cfg.success_threshold {
                        st.state = CircuitState::Closed;
                        st.failure_count = 0;
                        st.success_streak = 0;
                        st.last_failure_time = None;
                    }
                }
                // Stale report from a call that started before the breaker
                // reopened; the open state already reflects newer failures.
                CircuitState::Open => {}
            }
        }
    }

    /// Record a failed call.
    pub fn call_failure(&self) {
        if let Ok(mut st) = self.state.lock() {
            match st.state {
                CircuitState::Closed => {
                    st.failure_count = st.failure_count.saturating_add(1);
                    st.last_failure_time = Some(Instant::now());
                    if st.failure_count >= self.cfg.failure_threshold {
                        st.state = CircuitState::Open;
                    }
                }
                CircuitState::HalfOpen => {
                    st.probe_inflight = false;
                    st.success_streak = 0;
                    st.state = CircuitState::Open;
                    st.last_failure_time = Some(Instant::now());
                }
                CircuitState::Open => {
                    st.last_failure_time = Some(Instant::now());
                }
            }
        }
    }

    /// Release a probe slot taken by `can_execute` when the call was aborted
    /// before reaching the backend (e.g. no rate-limit quota). Not a
    /// success/failure signal.
    pub(crate) fn release_probe(&self) {
        if let Ok(mut st) = self.state.lock() {
            if st.state == CircuitState::HalfOpen {
                st.probe_inflight = false;
            }
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
            .lock()
            .map(|st| st.state)
            .unwrap_or(CircuitState::Open)
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        if let Ok(st) = self.state.lock() {
            let open_remaining_ms = match (st.state, st.last_failure_time) {
                (CircuitState::Open, Some(t)) => {
                    let elapsed = t.elapsed();
                    if elapsed < self.cfg.recovery_timeout {
                        Some((self.cfg.recovery_timeout - elapsed).as_millis() as u64)
                    } else {
                        None
                    }
                }
                _ => None,
            };
            CircuitBreakerSnapshot {
                state: st.state,
                failure_count: st.failure_count,
                success_streak: st.success_streak,
                open_remaining_ms,
            }
        } else {
            CircuitBreakerSnapshot {
                state: CircuitState::Open,
                failure_count: 0,
                success_streak: 0,
                open_remaining_ms: None,
            }
        }
    }
}
