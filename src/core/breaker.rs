//! Sliding-window circuit breaker with jittered cooldown.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::Rng;

use crate::util::clock::now_ms;

/// Trip thresholds and timing for the circuit breaker.
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    /// Trailing window over which failures are counted.
    pub window: Duration,
    /// Number of failures inside the window that trips the breaker.
    pub fails: usize,
    /// Base cooldown applied when the breaker trips.
    pub cooldown: Duration,
    /// Upper bound (exclusive) of the random jitter added to the cooldown.
    pub jitter_max: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(30),
            fails: 3,
            cooldown: Duration::from_secs(15),
            jitter_max: Duration::from_secs(4),
        }
    }
}

struct BreakerState {
    recent_failures: VecDeque<Instant>,
    tripped_until: Option<Instant>,
}

/// Tracks recent downstream failures and rejects new work while cooling down.
///
/// `record_failure` appends to a failure log pruned to the trailing window;
/// reaching the threshold sets a cooldown deadline with random jitter so
/// independent processes sharing a backend do not retry in lockstep. The
/// failure log is not cleared by a trip, so failures recorded while already
/// tripped push the deadline further out.
pub struct CircuitBreaker {
    settings: BreakerSettings,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a closed breaker with the given settings.
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(BreakerState {
                recent_failures: VecDeque::new(),
                tripped_until: None,
            }),
        }
    }

    /// Record one breaker-worthy failure, tripping the breaker if the
    /// window threshold is reached.
    pub fn record_failure(&self) {
        let now = Instant::now();
        let mut st = self.state.lock();
        st.recent_failures.push_back(now);
        while st
            .recent_failures
            .front()
            .is_some_and(|t| now.duration_since(*t) > self.settings.window)
        {
            st.recent_failures.pop_front();
        }
        if st.recent_failures.len() >= self.settings.fails {
            let jitter_ms = u64::try_from(self.settings.jitter_max.as_millis()).unwrap_or(u64::MAX);
            let jitter = if jitter_ms == 0 {
                Duration::ZERO
            } else {
                Duration::from_millis(rand::rng().random_range(0..jitter_ms))
            };
            let open_for = self.settings.cooldown + jitter;
            st.tripped_until = Some(now + open_for);
            tracing::warn!(open_for = ?open_for, "circuit breaker tripped");
        }
    }

    /// Whether the breaker currently rejects new work. Pure check, no
    /// side effects.
    pub fn is_open(&self) -> bool {
        let st = self.state.lock();
        st.tripped_until.is_some_and(|until| Instant::now() < until)
    }

    /// Epoch milliseconds at which the breaker closes again, or `None`
    /// when it is not open.
    pub fn tripped_until_ms(&self) -> Option<u128> {
        let st = self.state.lock();
        let until = st.tripped_until?;
        let now = Instant::now();
        if until <= now {
            return None;
        }
        Some(now_ms() + until.duration_since(now).as_millis())
    }
}
