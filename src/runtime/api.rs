//! Serializable health-report surface over the gate snapshot.

use serde::{Deserialize, Serialize};

use crate::core::GateSnapshot;

/// Health view handed to an external reporting surface.
///
/// Shows the process-wide counters plus the asking caller's own bucket, so
/// a caller can see where their pending work stands without exposing other
/// callers' queues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Units of work currently holding a global slot.
    pub global_in_flight: usize,
    /// Units waiting for a global slot.
    pub global_queue_len: usize,
    /// Whether the breaker currently rejects new work.
    pub breaker_open: bool,
    /// Epoch milliseconds when the breaker closes again, if open.
    pub breaker_tripped_until_ms: Option<u128>,
    /// Units currently executing for the asking caller.
    pub caller_in_flight: usize,
    /// Units parked in the asking caller's queue.
    pub caller_queue_len: usize,
}

impl HealthReport {
    /// Build a report from `snapshot`, scoped to `caller`'s own bucket.
    ///
    /// A caller with no bucket yet reports zero counters.
    pub fn for_caller(snapshot: &GateSnapshot, caller: &str) -> Self {
        let own = snapshot.callers.get(caller).copied().unwrap_or_default();
        Self {
            global_in_flight: snapshot.global_in_flight,
            global_queue_len: snapshot.global_queue_len,
            breaker_open: snapshot.breaker_open,
            breaker_tripped_until_ms: snapshot.breaker_tripped_until_ms,
            caller_in_flight: own.in_flight,
            caller_queue_len: own.queue_len,
        }
    }
}
