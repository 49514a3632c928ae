//! Two-level admission scheduling with bounded queues and slot handoff.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::core::breaker::CircuitBreaker;
use crate::core::error::AdmitError;

/// Concurrency and queue-depth limits enforced at admission.
#[derive(Debug, Clone)]
pub struct AdmitLimits {
    /// Maximum concurrent units of work per caller.
    pub per_caller_max_inflight: usize,
    /// Maximum units queued per caller beyond its in-flight limit.
    pub per_caller_max_queue: usize,
    /// Maximum concurrent units of work process-wide.
    pub global_max_inflight: usize,
    /// Maximum units waiting for a global slot.
    pub global_max_queue: usize,
}

impl Default for AdmitLimits {
    fn default() -> Self {
        Self {
            per_caller_max_inflight: 1,
            per_caller_max_queue: 10,
            global_max_inflight: 1,
            global_max_queue: 64,
        }
    }
}

type AdmitReply = oneshot::Sender<Result<AdmitPermit, AdmitError>>;

/// Per-caller scheduling state, created lazily and retained when idle.
#[derive(Default)]
struct CallerBucket {
    in_flight: usize,
    queue: VecDeque<AdmitReply>,
}

/// A unit waiting for a global slot. Keyed by caller so admission can
/// charge the right bucket when the slot frees up.
struct GlobalWaiter {
    caller: String,
    reply: AdmitReply,
}

#[derive(Default)]
struct SchedState {
    global_in_flight: usize,
    global_queue: VecDeque<GlobalWaiter>,
    buckets: HashMap<String, CallerBucket>,
}

struct SchedShared {
    limits: AdmitLimits,
    state: Mutex<SchedState>,
}

enum Handoff {
    Admit { reply: AdmitReply, permit: AdmitPermit },
    Reject { reply: AdmitReply, error: AdmitError },
    Idle,
}

impl SchedShared {
    /// Free the slots held for `caller` and hand capacity to the next
    /// waiter. Runs until a waiter accepts the grant or none remain.
    fn release(self: &Arc<Self>, caller: &str) {
        let mut caller = caller.to_string();
        loop {
            let action = {
                let mut st = self.state.lock();
                st.global_in_flight = st.global_in_flight.saturating_sub(1);
                if let Some(bucket) = st.buckets.get_mut(&caller) {
                    bucket.in_flight = bucket.in_flight.saturating_sub(1);
                }
                self.pick_next(&mut st, &caller)
            };
            match action {
                Handoff::Idle => return,
                Handoff::Reject { reply, error } => {
                    let _ = reply.send(Err(error));
                    return;
                }
                Handoff::Admit { reply, permit } => match reply.send(Ok(permit)) {
                    Ok(()) => return,
                    Err(returned) => {
                        if let Ok(mut unclaimed) = returned {
                            tracing::debug!(
                                caller = %unclaimed.caller,
                                "parked waiter gone, passing its slot on"
                            );
                            caller = unclaimed.disarm();
                        } else {
                            return;
                        }
                    }
                },
            }
        }
    }

    /// Pick the next waiter after a release. The freed caller's own queue
    /// is serviced before the global queue, trading strict global FIFO for
    /// per-caller continuity.
    fn pick_next(self: &Arc<Self>, st: &mut SchedState, freed: &str) -> Handoff {
        let next_same = st.buckets.get_mut(freed).and_then(|b| b.queue.pop_front());
        if let Some(reply) = next_same {
            if st.global_in_flight < self.limits.global_max_inflight {
                st.global_in_flight += 1;
                if let Some(bucket) = st.buckets.get_mut(freed) {
                    bucket.in_flight += 1;
                }
                return Handoff::Admit {
                    reply,
                    permit: AdmitPermit::granted(self, freed),
                };
            }
            // The successor re-checks the global gate: without capacity it
            // falls back to the global queue, or is shed when that is full.
            if st.global_queue.len() < self.limits.global_max_queue {
                st.global_queue.push_back(GlobalWaiter {
                    caller: freed.to_string(),
                    reply,
                });
                return Handoff::Idle;
            }
            return Handoff::Reject {
                reply,
                error: AdmitError::GlobalQueueFull,
            };
        }
        if let Some(waiter) = st.global_queue.pop_front() {
            st.global_in_flight += 1;
            st.buckets
                .entry(waiter.caller.clone())
                .or_default()
                .in_flight += 1;
            return Handoff::Admit {
                permit: AdmitPermit::granted(self, &waiter.caller),
                reply: waiter.reply,
            };
        }
        Handoff::Idle
    }
}

/// RAII admission grant for one unit of work.
///
/// Holding the permit accounts for one global slot and one slot in the
/// caller's bucket. Dropping it, on any path including panic unwind,
/// releases both and hands the freed capacity to the next waiter.
pub struct AdmitPermit {
    shared: Option<Arc<SchedShared>>,
    caller: String,
}

impl AdmitPermit {
    fn granted(shared: &Arc<SchedShared>, caller: &str) -> Self {
        Self {
            shared: Some(Arc::clone(shared)),
            caller: caller.to_string(),
        }
    }

    /// Caller this permit was granted to.
    pub fn caller(&self) -> &str {
        &self.caller
    }

    /// Take the slots out of this permit without releasing them, so the
    /// release loop can reuse them for the next waiter.
    fn disarm(&mut self) -> String {
        self.shared = None;
        std::mem::take(&mut self.caller)
    }
}

impl fmt::Debug for AdmitPermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmitPermit")
            .field("caller", &self.caller)
            .finish()
    }
}

impl Drop for AdmitPermit {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.release(&self.caller);
        }
    }
}

/// Per-caller counters inside a [`GateSnapshot`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CallerStats {
    /// Units of work currently executing for this caller.
    pub in_flight: usize,
    /// Units parked in this caller's queue.
    pub queue_len: usize,
}

/// Point-in-time view of scheduler and breaker state for health reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GateSnapshot {
    /// Units of work currently holding a global slot.
    pub global_in_flight: usize,
    /// Units waiting for a global slot.
    pub global_queue_len: usize,
    /// Whether the breaker currently rejects new work.
    pub breaker_open: bool,
    /// Epoch milliseconds when the breaker closes again, if open.
    pub breaker_tripped_until_ms: Option<u128>,
    /// Per-caller counters, keyed by caller id.
    pub callers: BTreeMap<String, CallerStats>,
}

/// Admission scheduler enforcing per-caller and global concurrency limits.
///
/// Work passes two gates in order: the caller's own in-flight limit, then
/// the global in-flight limit. Each gate parks overflow in a bounded FIFO
/// queue and rejects once that queue is full. A caller finishing a unit of
/// work hands its freed slot to the caller's own queue head first, then to
/// the global queue head. See [`AdmitLimits`] for the knobs.
///
/// The breaker is consulted once, at submission: work admitted just before
/// a trip runs to completion, and parked waiters are not re-screened.
pub struct AdmissionScheduler {
    shared: Arc<SchedShared>,
    breaker: Arc<CircuitBreaker>,
}

impl AdmissionScheduler {
    /// Create a scheduler with the given limits, consulting `breaker` at
    /// each submission.
    pub fn new(limits: AdmitLimits, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            shared: Arc::new(SchedShared {
                limits,
                state: Mutex::new(SchedState::default()),
            }),
            breaker,
        }
    }

    /// Admit one unit of work for `caller`, waiting in the relevant queue
    /// if a gate is saturated.
    ///
    /// Resolves with a permit holding both slots, or with the rejection
    /// that shed the request. Dropping the returned future while parked
    /// abandons the wait without leaking capacity.
    pub async fn admit(&self, caller: &str) -> Result<AdmitPermit, AdmitError> {
        if self.breaker.is_open() {
            tracing::debug!(caller, "rejecting submission while breaker is open");
            return Err(AdmitError::BreakerOpen);
        }
        let limits = &self.shared.limits;
        let rx = {
            let mut st = self.shared.state.lock();
            let global_busy = st.global_in_flight >= limits.global_max_inflight;
            let global_queue_len = st.global_queue.len();
            let bucket = st.buckets.entry(caller.to_string()).or_default();
            if bucket.in_flight >= limits.per_caller_max_inflight {
                if bucket.queue.len() >= limits.per_caller_max_queue {
                    tracing::debug!(caller, "caller queue full, shedding request");
                    return Err(AdmitError::CallerQueueFull);
                }
                let (tx, rx) = oneshot::channel();
                bucket.queue.push_back(tx);
                tracing::debug!(caller, depth = bucket.queue.len(), "parked in caller queue");
                rx
            } else if global_busy {
                if global_queue_len >= limits.global_max_queue {
                    tracing::debug!(caller, "global queue full, shedding request");
                    return Err(AdmitError::GlobalQueueFull);
                }
                let (tx, rx) = oneshot::channel();
                st.global_queue.push_back(GlobalWaiter {
                    caller: caller.to_string(),
                    reply: tx,
                });
                tracing::debug!(caller, depth = st.global_queue.len(), "parked in global queue");
                rx
            } else {
                bucket.in_flight += 1;
                st.global_in_flight += 1;
                return Ok(AdmitPermit::granted(&self.shared, caller));
            }
        };
        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(AdmitError::Internal("admission reply channel closed")),
        }
    }

    /// Run `work` once admission is granted for `caller`.
    ///
    /// The work future is not polled before admission; on rejection it is
    /// dropped unstarted. Its output passes through untouched, so a work
    /// future returning `Result` keeps its own error channel separate from
    /// admission errors.
    pub async fn schedule<T, F>(&self, caller: &str, work: F) -> Result<T, AdmitError>
    where
        F: Future<Output = T>,
    {
        let permit = self.admit(caller).await?;
        let output = work.await;
        drop(permit);
        Ok(output)
    }

    /// Read-only snapshot of the scheduler and its breaker.
    pub fn snapshot(&self) -> GateSnapshot {
        let st = self.shared.state.lock();
        let callers = st
            .buckets
            .iter()
            .map(|(caller, bucket)| {
                (
                    caller.clone(),
                    CallerStats {
                        in_flight: bucket.in_flight,
                        queue_len: bucket.queue.len(),
                    },
                )
            })
            .collect();
        GateSnapshot {
            global_in_flight: st.global_in_flight,
            global_queue_len: st.global_queue.len(),
            breaker_open: self.breaker.is_open(),
            breaker_tripped_until_ms: self.breaker.tripped_until_ms(),
            callers,
        }
    }
}
