//! Debounce-merging of per-caller input bursts.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

/// Abstraction for spawning background work on a runtime.
pub trait Spawn {
    /// Spawn an async task that runs to completion in the background.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Merged text handed back to every contributor of a burst.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedSubmission {
    /// All fragments of the burst, newline-joined in arrival order.
    pub text: String,
    /// True for the final contributor of the burst, which is expected to
    /// carry the merged unit forward; earlier contributors see `false`.
    pub lead: bool,
}

struct CoalescerEntry {
    buf: String,
    generation: u64,
    waiters: Vec<oneshot::Sender<MergedSubmission>>,
}

/// Merges rapid successive fragments from the same caller into one unit
/// of work.
///
/// The flush timer is a debounce: each new fragment restarts the merge
/// window, so the merged text is released only after the caller has been
/// quiet for one full window. A caller submitting once simply gets their
/// own fragment back after the window elapses.
pub struct Coalescer<S> {
    window: Duration,
    spawner: S,
    // Stamps arrivals across all entries, so a stale timer from a
    // flushed burst can never match a later entry's stamp.
    seq: AtomicU64,
    entries: Arc<Mutex<HashMap<String, CoalescerEntry>>>,
}

impl<S: Spawn> Coalescer<S> {
    /// Create a coalescer flushing after `window` of caller silence.
    pub fn new(window: Duration, spawner: S) -> Self {
        Self {
            window,
            spawner,
            seq: AtomicU64::new(0),
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Merge window applied between a caller's fragments.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Submit one fragment and wait for the merged text of its burst.
    ///
    /// Every call contributing to the same burst resolves with the same
    /// merged text once the window elapses with no further arrivals.
    pub async fn submit(&self, caller: &str, fragment: &str) -> MergedSubmission {
        let (tx, rx) = oneshot::channel();
        let generation = {
            let mut entries = self.entries.lock();
            let generation = self.seq.fetch_add(1, Ordering::Relaxed);
            match entries.get_mut(caller) {
                Some(entry) => {
                    entry.buf.push('\n');
                    entry.buf.push_str(fragment);
                    entry.generation = generation;
                    entry.waiters.push(tx);
                }
                None => {
                    entries.insert(
                        caller.to_string(),
                        CoalescerEntry {
                            buf: fragment.to_string(),
                            generation,
                            waiters: vec![tx],
                        },
                    );
                }
            }
            generation
        };

        // Arm a flush for this arrival. A later arrival restamps the entry,
        // turning this timer into a no-op when it fires.
        let entries = Arc::clone(&self.entries);
        let window = self.window;
        let key = caller.to_string();
        self.spawner.spawn(async move {
            tokio::time::sleep(window).await;
            let flushed = {
                let mut entries = entries.lock();
                if entries
                    .get(&key)
                    .is_some_and(|e| e.generation == generation)
                {
                    entries.remove(&key)
                } else {
                    None
                }
            };
            if let Some(entry) = flushed {
                tracing::debug!(
                    caller = %key,
                    fragments = entry.waiters.len(),
                    chars = entry.buf.len(),
                    "merge window elapsed, flushing burst"
                );
                let last = entry.waiters.len().saturating_sub(1);
                for (i, waiter) in entry.waiters.into_iter().enumerate() {
                    let _ = waiter.send(MergedSubmission {
                        text: entry.buf.clone(),
                        lead: i == last,
                    });
                }
            }
        });

        // The flush task can only vanish if its runtime shut down; hand the
        // caller their own fragment back rather than wedging them.
        match rx.await {
            Ok(merged) => merged,
            Err(_) => MergedSubmission {
                text: fragment.to_string(),
                lead: true,
            },
        }
    }
}
