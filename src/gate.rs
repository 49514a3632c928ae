//! High-level entry point wiring coalescing, admission and invocation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::config::GateConfig;
use crate::core::breaker::{BreakerSettings, CircuitBreaker};
use crate::core::coalescer::{Coalescer, Spawn};
use crate::core::error::{AdmitError, InvokeError, TransientError};
use crate::core::invoker::Invoker;
use crate::core::scheduler::{AdmissionScheduler, AdmitLimits, GateSnapshot};

/// Downstream inference backend, invoked once per merged request.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Error produced by a failed call. Its [`TransientError`] judgement
    /// decides whether the failure counts toward tripping the breaker.
    type Error: std::error::Error + TransientError + Send + Sync + 'static;

    /// Produce a completion for `input`.
    async fn infer(&self, input: &str) -> Result<String, Self::Error>;
}

#[async_trait]
impl<B: Backend + ?Sized> Backend for Arc<B> {
    type Error = B::Error;

    async fn infer(&self, input: &str) -> Result<String, Self::Error> {
        (**self).infer(input).await
    }
}

/// Outcome of a single [`InferenceGate::handle`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateReply {
    /// The merged request ran downstream and produced this answer.
    Answer(String),
    /// The fragment was folded into a later submission from the same
    /// caller; that submission carries the answer for the whole burst.
    Coalesced,
}

/// Failure of a [`InferenceGate::handle`] call.
#[derive(Debug, Error)]
pub enum GateError<E>
where
    E: std::error::Error + 'static,
{
    /// The request was shed before reaching the backend.
    #[error(transparent)]
    Admission(#[from] AdmitError),
    /// The backend call ran and failed or timed out.
    #[error(transparent)]
    Invoke(#[from] InvokeError<E>),
}

/// Admission gate in front of a single-capacity inference backend.
///
/// `handle` runs the full pipeline: rapid-fire fragments from one caller
/// are merged during a quiet window, the merged request passes the
/// breaker and both admission gates, and the backend call runs under a
/// deadline. Failures the backend marks transient feed the breaker.
pub struct InferenceGate<B, S> {
    coalescer: Coalescer<S>,
    scheduler: AdmissionScheduler,
    breaker: Arc<CircuitBreaker>,
    invoker: Invoker,
    backend: B,
}

impl<B, S> InferenceGate<B, S>
where
    B: Backend,
    S: Spawn + Send + Sync,
{
    /// Build a gate over `backend` with the given configuration, using
    /// `spawner` for the coalescer's flush timers.
    pub fn new(cfg: &GateConfig, backend: B, spawner: S) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(BreakerSettings {
            window: Duration::from_millis(cfg.breaker_window_ms),
            fails: cfg.breaker_fails,
            cooldown: Duration::from_millis(cfg.breaker_cooldown_ms),
            jitter_max: Duration::from_millis(cfg.breaker_jitter_ms),
        }));
        let limits = AdmitLimits {
            per_caller_max_inflight: cfg.per_caller_max_inflight,
            per_caller_max_queue: cfg.per_caller_max_queue,
            global_max_inflight: cfg.global_max_inflight,
            global_max_queue: cfg.global_max_queue,
        };
        Self {
            coalescer: Coalescer::new(Duration::from_millis(cfg.merge_window_ms), spawner),
            scheduler: AdmissionScheduler::new(limits, Arc::clone(&breaker)),
            breaker,
            invoker: Invoker::new(Duration::from_millis(cfg.request_timeout_ms)),
            backend,
        }
    }

    /// Submit one fragment from `caller` and drive it through the gate.
    ///
    /// Returns [`GateReply::Coalesced`] when the fragment was absorbed by
    /// a later submission in the same burst. Admission rejections and
    /// downstream failures come back as [`GateError`], with a transient
    /// downstream failure already recorded against the breaker.
    pub async fn handle(
        &self,
        caller: &str,
        fragment: &str,
    ) -> Result<GateReply, GateError<B::Error>> {
        let merged = self.coalescer.submit(caller, fragment).await;
        if !merged.lead {
            return Ok(GateReply::Coalesced);
        }
        let request_id = Uuid::new_v4();
        tracing::debug!(
            request_id = %request_id,
            caller,
            chars = merged.text.len(),
            "scheduling merged request"
        );
        let outcome = self
            .scheduler
            .schedule(caller, async {
                let result = self.invoker.invoke(self.backend.infer(&merged.text)).await;
                if let Err(ref failure) = result {
                    if failure.breaker_worthy() {
                        self.breaker.record_failure();
                    }
                }
                result
            })
            .await;
        match outcome {
            Ok(Ok(answer)) => {
                tracing::debug!(request_id = %request_id, caller, "request completed");
                Ok(GateReply::Answer(answer))
            }
            Ok(Err(failure)) => {
                tracing::warn!(
                    request_id = %request_id,
                    caller,
                    error = %failure,
                    "downstream call failed"
                );
                Err(GateError::Invoke(failure))
            }
            Err(rejection) => {
                tracing::debug!(
                    request_id = %request_id,
                    caller,
                    error = %rejection,
                    "request shed at admission"
                );
                Err(GateError::Admission(rejection))
            }
        }
    }

    /// Whether the breaker currently rejects new submissions.
    pub fn breaker_open(&self) -> bool {
        self.breaker.is_open()
    }

    /// The breaker shared with the scheduler. Exposed so failures
    /// observed outside the gate can be recorded against the same window.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Point-in-time view of scheduler and breaker state.
    pub fn snapshot(&self) -> GateSnapshot {
        self.scheduler.snapshot()
    }
}
