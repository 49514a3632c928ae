//! Error types for admission and downstream invocation.

use std::time::Duration;

use thiserror::Error;

/// Rejection reasons produced at admission time.
///
/// The first three are expected load-shedding outcomes the caller is meant
/// to handle; `Internal` signals a broken admission handoff and should never
/// be observed in normal operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdmitError {
    /// The circuit breaker is open; the backend is cooling down.
    #[error("breaker_open: backend is cooling down")]
    BreakerOpen,
    /// The caller's own pending queue is at capacity.
    #[error("caller_queue_full: too many pending requests for this caller")]
    CallerQueueFull,
    /// The process-wide pending queue is at capacity.
    #[error("global_queue_full: too many pending requests overall")]
    GlobalQueueFull,
    /// Scheduler invariant violated during handoff.
    #[error("internal admission error: {0}")]
    Internal(&'static str),
}

/// Failure kinds produced by the timeout-wrapped downstream call.
#[derive(Debug, Error)]
pub enum InvokeError<E>
where
    E: std::error::Error + 'static,
{
    /// The call did not settle within the configured deadline.
    #[error("downstream call timed out after {0:?}")]
    Elapsed(Duration),
    /// The call itself failed before the deadline.
    #[error("downstream call failed: {0}")]
    Call(#[source] E),
}

/// Classification of downstream failures for breaker feedback.
///
/// Only transient, connectivity-shaped failures should count toward tripping
/// the breaker; application-level errors are not fixed by a cooldown.
pub trait TransientError {
    /// True when this failure should be recorded on the breaker.
    fn breaker_worthy(&self) -> bool;
}

impl<E> TransientError for InvokeError<E>
where
    E: std::error::Error + TransientError + 'static,
{
    fn breaker_worthy(&self) -> bool {
        match self {
            Self::Elapsed(_) => true,
            Self::Call(e) => e.breaker_worthy(),
        }
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
