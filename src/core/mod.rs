//! Core admission, breaker, coalescing and invocation machinery.

pub mod breaker;
pub mod coalescer;
pub mod error;
pub mod invoker;
pub mod scheduler;

pub use breaker::{BreakerSettings, CircuitBreaker};
pub use coalescer::{Coalescer, MergedSubmission, Spawn};
pub use error::{AdmitError, AppResult, InvokeError, TransientError};
pub use invoker::Invoker;
pub use scheduler::{AdmissionScheduler, AdmitLimits, AdmitPermit, CallerStats, GateSnapshot};
