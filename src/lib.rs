//! # Inference Gate
//!
//! Admission scheduling, circuit breaking and request coalescing in front of
//! a slow, single-capacity inference backend shared by many callers.
//!
//! This library provides the concurrency-control core that decides which
//! requests reach the backend and when. Requests queue when capacity is
//! exhausted, are shed when queues fill, and are rejected outright while the
//! backend is cooling down from a failure streak.
//!
//! ## Core Problem Solved
//!
//! A single slow inference endpoint behind many concurrent callers needs
//! more than a semaphore:
//!
//! - **Per-caller fairness**: one bursty caller must not starve everyone else
//! - **Global capacity**: the backend handles one request at a time, so
//!   excess work must park in bounded queues rather than pile up downstream
//! - **Load shedding**: when the backend is failing, hammering it with
//!   retries only prolongs the outage
//! - **Burst merging**: a caller typing three lines in two seconds wants one
//!   answer to all three, not three queued round trips
//!
//! ## Components
//!
//! - [`core::Coalescer`]: debounce-merges rapid fragments from one caller
//!   into a single unit of work
//! - [`core::CircuitBreaker`]: sliding-window failure tracking with a
//!   jittered cooldown once a threshold is reached
//! - [`core::AdmissionScheduler`]: per-caller and global in-flight limits
//!   with bounded FIFO queues at both levels
//! - [`core::Invoker`]: hard-timeout wrapper around the downstream call
//! - [`gate::InferenceGate`]: façade wiring all four together
//!
//! ## Usage
//!
//! ```rust,ignore
//! use inference_gate::config::GateConfig;
//! use inference_gate::gate::InferenceGate;
//! use inference_gate::runtime::TokioSpawner;
//!
//! let cfg = GateConfig::from_env()?;
//! let gate = InferenceGate::new(&cfg, my_backend, TokioSpawner::current());
//!
//! match gate.handle("user-42", "summarize this").await? {
//!     GateReply::Answer(text) => println!("{text}"),
//!     GateReply::Coalesced => {} // folded into a later fragment's answer
//! }
//! ```
//!
//! For complete examples, see:
//! - `tests/gate_flow_test.rs` - Full pipeline integration tests
//! - `tests/scheduler_admission_test.rs` - Admission and fairness properties

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core admission, breaker, coalescing and invocation machinery.
pub mod core;
/// Configuration models for limits, timeouts, and breaker tuning.
pub mod config;
/// Composed gate façade over the core components.
pub mod gate;
/// Runtime adapters and the health-report surface.
pub mod runtime;
/// Shared utilities.
pub mod util;

pub use config::GateConfig;
pub use gate::{Backend, GateError, GateReply, InferenceGate};
