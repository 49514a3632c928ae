//! Configuration models for limits, timeouts, and breaker tuning.

pub mod gate;

pub use gate::GateConfig;
