//! Gate configuration structures.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Tunable knobs for admission, breaker, invocation and coalescing.
///
/// Durations are plain milliseconds so the struct round-trips through
/// JSON and environment variables without unit ambiguity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Maximum concurrent requests per caller.
    pub per_caller_max_inflight: usize,
    /// Maximum requests queued per caller beyond its in-flight limit.
    pub per_caller_max_queue: usize,
    /// Maximum concurrent requests process-wide.
    pub global_max_inflight: usize,
    /// Maximum requests waiting for a global slot.
    pub global_max_queue: usize,
    /// Deadline for a single downstream call, in milliseconds.
    pub request_timeout_ms: u64,
    /// Sliding window over which downstream failures are counted.
    pub breaker_window_ms: u64,
    /// Failures within the window that trip the breaker.
    pub breaker_fails: usize,
    /// Base cooldown once the breaker trips, in milliseconds.
    pub breaker_cooldown_ms: u64,
    /// Upper bound of the random extra cooldown, in milliseconds.
    pub breaker_jitter_ms: u64,
    /// Quiet period before buffered fragments are flushed downstream.
    pub merge_window_ms: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            per_caller_max_inflight: 1,
            per_caller_max_queue: 10,
            global_max_inflight: 1,
            global_max_queue: 64,
            request_timeout_ms: 180_000,
            breaker_window_ms: 30_000,
            breaker_fails: 3,
            breaker_cooldown_ms: 15_000,
            breaker_jitter_ms: 4_000,
            merge_window_ms: 250,
        }
    }
}

impl GateConfig {
    /// Validate configuration values.
    ///
    /// Every knob except `breaker_jitter_ms` must be greater than zero; a
    /// zero jitter simply makes the cooldown deterministic.
    pub fn validate(&self) -> Result<(), String> {
        if self.per_caller_max_inflight == 0 {
            return Err("per_caller_max_inflight must be greater than 0".into());
        }
        if self.per_caller_max_queue == 0 {
            return Err("per_caller_max_queue must be greater than 0".into());
        }
        if self.global_max_inflight == 0 {
            return Err("global_max_inflight must be greater than 0".into());
        }
        if self.global_max_queue == 0 {
            return Err("global_max_queue must be greater than 0".into());
        }
        if self.request_timeout_ms == 0 {
            return Err("request_timeout_ms must be greater than 0".into());
        }
        if self.breaker_window_ms == 0 {
            return Err("breaker_window_ms must be greater than 0".into());
        }
        if self.breaker_fails == 0 {
            return Err("breaker_fails must be greater than 0".into());
        }
        if self.breaker_cooldown_ms == 0 {
            return Err("breaker_cooldown_ms must be greater than 0".into());
        }
        if self.merge_window_ms == 0 {
            return Err("merge_window_ms must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse gate configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build a configuration from `GATE_*` environment variables, falling
    /// back to the defaults for anything unset.
    ///
    /// Loads a `.env` file first when one is present. Set values must
    /// parse as the field's type and the result must validate.
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();
        let mut cfg = Self::default();
        env_override(&mut cfg.per_caller_max_inflight, "GATE_PER_CALLER_MAX_INFLIGHT")?;
        env_override(&mut cfg.per_caller_max_queue, "GATE_PER_CALLER_MAX_QUEUE")?;
        env_override(&mut cfg.global_max_inflight, "GATE_GLOBAL_MAX_INFLIGHT")?;
        env_override(&mut cfg.global_max_queue, "GATE_GLOBAL_MAX_QUEUE")?;
        env_override(&mut cfg.request_timeout_ms, "GATE_REQUEST_TIMEOUT_MS")?;
        env_override(&mut cfg.breaker_window_ms, "GATE_BREAKER_WINDOW_MS")?;
        env_override(&mut cfg.breaker_fails, "GATE_BREAKER_FAILS")?;
        env_override(&mut cfg.breaker_cooldown_ms, "GATE_BREAKER_COOLDOWN_MS")?;
        env_override(&mut cfg.breaker_jitter_ms, "GATE_BREAKER_JITTER_MS")?;
        env_override(&mut cfg.merge_window_ms, "GATE_MERGE_WINDOW_MS")?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Overwrite `field` from the environment variable `key` when set.
fn env_override<T>(field: &mut T, key: &str) -> Result<(), String>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => {
            *field = raw.parse().map_err(|e| format!("{key} invalid: {e}"))?;
            Ok(())
        }
        Err(std::env::VarError::NotPresent) => Ok(()),
        Err(e) => Err(format!("{key} unreadable: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(GateConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_inflight_rejected() {
        let cfg = GateConfig {
            per_caller_max_inflight: 0,
            ..GateConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_queue_depth_rejected() {
        let cfg = GateConfig {
            global_max_queue: 0,
            ..GateConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_timeout_rejected() {
        let cfg = GateConfig {
            request_timeout_ms: 0,
            ..GateConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_jitter_allowed() {
        let cfg = GateConfig {
            breaker_jitter_ms: 0,
            ..GateConfig::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn from_json_overrides_and_defaults() {
        let cfg = GateConfig::from_json_str(
            r#"{
                "global_max_queue": 8,
                "merge_window_ms": 100
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.global_max_queue, 8);
        assert_eq!(cfg.merge_window_ms, 100);
        assert_eq!(cfg.per_caller_max_queue, 10);
        assert_eq!(cfg.request_timeout_ms, 180_000);
    }

    #[test]
    fn from_json_rejects_invalid_values() {
        let res = GateConfig::from_json_str(r#"{"breaker_fails": 0}"#);
        assert!(res.is_err());
    }
}
