//! Telemetry configuration and the reconnect backoff policy.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// BackoffPolicy
// ---------------------------------------------------------------------------

/// How long to wait between reconnect attempts, and when to give up.
///
/// The n-th wait of a retry episode (n = 0, 1, 2, …) is
/// `min(base_delay · 2ⁿ, max_delay)`, then shortened by up to
/// `jitter` × that value so clients that lost the broker together don't
/// come back in lockstep. Jitter never pushes a delay above the cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Fraction (0.0–1.0) of each delay that may be shaved off at random.
    pub jitter: f64,
    /// Failed connection attempts allowed per episode before `Failed`.
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 16_000,
            jitter: 0.1,
            max_attempts: 5,
        }
    }
}

impl BackoffPolicy {
    /// Clamp and fix any out-of-range values so the policy is safe to use.
    ///
    /// Rules:
    /// - `base_delay_ms` at least 1.
    /// - `max_delay_ms` forced ≥ `base_delay_ms`.
    /// - `jitter` clamped to `0.0..=1.0` (NaN becomes 0).
    /// - `max_attempts` at least 1.
    pub fn validated(mut self) -> Self {
        if self.base_delay_ms == 0 {
            warn!("base_delay_ms is 0, using 1");
            self.base_delay_ms = 1;
        }
        if self.max_delay_ms < self.base_delay_ms {
            warn!(
                max = self.max_delay_ms,
                base = self.base_delay_ms,
                "max_delay_ms below base_delay_ms, raising it"
            );
            self.max_delay_ms = self.base_delay_ms;
        }
        if self.jitter.is_nan() || !(0.0..=1.0).contains(&self.jitter) {
            warn!(jitter = self.jitter, "jitter outside 0..=1, clamping");
            self.jitter = if self.jitter.is_nan() {
                0.0
            } else {
                self.jitter.clamp(0.0, 1.0)
            };
        }
        if self.max_attempts == 0 {
            warn!("max_attempts is 0, using 1");
            self.max_attempts = 1;
        }
        self
    }

    /// The capped delay for wait number `retry`, before jitter.
    pub fn nominal_delay(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry);
        let ms = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }

    /// The delay for wait number `retry`, with jitter applied.
    pub fn delay(&self, retry: u32) -> Duration {
        let nominal = self.nominal_delay(retry);
        if self.jitter <= 0.0 {
            return nominal;
        }
        let shave = rand::rng().random_range(0.0..self.jitter);
        nominal.mul_f64(1.0 - shave)
    }
}

// ---------------------------------------------------------------------------
// TelemetryConfig
// ---------------------------------------------------------------------------

/// Settings for the telemetry client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Broker topic carrying temperature readings.
    pub topic: String,
    pub backoff: BackoffPolicy,
    /// Capacity of the per-link broker event channel.
    pub event_buffer: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            topic: "sensors/temperature".to_string(),
            backoff: BackoffPolicy::default(),
            event_buffer: 64,
        }
    }
}

impl TelemetryConfig {
    /// Validates the backoff policy and fixes an empty event buffer.
    pub fn validated(mut self) -> Self {
        self.backoff = self.backoff.validated();
        if self.event_buffer == 0 {
            warn!("event_buffer is 0, using 1");
            self.event_buffer = 1;
        }
        self
    }
}
