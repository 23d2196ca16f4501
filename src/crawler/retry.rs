//! Retry policy with linear or exponential backoff
//!
//! Two backoff variants are supported:
//! - linear: `base × attempt`
//! - exponential with jitter: `base × 2^(attempt-1) + random(0..=jitter_max)`

use crate::config::{BackoffKind, FetchConfig};
use rand::Rng;
use std::time::Duration;

/// Exponent cap so the shift below can never overflow
const MAX_EXPONENT: u32 = 20;

/// How many times to try a fetch and how long to wait in between
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    pub base_delay: Duration,

    pub backoff: BackoffKind,

    /// Upper bound of the jitter added to exponential delays
    pub jitter_max: Duration,
}

impl RetryPolicy {
    /// Builds the policy from the `[fetch]` configuration section
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            backoff: config.backoff,
            jitter_max: Duration::from_millis(config.jitter_ms),
        }
    }

    /// Delay to wait after the given (1-based) failed attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let jitter = match self.backoff {
            BackoffKind::Linear => Duration::ZERO,
            BackoffKind::Exponential => random_jitter(self.jitter_max),
        };
        self.delay_with_jitter(attempt, jitter)
    }

    /// Deterministic part of [`delay_for`](Self::delay_for) plus a given jitter
    pub fn delay_with_jitter(&self, attempt: u32, jitter: Duration) -> Duration {
        let attempt = attempt.max(1);
        match self.backoff {
            BackoffKind::Linear => self.base_delay.saturating_mul(attempt),
            BackoffKind::Exponential => {
                let factor = 1u32 << (attempt - 1).min(MAX_EXPONENT);
                self.base_delay
                    .saturating_mul(factor)
                    .saturating_add(jitter.min(self.jitter_max))
            }
        }
    }

    /// Returns true if another attempt is allowed after `attempt`
    pub fn has_attempts_left(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

fn random_jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}
