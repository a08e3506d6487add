//! Retry limits and second-level delay schedules.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration_ms;

/// How long a second-level retry waits before the message is visible again.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DelayPolicy {
    /// Same delay for every retry.
    Fixed {
        #[serde(with = "duration_ms")]
        delay: Duration,
    },
    /// `unit * retry_number`.
    Linear {
        #[serde(with = "duration_ms")]
        unit: Duration,
    },
    /// `base * 2^(retry_number - 1)`, capped at `max`.
    Exponential {
        #[serde(with = "duration_ms")]
        base: Duration,
        #[serde(with = "duration_ms")]
        max: Duration,
    },
}

impl Default for DelayPolicy {
    fn default() -> Self {
        DelayPolicy::Linear {
            unit: Duration::from_secs(10),
        }
    }
}

impl DelayPolicy {
    /// Delay before second-level retry number `retry_number` (1-based).
    pub fn delay_for(&self, retry_number: u32) -> Duration {
        let n = retry_number.max(1);
        match self {
            DelayPolicy::Fixed { delay } => *delay,
            DelayPolicy::Linear { unit } => unit.saturating_mul(n),
            DelayPolicy::Exponential { base, max } => {
                let factor = 1u32.checked_shl(n - 1).unwrap_or(u32::MAX);
                base.saturating_mul(factor).min(*max)
            }
        }
    }
}

/// Limits for first- and second-level retries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Immediate re-invocations allowed per delivery.
    pub first_level_max_retries: u32,
    /// Delayed retries through the input queue before the message is parked.
    pub second_level_max_retries: u32,
    #[serde(default)]
    pub delay: DelayPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            first_level_max_retries: 5,
            second_level_max_retries: 3,
            delay: DelayPolicy::default(),
        }
    }
}
