//! Endpoint configuration consumed by the retry and delivery machinery.
//!
//! ```ignore
//! let config = BusConfig::from_json_str(r#"{
//!     "input_queue": "sales",
//!     "first_level_max_retries": 3,
//!     "second_level_delay": { "kind": "exponential", "base": 1000, "max": 60000 }
//! }"#)?;
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::message::Address;
use crate::outbound::{DeliveryPolicy, PermanentFailurePolicy};
use crate::retry::{DelayPolicy, RetryPolicy};

/// Upper bound on `first_level_max_retries`; each one is an immediate
/// in-process re-run of every handler.
pub const MAX_FIRST_LEVEL_RETRIES: u32 = 100;

/// Error type for loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Retry and delivery settings for one endpoint.
///
/// Durations are expressed in milliseconds when (de)serialized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Queue this endpoint receives from.
    pub input_queue: Address,
    /// Where messages go once every retry is exhausted.
    pub failure_destination: Address,
    /// Immediate retries per delivery.
    pub first_level_max_retries: u32,
    /// Delayed retries through the input queue.
    pub second_level_max_retries: u32,
    pub second_level_delay: DelayPolicy,
    /// Attempts per outbound send before a transient error becomes fatal.
    pub max_delivery_count: u32,
    /// Outbound backoff grows by this much per failed attempt.
    #[serde(with = "duration_ms")]
    pub backoff_unit: Duration,
    pub permanent_failure_policy: PermanentFailurePolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            input_queue: Address::new("input"),
            failure_destination: Address::new("error"),
            first_level_max_retries: 5,
            second_level_max_retries: 3,
            second_level_delay: DelayPolicy::Linear {
                unit: Duration::from_secs(10),
            },
            max_delivery_count: 5,
            backoff_unit: Duration::from_secs(10),
            permanent_failure_policy: PermanentFailurePolicy::Surface,
        }
    }
}

impl BusConfig {
    pub fn new(input_queue: Address) -> Self {
        Self {
            input_queue,
            ..Self::default()
        }
    }

    /// Parse and validate JSON configuration.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: BusConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_delivery_count == 0 {
            return Err(ConfigError::Invalid(
                "max_delivery_count must be at least 1".into(),
            ));
        }
        if self.first_level_max_retries > MAX_FIRST_LEVEL_RETRIES {
            return Err(ConfigError::Invalid(format!(
                "first_level_max_retries must be at most {MAX_FIRST_LEVEL_RETRIES}"
            )));
        }
        if self.input_queue.is_empty() {
            return Err(ConfigError::Invalid("input_queue must not be empty".into()));
        }
        if self.failure_destination.is_empty() {
            return Err(ConfigError::Invalid(
                "failure_destination must not be empty".into(),
            ));
        }
        if self.failure_destination == self.input_queue {
            return Err(ConfigError::Invalid(
                "failure_destination must differ from input_queue".into(),
            ));
        }
        Ok(())
    }

    pub fn with_failure_destination(mut self, address: Address) -> Self {
        self.failure_destination = address;
        self
    }

    pub fn with_first_level_retries(mut self, max: u32) -> Self {
        self.first_level_max_retries = max;
        self
    }

    pub fn with_second_level_retries(mut self, max: u32) -> Self {
        self.second_level_max_retries = max;
        self
    }

    pub fn with_second_level_delay(mut self, delay: DelayPolicy) -> Self {
        self.second_level_delay = delay;
        self
    }

    pub fn with_max_delivery_count(mut self, max: u32) -> Self {
        self.max_delivery_count = max;
        self
    }

    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    pub fn with_permanent_failure_policy(mut self, policy: PermanentFailurePolicy) -> Self {
        self.permanent_failure_policy = policy;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            first_level_max_retries: self.first_level_max_retries,
            second_level_max_retries: self.second_level_max_retries,
            delay: self.second_level_delay.clone(),
        }
    }

    pub fn delivery_policy(&self) -> DeliveryPolicy {
        DeliveryPolicy {
            max_delivery_count: self.max_delivery_count,
            backoff_unit: self.backoff_unit,
            permanent_failure: self.permanent_failure_policy.clone(),
        }
    }
}

pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
