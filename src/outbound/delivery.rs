//! Outbound send/publish with retry and backoff on transient errors.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::error::DeliveryError;
use super::sender_cache::SenderCache;
use super::sleeper::{Sleeper, ThreadSleeper};
use crate::config::duration_ms;
use crate::message::{headers, Address, MessageIntent, TransportMessage};
use crate::transport::{MessageSender, SenderFactory, TransportError};

/// What to do with a non-transient delivery failure.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PermanentFailurePolicy {
    /// Return the error to the caller.
    #[default]
    Surface,
    /// Forward the message to a dead-letter address and report success.
    DeadLetter { address: Address },
    /// Log the error and report success.
    LogAndSwallow,
}

/// Retry settings for outbound delivery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryPolicy {
    /// Total attempts allowed per call, including the first.
    pub max_delivery_count: u32,
    /// Pause after failed attempt `n` is `n * backoff_unit`.
    #[serde(with = "duration_ms")]
    pub backoff_unit: Duration,
    #[serde(default)]
    pub permanent_failure: PermanentFailurePolicy,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            max_delivery_count: 5,
            backoff_unit: Duration::from_secs(10),
            permanent_failure: PermanentFailurePolicy::Surface,
        }
    }
}

/// State of one outbound call's retry loop.
#[derive(Debug)]
struct DeliveryAttempt<'a> {
    destination: &'a Address,
    attempt_number: u32,
    last_error: Option<TransportError>,
}

/// Wraps a transport's senders with bounded retry.
///
/// ## Example
///
/// ```ignore
/// let delivery = OutboundDelivery::new(transport, Address::new("sales"), config.delivery_policy());
/// delivery.send(&message, &Address::new("billing"))?;
/// delivery.publish(&event)?; // goes to "sales.events"
/// ```
pub struct OutboundDelivery<F: SenderFactory, S: Sleeper = ThreadSleeper> {
    senders: SenderCache<F>,
    local: Address,
    policy: DeliveryPolicy,
    sleeper: S,
}

impl<F: SenderFactory> OutboundDelivery<F, ThreadSleeper> {
    pub fn new(factory: F, local: Address, policy: DeliveryPolicy) -> Self {
        Self::with_sleeper(factory, local, policy, ThreadSleeper)
    }
}

impl<F: SenderFactory, S: Sleeper> OutboundDelivery<F, S> {
    pub fn with_sleeper(factory: F, local: Address, policy: DeliveryPolicy, sleeper: S) -> Self {
        Self {
            senders: SenderCache::new(factory),
            local,
            policy,
            sleeper,
        }
    }

    pub fn policy(&self) -> &DeliveryPolicy {
        &self.policy
    }

    pub fn senders(&self) -> &SenderCache<F> {
        &self.senders
    }

    /// Topic used by [`publish`](Self::publish): `<local queue>.events`.
    pub fn events_topic(&self) -> Address {
        self.local.sub_scope("events")
    }

    /// Send point-to-point, keeping the message's intent (Send or Reply).
    pub fn send(
        &self,
        message: &TransportMessage,
        destination: &Address,
    ) -> Result<(), DeliveryError> {
        let envelope = self.envelope(message, message.message_intent);
        self.deliver(&envelope, destination, &self.policy.permanent_failure)
    }

    /// Publish to this endpoint's events topic.
    pub fn publish(&self, message: &TransportMessage) -> Result<(), DeliveryError> {
        let topic = self.events_topic();
        self.publish_to(message, &topic)
    }

    /// Publish to an explicit topic.
    pub fn publish_to(
        &self,
        message: &TransportMessage,
        topic: &Address,
    ) -> Result<(), DeliveryError> {
        let envelope = self.envelope(message, MessageIntent::Publish);
        self.deliver(&envelope, topic, &self.policy.permanent_failure)
    }

    /// Send without applying the permanent-failure policy.
    ///
    /// Used for failure-destination routing, where swallowing an error would
    /// silently lose the message.
    pub fn send_strict(
        &self,
        message: &TransportMessage,
        destination: &Address,
    ) -> Result<(), DeliveryError> {
        let envelope = self.envelope(message, message.message_intent);
        self.deliver(&envelope, destination, &PermanentFailurePolicy::Surface)
    }

    fn envelope(&self, message: &TransportMessage, intent: MessageIntent) -> TransportMessage {
        let mut envelope = message.clone();
        envelope.message_intent = intent;
        if envelope
            .correlation_id
            .as_deref()
            .is_some_and(|c| c.trim().is_empty())
        {
            envelope.correlation_id = None;
        }
        envelope
            .headers
            .insert(headers::MESSAGE_INTENT.to_string(), intent.to_string());
        if envelope.expires() {
            envelope.headers.insert(
                headers::TIME_TO_BE_RECEIVED.to_string(),
                envelope.time_to_be_received.as_millis().to_string(),
            );
        }
        if !envelope.reply_to_address.is_empty() {
            envelope.headers.insert(
                headers::REPLY_TO_ADDRESS.to_string(),
                envelope.reply_to_address.to_string(),
            );
        }
        envelope
    }

    fn deliver(
        &self,
        message: &TransportMessage,
        destination: &Address,
        on_permanent: &PermanentFailurePolicy,
    ) -> Result<(), DeliveryError> {
        let mut attempt = DeliveryAttempt {
            destination,
            attempt_number: 0,
            last_error: None,
        };

        loop {
            attempt.attempt_number += 1;

            let result = self
                .senders
                .get_or_create(destination)
                .and_then(|sender| sender.send(message));

            let err = match result {
                Ok(()) => {
                    debug!(
                        message_id = %message.id,
                        destination = %destination,
                        attempt = attempt.attempt_number,
                        "Delivered message"
                    );
                    return Ok(());
                }
                Err(err) => err,
            };

            if !err.is_transient() {
                return self.permanent_failure(message, destination, err, on_permanent);
            }

            if attempt.attempt_number >= self.policy.max_delivery_count {
                error!(
                    message_id = %message.id,
                    destination = %attempt.destination,
                    attempts = attempt.attempt_number,
                    error = %err,
                    "Giving up on delivery"
                );
                return Err(DeliveryError::Exhausted {
                    destination: destination.clone(),
                    attempts: attempt.attempt_number,
                    last: err,
                });
            }

            let pause = self.policy.backoff_unit.saturating_mul(attempt.attempt_number);
            warn!(
                message_id = %message.id,
                destination = %attempt.destination,
                attempt = attempt.attempt_number,
                backoff_ms = pause.as_millis() as u64,
                error = %err,
                previous_error = ?attempt.last_error.as_ref().map(ToString::to_string),
                "Transient delivery failure, backing off"
            );
            attempt.last_error = Some(err);
            self.sleeper.sleep(pause);
        }
    }

    fn permanent_failure(
        &self,
        message: &TransportMessage,
        destination: &Address,
        err: TransportError,
        policy: &PermanentFailurePolicy,
    ) -> Result<(), DeliveryError> {
        if let TransportError::AccessDenied { entity, principal } = &err {
            error!(
                entity = %entity,
                principal = %principal,
                "Access denied: principal {} may not send to {}", principal, entity
            );
        }

        let failure = match err {
            TransportError::NotFound(address) => DeliveryError::DestinationNotFound(address),
            other => DeliveryError::Permanent {
                destination: destination.clone(),
                source: other,
            },
        };

        match policy {
            PermanentFailurePolicy::Surface => Err(failure),
            PermanentFailurePolicy::LogAndSwallow => {
                error!(message_id = %message.id, error = %failure, "Dropping undeliverable message");
                Ok(())
            }
            PermanentFailurePolicy::DeadLetter { address } => {
                warn!(
                    message_id = %message.id,
                    dead_letter = %address,
                    error = %failure,
                    "Dead-lettering undeliverable message"
                );
                self.deliver(message, address, &PermanentFailurePolicy::Surface)
            }
        }
    }
}
