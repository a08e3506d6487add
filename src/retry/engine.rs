//! Retry escalation decisions.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{info, warn};

use super::policy::RetryPolicy;
use crate::message::TransportMessage;

/// What to do after a failed processing attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-invoke the handlers right away. `failures` counts failures in
    /// the current delivery so far.
    RetryImmediately { failures: u32 },
    /// Requeue with the durable retry count set to `retries`.
    Defer { retries: u32, delay: Duration },
    /// Park the message at the failure destination. `retries` is the
    /// durable count the message arrived with.
    Fail { retries: u32 },
}

/// Tracks retry state and decides how failures escalate.
///
/// Two counters are kept per message id:
/// - failures within the current delivery (first-level, in memory only)
/// - the last durable retry count seen on receipt, to detect transports
///   that redeliver without the header having advanced
///
/// Both are dropped when a message succeeds or is parked. A deferred
/// message may be picked up by another process instead, so its observed
/// entry expires once twice its second-level delay (at least
/// [`MIN_OBSERVED_RETENTION`]) has passed without it coming back here.
/// Expired entries are pruned on every receipt, which bounds the map by
/// the deferrals still in flight.
pub struct RetryEngine {
    policy: RetryPolicy,
    first_level: DashMap<String, u32>,
    observed: DashMap<String, Observed>,
}

/// Shortest time a deferred message's observed count is kept.
pub const MIN_OBSERVED_RETENTION: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug)]
struct Observed {
    retries: u32,
    /// Set when the message is deferred. `None` while it is being handled here.
    expires_at: Option<Instant>,
}

impl RetryEngine {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            first_level: DashMap::new(),
            observed: DashMap::new(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Record a freshly received message, returning its effective retry count.
    ///
    /// If this process already saw the same id with the same (or a higher)
    /// header count, the transport redelivered it without recording a retry;
    /// the header is advanced past the last seen value so the count keeps
    /// moving toward the limit.
    pub fn observe(&self, message: &mut TransportMessage) -> u32 {
        self.prune_expired(Instant::now());
        let header = message.retries();

        let effective = match self.observed.get(&message.id).map(|seen| seen.retries) {
            Some(seen) if header <= seen => {
                let bumped = seen + 1;
                warn!(
                    message_id = %message.id,
                    header_retries = header,
                    last_seen = seen,
                    retries = bumped,
                    "Message redelivered without retry increment, advancing retry count"
                );
                message.set_retries(bumped);
                self.first_level.remove(&message.id);
                bumped
            }
            _ => header,
        };

        if effective > 0 {
            info!(
                message_id = %message.id,
                retries = effective,
                "This is second level retry number {}", effective
            );
        }

        self.observed.insert(
            message.id.clone(),
            Observed {
                retries: effective,
                expires_at: None,
            },
        );
        effective
    }

    /// Decide what happens after a failed attempt.
    pub fn record_failure(&self, message: &TransportMessage) -> RetryDecision {
        let failures = {
            let mut count = self.first_level.entry(message.id.clone()).or_insert(0);
            *count += 1;
            *count
        };

        if failures <= self.policy.first_level_max_retries {
            return RetryDecision::RetryImmediately { failures };
        }

        // First-level retries exhausted: hand off to second level.
        self.first_level.remove(&message.id);

        let retries = message.retries();
        let next = retries.saturating_add(1);
        if next > self.policy.second_level_max_retries {
            self.observed.remove(&message.id);
            RetryDecision::Fail { retries }
        } else {
            let delay = self.policy.delay.delay_for(next);
            if let Some(mut seen) = self.observed.get_mut(&message.id) {
                let retention = delay.saturating_mul(2).max(MIN_OBSERVED_RETENTION);
                // An unrepresentable deadline means the entry never expires.
                seen.expires_at = Instant::now().checked_add(retention);
            }
            RetryDecision::Defer {
                retries: next,
                delay,
            }
        }
    }

    /// Drop observed counts of deferred messages whose retention passed
    /// before `now`. Returns how many were dropped.
    pub fn prune_expired(&self, now: Instant) -> usize {
        let before = self.observed.len();
        self.observed
            .retain(|_, seen| seen.expires_at.map_or(true, |at| at > now));
        before.saturating_sub(self.observed.len())
    }

    /// Forget all state for a message that was processed successfully.
    pub fn record_success(&self, message_id: &str) {
        self.first_level.remove(message_id);
        self.observed.remove(message_id);
    }

    /// First-level failures recorded for the message's current delivery.
    pub fn first_level_failures(&self, message_id: &str) -> u32 {
        self.first_level.get(message_id).map_or(0, |c| *c)
    }

    /// Message ids with retry state held in memory.
    pub fn tracked(&self) -> usize {
        self.observed.len().max(self.first_level.len())
    }
}
