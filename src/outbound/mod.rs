//! Send and publish through cached per-destination
//! senders, retrying transient transport errors with linear backoff.

mod delivery;
mod error;
mod sender_cache;
mod sleeper;

pub use delivery::{DeliveryPolicy, OutboundDelivery, PermanentFailurePolicy};
pub use error::DeliveryError;
pub use sender_cache::SenderCache;
pub use sleeper::{RecordingSleeper, Sleeper, ThreadSleeper};
