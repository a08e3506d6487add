use crate::message::Address;
use crate::transport::TransportError;

/// Error type for outbound delivery.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The destination does not exist; nothing was cached for it.
    #[error("destination not found: {0}")]
    DestinationNotFound(Address),
    /// Transient errors persisted for every allowed attempt.
    #[error("delivery to {destination} failed after {attempts} attempts: {last}")]
    Exhausted {
        destination: Address,
        attempts: u32,
        #[source]
        last: TransportError,
    },
    /// A non-transient transport error; not retried.
    #[error("delivery to {destination} failed: {source}")]
    Permanent {
        destination: Address,
        #[source]
        source: TransportError,
    },
}

impl DeliveryError {
    pub fn destination(&self) -> &Address {
        match self {
            DeliveryError::DestinationNotFound(destination)
            | DeliveryError::Exhausted { destination, .. }
            | DeliveryError::Permanent { destination, .. } => destination,
        }
    }
}
