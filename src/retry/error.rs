use crate::outbound::DeliveryError;
use crate::transport::TransportError;

/// Error type for processing a received message.
///
/// Handler failures are not errors at this level; they drive retries. These
/// are failures of the machinery around the handlers.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// Ack or requeue on the input queue failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The message could not be parked at the failure destination. It was
    /// returned to the input queue instead.
    #[error("failed to move message {message_id} to the failure destination: {source}")]
    FailureRouting {
        message_id: String,
        #[source]
        source: DeliveryError,
    },
}
