//! Error types for message handlers.

use crate::conventions::ConventionError;
use crate::outbound::DeliveryError;
use crate::unit_of_work::UnitOfWorkError;
use crate::BoxError;

/// Error type for handler invocation.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// No handler registered for this message type (or no type header).
    #[error("no handlers for message type: {0}")]
    UnknownMessageType(String),
    /// The conventions do not classify the type as a message.
    #[error("{0} is not a message type")]
    NotAMessage(String),
    /// Classification failed.
    #[error(transparent)]
    Convention(#[from] ConventionError),
    /// Body decode / deserialization failed.
    #[error("decode failed: {0}")]
    DecodeFailed(String),
    /// Outgoing message used the wrong verb for its kind (e.g. sending an event).
    #[error("cannot {verb} {message_type}: {reason}")]
    InvalidRoute {
        verb: &'static str,
        message_type: String,
        reason: &'static str,
    },
    /// Business logic rejected the message.
    #[error("rejected: {0}")]
    Rejected(String),
    /// Begin or commit of a unit of work failed.
    #[error(transparent)]
    UnitOfWork(#[from] UnitOfWorkError),
    /// Outgoing messages could not be delivered after handling succeeded.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    #[error("handler error: {0}")]
    Other(#[source] BoxError),
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::DecodeFailed(err.to_string())
    }
}

impl From<bitcode::Error> for HandlerError {
    fn from(err: bitcode::Error) -> Self {
        HandlerError::DecodeFailed(err.to_string())
    }
}

impl HandlerError {
    /// Wrap any error raised by application code.
    pub fn other(err: impl Into<BoxError>) -> Self {
        HandlerError::Other(err.into())
    }

    /// Short kind name recorded in failure diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerError::UnknownMessageType(_) => "UnknownMessageType",
            HandlerError::NotAMessage(_) => "NotAMessage",
            HandlerError::Convention(_) => "Convention",
            HandlerError::DecodeFailed(_) => "DecodeFailed",
            HandlerError::InvalidRoute { .. } => "InvalidRoute",
            HandlerError::Rejected(_) => "Rejected",
            HandlerError::UnitOfWork(_) => "UnitOfWork",
            HandlerError::Delivery(_) => "Delivery",
            HandlerError::Other(_) => "Other",
        }
    }
}
