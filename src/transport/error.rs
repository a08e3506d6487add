use crate::message::Address;
use crate::BoxError;

/// Error taxonomy reported by a transport.
///
/// The dispatch core never speaks the wire protocol; it only decides what
/// to do based on which of these it gets back.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The entity exists but is temporarily disabled.
    #[error("messaging entity disabled: {0}")]
    EntityDisabled(String),
    /// The broker is throttling the caller.
    #[error("server busy: {0}")]
    ServerBusy(String),
    /// The broker could not be reached for now.
    #[error("transport unavailable: {0}")]
    Unavailable(String),
    /// The destination does not exist.
    #[error("destination not found: {0}")]
    NotFound(Address),
    /// The acting principal may not use the entity.
    #[error("access denied to {entity} for principal {principal}")]
    AccessDenied { entity: String, principal: String },
    /// The broker refused the message.
    #[error("message rejected: {0}")]
    Rejected(String),
    #[error("transport error: {0}")]
    Other(#[source] BoxError),
}

impl TransportError {
    /// Whether the error is expected to resolve on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::EntityDisabled(_)
                | TransportError::ServerBusy(_)
                | TransportError::Unavailable(_)
        )
    }

    /// Short kind name for logs and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::EntityDisabled(_) => "EntityDisabled",
            TransportError::ServerBusy(_) => "ServerBusy",
            TransportError::Unavailable(_) => "Unavailable",
            TransportError::NotFound(_) => "NotFound",
            TransportError::AccessDenied { .. } => "AccessDenied",
            TransportError::Rejected(_) => "Rejected",
            TransportError::Other(_) => "Other",
        }
    }
}
