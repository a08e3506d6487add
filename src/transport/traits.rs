//! Transport collaborator traits.

use std::time::Duration;

use super::error::TransportError;
use crate::message::{Address, TransportMessage};

/// Sends messages to one destination (queue or topic).
pub trait MessageSender: Send + Sync {
    fn send(&self, message: &TransportMessage) -> Result<(), TransportError>;
}

/// Creates senders for destinations.
///
/// Creation may be expensive; callers cache the result per destination.
pub trait SenderFactory: Send + Sync {
    type Sender: MessageSender;

    fn create_sender(&self, destination: &Address) -> Result<Self::Sender, TransportError>;
}

/// The input queue an endpoint receives from.
///
/// Exclusivity (one worker per message at a time) is the transport's job.
pub trait InputQueue: Send + Sync {
    /// Address of this queue.
    fn address(&self) -> &Address;

    /// Receive the next message, blocking until one is available or timeout.
    fn try_receive(&self, timeout: Duration) -> Result<Option<TransportMessage>, TransportError>;

    /// Remove a received message for good.
    fn ack(&self, message_id: &str) -> Result<(), TransportError>;

    /// Put a received message back, visible again after `delay`.
    fn requeue(&self, message: TransportMessage, delay: Duration) -> Result<(), TransportError>;

    /// Stamp the durable retry count and requeue in one step.
    ///
    /// The message is consumed, so no caller can observe the header update
    /// without the requeue. Transports with native support should override
    /// this to make it atomic on the broker as well.
    fn requeue_with_retries(
        &self,
        mut message: TransportMessage,
        retries: u32,
        delay: Duration,
    ) -> Result<(), TransportError> {
        message.set_retries(retries);
        self.requeue(message, delay)
    }
}

impl<T: MessageSender + ?Sized> MessageSender for std::sync::Arc<T> {
    fn send(&self, message: &TransportMessage) -> Result<(), TransportError> {
        (**self).send(message)
    }
}

impl<T: SenderFactory + ?Sized> SenderFactory for std::sync::Arc<T> {
    type Sender = T::Sender;

    fn create_sender(&self, destination: &Address) -> Result<Self::Sender, TransportError> {
        (**self).create_sender(destination)
    }
}

impl<T: InputQueue + ?Sized> InputQueue for std::sync::Arc<T> {
    fn address(&self) -> &Address {
        (**self).address()
    }

    fn try_receive(&self, timeout: Duration) -> Result<Option<TransportMessage>, TransportError> {
        (**self).try_receive(timeout)
    }

    fn ack(&self, message_id: &str) -> Result<(), TransportError> {
        (**self).ack(message_id)
    }

    fn requeue(&self, message: TransportMessage, delay: Duration) -> Result<(), TransportError> {
        (**self).requeue(message, delay)
    }

    fn requeue_with_retries(
        &self,
        message: TransportMessage,
        retries: u32,
        delay: Duration,
    ) -> Result<(), TransportError> {
        (**self).requeue_with_retries(message, retries, delay)
    }
}
