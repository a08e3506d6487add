//! Context passed to message handlers.
//!
//! Carries the inbound message and collects outgoing messages. Outgoing
//! messages are only handed to the transport after every handler and unit
//! of work has succeeded.

use std::cell::RefCell;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::HandlerError;
use crate::conventions::{Conventions, Message, MessageType};
use crate::message::{headers, Address, MessageIntent, TransportMessage};

/// Where an outgoing message is going.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Send(Address),
    /// `None` targets the endpoint's default events topic.
    Publish(Option<Address>),
    Reply(Address),
}

/// A message produced while handling another one.
#[derive(Clone, Debug, PartialEq)]
pub struct OutgoingMessage {
    pub route: Route,
    pub message: TransportMessage,
}

/// The context passed to every handler.
///
/// ## Example
///
/// ```ignore
/// fn handle(ctx: &HandlerContext) -> Result<(), HandlerError> {
///     let order = ctx.input::<PlaceOrder>()?;
///     ctx.publish(&OrderPlaced { id: order.id })?;
///     Ok(())
/// }
/// ```
pub struct HandlerContext<'a> {
    message: &'a TransportMessage,
    message_type: &'a MessageType,
    conventions: &'a Conventions,
    local: &'a Address,
    outgoing: RefCell<Vec<OutgoingMessage>>,
}

impl<'a> HandlerContext<'a> {
    pub(crate) fn new(
        message: &'a TransportMessage,
        message_type: &'a MessageType,
        conventions: &'a Conventions,
        local: &'a Address,
    ) -> Self {
        Self {
            message,
            message_type,
            conventions,
            local,
            outgoing: RefCell::new(Vec::new()),
        }
    }

    /// Deserialize a JSON body into a typed struct.
    pub fn input<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        let body = self.message.body.as_deref().unwrap_or_default();
        Ok(serde_json::from_slice(body)?)
    }

    /// Deserialize a bitcode body into a typed struct.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        Ok(self.message.decode()?)
    }

    pub fn message(&self) -> &TransportMessage {
        self.message
    }

    pub fn message_type(&self) -> &MessageType {
        self.message_type
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.message.header(key)
    }

    /// Second-level retries this message has been through.
    pub fn retries(&self) -> u32 {
        self.message.retries()
    }

    /// Send a command (or plain message) point-to-point.
    pub fn send<T: Message + Serialize>(
        &self,
        destination: &Address,
        payload: &T,
    ) -> Result<(), HandlerError> {
        let message_type = T::message_type();
        if self.conventions.is_event(&message_type)? {
            return Err(HandlerError::InvalidRoute {
                verb: "send",
                message_type: message_type.name().to_string(),
                reason: "events must be published",
            });
        }
        let message = self.outgoing_message(&message_type, payload, MessageIntent::Send)?;
        self.push(Route::Send(destination.clone()), message);
        Ok(())
    }

    /// Publish an event to the endpoint's events topic.
    pub fn publish<T: Message + Serialize>(&self, payload: &T) -> Result<(), HandlerError> {
        let message_type = T::message_type();
        if !self.conventions.is_event(&message_type)? {
            return Err(HandlerError::InvalidRoute {
                verb: "publish",
                message_type: message_type.name().to_string(),
                reason: "only events can be published",
            });
        }
        let message = self.outgoing_message(&message_type, payload, MessageIntent::Publish)?;
        self.push(Route::Publish(None), message);
        Ok(())
    }

    /// Reply to the sender of the message being handled.
    pub fn reply<T: Message + Serialize>(&self, payload: &T) -> Result<(), HandlerError> {
        let message_type = T::message_type();
        let return_address = self.message.reply_to_address.clone();
        if return_address.is_empty() {
            return Err(HandlerError::InvalidRoute {
                verb: "reply",
                message_type: message_type.name().to_string(),
                reason: "the incoming message has no reply-to address",
            });
        }
        let message = self.outgoing_message(&message_type, payload, MessageIntent::Reply)?;
        self.push(Route::Reply(return_address), message);
        Ok(())
    }

    pub(crate) fn into_outgoing(self) -> Vec<OutgoingMessage> {
        self.outgoing.into_inner()
    }

    fn push(&self, route: Route, message: TransportMessage) {
        self.outgoing
            .borrow_mut()
            .push(OutgoingMessage { route, message });
    }

    fn outgoing_message<T: Serialize>(
        &self,
        message_type: &MessageType,
        payload: &T,
        intent: MessageIntent,
    ) -> Result<TransportMessage, HandlerError> {
        if !self.conventions.is_message(message_type)? {
            return Err(HandlerError::NotAMessage(message_type.name().to_string()));
        }

        let body = serde_json::to_vec(payload).map_err(HandlerError::other)?;
        let mut message = TransportMessage::with_new_id(body)
            .with_header(headers::ENCLOSED_MESSAGE_TYPES, message_type.name())
            .with_intent(intent)
            .with_reply_to(self.local.clone())
            .with_correlation_id(
                self.message
                    .correlation_id
                    .clone()
                    .unwrap_or_else(|| self.message.id.clone()),
            );
        message.time_to_be_received = self.conventions.time_to_be_received(message_type);
        message.recoverable = !self.conventions.is_express(message_type)?;
        Ok(message)
    }
}
