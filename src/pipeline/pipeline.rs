//! Handler registry and invocation for inbound messages.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::context::{HandlerContext, OutgoingMessage};
use super::error::HandlerError;
use crate::conventions::{ConventionError, Conventions, Message, MessageType};
use crate::message::{Address, TransportMessage};
use crate::unit_of_work::{UnitOfWork, UnitsOfWork};

type Handler = Box<dyn Fn(&HandlerContext<'_>) -> Result<(), HandlerError> + Send + Sync>;

/// Routes inbound messages to handlers inside a unit-of-work bracket.
///
/// Handlers are keyed by logical message type name (the enclosed-types
/// header). Several handlers may be registered for one type; they run in
/// registration order and the first failure stops the rest.
pub struct Pipeline {
    local: Address,
    conventions: Arc<Conventions>,
    types: HashMap<String, MessageType>,
    handlers: HashMap<String, Vec<Handler>>,
    units: UnitsOfWork,
}

impl Pipeline {
    /// Create a pipeline for the endpoint receiving at `local`.
    pub fn new(local: Address, conventions: Arc<Conventions>) -> Self {
        Self {
            local,
            conventions,
            types: HashMap::new(),
            handlers: HashMap::new(),
            units: UnitsOfWork::new(),
        }
    }

    /// Register a handler for a message type.
    ///
    /// Returns `self` for chaining.
    pub fn handle<F>(mut self, message_type: MessageType, handler: F) -> Self
    where
        F: Fn(&HandlerContext<'_>) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let name = message_type.name().to_string();
        self.types.entry(name.clone()).or_insert(message_type);
        self.handlers
            .entry(name)
            .or_default()
            .push(Box::new(handler));
        self
    }

    /// Register a handler that receives the JSON body decoded as `T`.
    pub fn handle_typed<T, F>(self, handler: F) -> Self
    where
        T: Message + DeserializeOwned + 'static,
        F: Fn(&HandlerContext<'_>, T) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.handle(T::message_type(), move |ctx| {
            let input = ctx.input::<T>()?;
            handler(ctx, input)
        })
    }

    /// Register a unit of work; a fresh instance wraps every message.
    pub fn with_unit_of_work<F, U>(mut self, factory: F) -> Self
    where
        F: Fn() -> U + Send + Sync + 'static,
        U: UnitOfWork + 'static,
    {
        self.units.register(factory);
        self
    }

    /// Reject, before any message is processed, handled types that are
    /// both commands and events.
    pub fn validate(&self) -> Result<(), ConventionError> {
        self.conventions.validate(self.types.values())
    }

    pub fn local_address(&self) -> &Address {
        &self.local
    }

    pub fn conventions(&self) -> &Conventions {
        &self.conventions
    }

    /// Names of message types with registered handlers.
    pub fn message_types(&self) -> Vec<&str> {
        self.types.keys().map(String::as_str).collect()
    }

    /// Run every handler for the message inside a fresh unit-of-work scope.
    ///
    /// Returns the messages the handlers want sent. A failure to begin a
    /// unit of work is reported exactly like a handler failure.
    pub fn invoke(&self, message: &TransportMessage) -> Result<Vec<OutgoingMessage>, HandlerError> {
        let type_name = message
            .message_type()
            .ok_or_else(|| HandlerError::UnknownMessageType("<none>".to_string()))?;

        let message_type = self
            .types
            .get(type_name)
            .ok_or_else(|| HandlerError::UnknownMessageType(type_name.to_string()))?;

        let classification = self.conventions.classify(message_type)?;
        if !classification.is_message {
            return Err(HandlerError::NotAMessage(type_name.to_string()));
        }

        let handlers = self
            .handlers
            .get(type_name)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut scope = self.units.scope();
        scope.begin()?;

        let ctx = HandlerContext::new(message, message_type, &self.conventions, &self.local);
        let result = handlers.iter().try_for_each(|handler| handler(&ctx));

        match result {
            Ok(()) => {
                scope.end(None)?;
                let outgoing = ctx.into_outgoing();
                debug!(
                    message_id = %message.id,
                    message_type = type_name,
                    kind = ?classification.kind(),
                    handlers = handlers.len(),
                    outgoing = outgoing.len(),
                    "Handled message"
                );
                Ok(outgoing)
            }
            Err(err) => {
                warn!(message_id = %message.id, message_type = type_name, error = %err, "Handler failed");
                if let Err(uow_err) = scope.end(Some(&err as &(dyn std::error::Error + 'static))) {
                    warn!(message_id = %message.id, error = %uow_err, "Unit of work failed during rollback");
                }
                Err(err)
            }
        }
    }
}
