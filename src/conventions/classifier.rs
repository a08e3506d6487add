//! Convention-based message classification.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::error;

use super::cache::ConventionCache;
use super::descriptor::{Capability, MessageType};
use super::error::{Axis, ConventionError};
use crate::BoxError;

type PredicateFn = dyn Fn(&MessageType) -> Result<bool, BoxError> + Send + Sync;

/// A single convention predicate over a [`MessageType`].
#[derive(Clone)]
pub struct Convention(Arc<PredicateFn>);

impl Convention {
    /// Wrap an infallible predicate.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&MessageType) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(move |t| Ok(predicate(t))))
    }

    /// Wrap a predicate that can fail.
    pub fn fallible<F>(predicate: F) -> Self
    where
        F: Fn(&MessageType) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    fn evaluate(&self, message_type: &MessageType) -> Result<bool, BoxError> {
        (self.0)(message_type)
    }
}

impl fmt::Debug for Convention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Convention(..)")
    }
}

/// The single kind a classified type resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Command,
    Event,
    SystemMessage,
    Message,
    Unclassified,
}

/// Cached classification facts about one message type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Classification {
    pub is_message: bool,
    pub is_command: bool,
    pub is_event: bool,
    pub is_express: bool,
    pub is_system: bool,
}

impl Classification {
    pub fn kind(&self) -> MessageKind {
        if self.is_command {
            MessageKind::Command
        } else if self.is_event {
            MessageKind::Event
        } else if self.is_system {
            MessageKind::SystemMessage
        } else if self.is_message {
            MessageKind::Message
        } else {
            MessageKind::Unclassified
        }
    }
}

/// Message conventions with one decision cache per classification axis.
///
/// Create one instance at startup and share it (for example behind an
/// `Arc`) for the life of the process. Caches are never reset, so all
/// conventions are fixed at build time via [`ConventionsBuilder`].
pub struct Conventions {
    is_message: Convention,
    is_command: Convention,
    is_event: Convention,
    is_express: Convention,
    system: Vec<(String, Convention)>,
    time_to_be_received: Arc<dyn Fn(&MessageType) -> Duration + Send + Sync>,
    messages: ConventionCache<String>,
    commands: ConventionCache<String>,
    events: ConventionCache<String>,
    express: ConventionCache<String>,
    systems: ConventionCache<String>,
}

impl Default for Conventions {
    fn default() -> Self {
        ConventionsBuilder::default().build()
    }
}

impl Conventions {
    pub fn builder() -> ConventionsBuilder {
        ConventionsBuilder::default()
    }

    /// Whether the type is a message of any kind.
    ///
    /// Commands, events and system messages are read through their own
    /// cached axes, so each predicate runs at most once per type.
    pub fn is_message(&self, t: &MessageType) -> Result<bool, ConventionError> {
        if let Some(hit) = self.messages.get(t.name()) {
            return Ok(hit);
        }

        let derived = self.is_command(t)? || self.is_event(t)? || self.is_system_message(t)?;
        self.apply(&self.messages, Axis::Message, t, |t| {
            Ok(derived || self.is_message.evaluate(t)?)
        })
    }

    pub fn is_command(&self, t: &MessageType) -> Result<bool, ConventionError> {
        self.apply(&self.commands, Axis::Command, t, |t| self.is_command.evaluate(t))
    }

    pub fn is_event(&self, t: &MessageType) -> Result<bool, ConventionError> {
        self.apply(&self.events, Axis::Event, t, |t| self.is_event.evaluate(t))
    }

    /// Whether messages of this type may skip durable storage on send.
    pub fn is_express(&self, t: &MessageType) -> Result<bool, ConventionError> {
        self.apply(&self.express, Axis::Express, t, |t| self.is_express.evaluate(t))
    }

    pub fn is_system_message(&self, t: &MessageType) -> Result<bool, ConventionError> {
        self.apply(&self.systems, Axis::System, t, |t| self.in_system_list(t))
    }

    /// How long messages of this type stay valid in transit.
    pub fn time_to_be_received(&self, t: &MessageType) -> Duration {
        (self.time_to_be_received)(t)
    }

    /// Classify a type across every axis.
    ///
    /// Fails if a predicate fails, or if the type satisfies both the command
    /// and the event convention.
    pub fn classify(&self, t: &MessageType) -> Result<Classification, ConventionError> {
        let classification = Classification {
            is_message: self.is_message(t)?,
            is_command: self.is_command(t)?,
            is_event: self.is_event(t)?,
            is_express: self.is_express(t)?,
            is_system: self.is_system_message(t)?,
        };

        if classification.is_command && classification.is_event {
            let err = ConventionError::Ambiguous {
                types: vec![t.name().to_string()],
            };
            error!(message_type = %t, "{}", err);
            return Err(err);
        }

        Ok(classification)
    }

    /// Reject, at startup, every type that is both a command and an event.
    pub fn validate<'a, I>(&self, types: I) -> Result<(), ConventionError>
    where
        I: IntoIterator<Item = &'a MessageType>,
    {
        let mut ambiguous = Vec::new();
        for t in types {
            if self.is_command(t)? && self.is_event(t)? {
                ambiguous.push(t.name().to_string());
            }
        }

        if ambiguous.is_empty() {
            Ok(())
        } else {
            let err = ConventionError::Ambiguous { types: ambiguous };
            error!("{}", err);
            Err(err)
        }
    }

    fn in_system_list(&self, t: &MessageType) -> Result<bool, BoxError> {
        for (_, convention) in &self.system {
            if convention.evaluate(t)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn apply<F>(
        &self,
        cache: &ConventionCache<String>,
        axis: Axis,
        t: &MessageType,
        predicate: F,
    ) -> Result<bool, ConventionError>
    where
        F: FnOnce(&MessageType) -> Result<bool, BoxError>,
    {
        cache
            .apply_convention(t.name(), |_| predicate(t))
            .map_err(|source| {
                let err = ConventionError::Predicate {
                    axis,
                    type_name: t.name().to_string(),
                    source,
                };
                error!(axis = %axis, message_type = %t, error = ?err, "Failed to evaluate {} convention", axis);
                err
            })
    }
}

/// Builder for [`Conventions`].
pub struct ConventionsBuilder {
    is_message: Convention,
    is_command: Convention,
    is_event: Convention,
    is_express: Convention,
    system: Vec<(String, Convention)>,
    time_to_be_received: Arc<dyn Fn(&MessageType) -> Duration + Send + Sync>,
}

impl Default for ConventionsBuilder {
    fn default() -> Self {
        Self {
            is_message: Convention::new(|t| t.has(Capability::Message) && !t.is_marker()),
            is_command: Convention::new(|t| t.has(Capability::Command) && !t.is_marker()),
            is_event: Convention::new(|t| t.has(Capability::Event) && !t.is_marker()),
            is_express: Convention::new(MessageType::is_express_flagged),
            system: Vec::new(),
            time_to_be_received: Arc::new(|t: &MessageType| {
                t.declared_time_to_be_received().unwrap_or(Duration::MAX)
            }),
        }
    }
}

impl ConventionsBuilder {
    pub fn defining_messages_as(mut self, convention: Convention) -> Self {
        self.is_message = convention;
        self
    }

    pub fn defining_commands_as(mut self, convention: Convention) -> Self {
        self.is_command = convention;
        self
    }

    pub fn defining_events_as(mut self, convention: Convention) -> Self {
        self.is_event = convention;
        self
    }

    pub fn defining_express_messages_as(mut self, convention: Convention) -> Self {
        self.is_express = convention;
        self
    }

    pub fn defining_time_to_be_received_as<F>(mut self, f: F) -> Self
    where
        F: Fn(&MessageType) -> Duration + Send + Sync + 'static,
    {
        self.time_to_be_received = Arc::new(f);
        self
    }

    /// Append a named system-message convention.
    ///
    /// Conventions are evaluated in registration order. Registering a name
    /// that is already present is a no-op.
    pub fn with_system_messages(mut self, name: impl Into<String>, convention: Convention) -> Self {
        let name = name.into();
        if !self.system.iter().any(|(existing, _)| *existing == name) {
            self.system.push((name, convention));
        }
        self
    }

    pub fn build(self) -> Conventions {
        Conventions {
            is_message: self.is_message,
            is_command: self.is_command,
            is_event: self.is_event,
            is_express: self.is_express,
            system: self.system,
            time_to_be_received: self.time_to_be_received,
            messages: ConventionCache::new(),
            commands: ConventionCache::new(),
            events: ConventionCache::new(),
            express: ConventionCache::new(),
            systems: ConventionCache::new(),
        }
    }
}
