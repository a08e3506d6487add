//! Structural descriptors for message types.
//!
//! Instead of inspecting types at runtime, every message type describes
//! itself with a [`MessageType`]: a name (its identity for caching) plus the
//! capability set it implements.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// A capability a message type can declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Capability {
    Message,
    Command,
    Event,
}

/// Structural description of a message type.
///
/// Declaring `Command` or `Event` implies `Message`, the same way a command
/// contract extends the base message contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageType {
    name: String,
    capabilities: BTreeSet<Capability>,
    marker: bool,
    express: bool,
    time_to_be_received: Option<Duration>,
    attributes: BTreeSet<String>,
}

impl MessageType {
    /// A type with no capabilities.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capabilities: BTreeSet::new(),
            marker: false,
            express: false,
            time_to_be_received: None,
            attributes: BTreeSet::new(),
        }
    }

    /// A plain message type.
    pub fn message(name: impl Into<String>) -> Self {
        Self::new(name).with_capability(Capability::Message)
    }

    /// A command type.
    pub fn command(name: impl Into<String>) -> Self {
        Self::new(name).with_capability(Capability::Command)
    }

    /// An event type.
    pub fn event(name: impl Into<String>) -> Self {
        Self::new(name).with_capability(Capability::Event)
    }

    /// The root contract type for a capability itself (e.g. the bare
    /// "command" contract). Root markers are never classified as messages.
    pub fn marker(capability: Capability) -> Self {
        let name = match capability {
            Capability::Message => "Message",
            Capability::Command => "Command",
            Capability::Event => "Event",
        };
        let mut root = Self::new(name).with_capability(capability);
        root.marker = true;
        root
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        if capability != Capability::Message {
            self.capabilities.insert(Capability::Message);
        }
        self.capabilities.insert(capability);
        self
    }

    /// Flag the type as express (may skip durable storage on send).
    pub fn express(mut self) -> Self {
        self.express = true;
        self
    }

    pub fn with_time_to_be_received(mut self, ttbr: Duration) -> Self {
        self.time_to_be_received = Some(ttbr);
        self
    }

    /// Attach a free-form attribute for custom conventions to inspect.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attributes.insert(attribute.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn is_marker(&self) -> bool {
        self.marker
    }

    pub fn is_express_flagged(&self) -> bool {
        self.express
    }

    pub fn declared_time_to_be_received(&self) -> Option<Duration> {
        self.time_to_be_received
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.contains(attribute)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Implemented by Rust types that travel as messages.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct PlaceOrder { id: String }
///
/// impl Message for PlaceOrder {
///     fn message_type() -> MessageType {
///         MessageType::command("PlaceOrder")
///     }
/// }
/// ```
pub trait Message {
    fn message_type() -> MessageType;
}
