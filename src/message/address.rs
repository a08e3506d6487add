//! Queue / topic addresses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A logical endpoint address: a queue name, optionally qualified by machine.
///
/// Renders as `queue` or `queue@machine`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Address {
    queue: String,
    machine: Option<String>,
}

impl Address {
    /// Create a local address for the given queue.
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            machine: None,
        }
    }

    /// Create an address qualified by machine name.
    pub fn on(queue: impl Into<String>, machine: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            machine: Some(machine.into()),
        }
    }

    /// Parse `queue` or `queue@machine`.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let s = s.trim();
        let (queue, machine) = match s.split_once('@') {
            Some((q, m)) => (q, Some(m)),
            None => (s, None),
        };
        if queue.is_empty() {
            return Err(AddressError::EmptyQueue(s.to_string()));
        }
        Ok(Self {
            queue: queue.to_string(),
            machine: machine.filter(|m| !m.is_empty()).map(str::to_string),
        })
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn machine(&self) -> Option<&str> {
        self.machine.as_deref()
    }

    /// Derive a sibling address by appending a suffix to the queue name.
    ///
    /// Used for the default publish topic (`<queue>.events`).
    pub fn sub_scope(&self, suffix: &str) -> Self {
        Self {
            queue: format!("{}.{}", self.queue, suffix),
            machine: self.machine.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.machine {
            Some(machine) => write!(f, "{}@{}", self.queue, machine),
            None => write!(f, "{}", self.queue),
        }
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl From<&str> for Address {
    /// Infallible conversion for literals; an unparseable string becomes a
    /// bare queue name.
    fn from(s: &str) -> Self {
        Address::parse(s).unwrap_or_else(|_| Address::new(s))
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Address::parse(&value)
    }
}

/// Error parsing an [`Address`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address has an empty queue name: {0:?}")]
    EmptyQueue(String),
}
