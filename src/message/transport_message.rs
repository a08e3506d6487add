//! The transport envelope handed between the dispatch core and a transport.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::address::Address;
use super::headers;

/// Why a message was put on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageIntent {
    #[default]
    Send,
    Publish,
    Reply,
}

impl fmt::Display for MessageIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageIntent::Send => write!(f, "Send"),
            MessageIntent::Publish => write!(f, "Publish"),
            MessageIntent::Reply => write!(f, "Reply"),
        }
    }
}

/// A message as seen by the transport.
///
/// The body is opaque to the dispatch core; headers carry the retry count
/// and, on the failure-destination copy, failure diagnostics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransportMessage {
    /// Unique identifier, stable across retries.
    pub id: String,
    /// Identifier of the conversation this message belongs to.
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Serialized payload.
    #[serde(default, with = "body_base64")]
    pub body: Option<Vec<u8>>,
    /// How long the message stays valid in transit. `Duration::MAX` = forever.
    #[serde(default = "forever", with = "ttbr_millis")]
    pub time_to_be_received: Duration,
    #[serde(default)]
    pub message_intent: MessageIntent,
    #[serde(default)]
    pub reply_to_address: Address,
    /// `false` for express messages that may skip durable storage.
    #[serde(default = "recoverable_default")]
    pub recoverable: bool,
}

fn forever() -> Duration {
    Duration::MAX
}

fn recoverable_default() -> bool {
    true
}

impl TransportMessage {
    /// Create a message with the given id and body.
    pub fn new(id: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            correlation_id: None,
            headers: BTreeMap::new(),
            body: Some(body),
            time_to_be_received: Duration::MAX,
            message_intent: MessageIntent::Send,
            reply_to_address: Address::default(),
            recoverable: true,
        }
    }

    /// Create a message with a freshly generated id.
    pub fn with_new_id(body: Vec<u8>) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), body)
    }

    /// Create a message whose body is JSON text for a logical message type.
    pub fn json<T: Serialize>(
        id: impl Into<String>,
        message_type: &str,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(payload)?;
        Ok(Self::new(id, body).with_header(headers::ENCLOSED_MESSAGE_TYPES, message_type))
    }

    /// Create a message with a bitcode-serialized body.
    pub fn encode<T: Serialize>(
        id: impl Into<String>,
        message_type: &str,
        payload: &T,
    ) -> Result<Self, bitcode::Error> {
        let body = bitcode::serialize(payload)?;
        Ok(Self::new(id, body).with_header(headers::ENCLOSED_MESSAGE_TYPES, message_type))
    }

    /// Decode the body from bitcode binary format.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, bitcode::Error> {
        bitcode::deserialize(self.body.as_deref().unwrap_or_default())
    }

    /// Add a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_intent(mut self, intent: MessageIntent) -> Self {
        self.message_intent = intent;
        self
    }

    pub fn with_reply_to(mut self, address: Address) -> Self {
        self.reply_to_address = address;
        self
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// Second-level retries already performed (0 if the header is absent).
    pub fn retries(&self) -> u32 {
        headers::parse_retries(self.header(headers::RETRIES))
    }

    /// Overwrite the durable retry count.
    pub fn set_retries(&mut self, retries: u32) {
        self.headers
            .insert(headers::RETRIES.to_string(), retries.to_string());
    }

    /// The first logical message type named in the enclosed-types header.
    pub fn message_type(&self) -> Option<&str> {
        self.header(headers::ENCLOSED_MESSAGE_TYPES)
            .and_then(|v| v.split(';').map(str::trim).find(|t| !t.is_empty()))
    }

    /// Get the body as a string (if present and valid UTF-8).
    pub fn body_str(&self) -> Option<&str> {
        self.body.as_deref().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Whether the message has a finite time-to-be-received.
    pub fn expires(&self) -> bool {
        self.time_to_be_received < Duration::MAX
    }

    /// Render as JSON with a base64 body, for operator inspection.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

mod body_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match body {
            Some(bytes) => s.serialize_some(&STANDARD.encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(d)?;
        encoded
            .map(|e| STANDARD.decode(e).map_err(serde::de::Error::custom))
            .transpose()
    }
}

mod ttbr_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    // `null` means "never expires".
    pub fn serialize<S: Serializer>(ttbr: &Duration, s: S) -> Result<S::Ok, S::Error> {
        if *ttbr == Duration::MAX {
            s.serialize_none()
        } else {
            s.serialize_some(&(ttbr.as_millis() as u64))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis: Option<u64> = Option::deserialize(d)?;
        Ok(millis.map(Duration::from_millis).unwrap_or(Duration::MAX))
    }
}
