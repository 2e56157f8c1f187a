//! Messages received from the broker and the payload framing used on the wire.
//!
//! Every payload is a JSON object carrying an `event_name` field next to the
//! event's own parameters:
//!
//! ```json
//! { "event_name": "posts.v1.create", "title": "Hello", "content": "..." }
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

/// Key that names the event inside a payload.
pub const EVENT_NAME_KEY: &str = "event_name";

/// Anything that can hand its raw payload to the dispatcher.
pub trait Event: Send + Sync {
    /// The raw payload bytes, exactly as received.
    fn data(&self) -> &[u8];
}

/// A message delivered by a [`Connection`](crate::Connection) subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Subject the message was published to
    pub subject: String,
    /// Opaque payload bytes
    pub payload: Vec<u8>,
}

impl Message {
    /// Create a new message for the given subject.
    pub fn new(subject: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            subject: subject.into(),
            payload: payload.into(),
        }
    }

    /// Get the payload as a string (if valid UTF-8).
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

impl Event for Message {
    fn data(&self) -> &[u8] {
        &self.payload
    }
}

impl Event for Vec<u8> {
    fn data(&self) -> &[u8] {
        self
    }
}

/// Error returned by [`encode_event`].
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("event payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("event payload must serialize to a JSON object")]
    NotAnObject,

    #[error("event payload already contains an `event_name` field")]
    ReservedField,
}

/// Frame `payload` as an event named `name`.
///
/// The payload's fields are flattened next to `event_name`, which is the
/// shape [`EventBus`](crate::EventBus) expects on the consuming side.
///
/// ```
/// use event_relay::encode_event;
/// use serde_json::json;
///
/// let bytes = encode_event("posts.v1.create", &json!({ "title": "Hi" })).unwrap();
/// let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
/// assert_eq!(value, json!({ "event_name": "posts.v1.create", "title": "Hi" }));
/// ```
pub fn encode_event<T: Serialize>(name: &str, payload: &T) -> Result<Vec<u8>, EncodeError> {
    let fields = match serde_json::to_value(payload)? {
        Value::Object(fields) => fields,
        Value::Null => Map::new(),
        _ => return Err(EncodeError::NotAnObject),
    };
    if fields.contains_key(EVENT_NAME_KEY) {
        return Err(EncodeError::ReservedField);
    }

    let mut framed = Map::with_capacity(fields.len() + 1);
    framed.insert(EVENT_NAME_KEY.to_string(), Value::String(name.to_string()));
    framed.extend(fields);
    Ok(serde_json::to_vec(&Value::Object(framed))?)
}
