//! Request and reply payload envelopes.
//!
//! The header (see [`super::wire_format`]) carries routing information;
//! the payload carries the call itself. A request payload is a
//! [`RequestEnvelope`]: method name, argument list, and the timing
//! fields (`sent_at`, `ttl`) that let brokers and workers recognize and
//! drop stale work. A reply payload is just the result text, encoded as
//! a msgpack string; an empty reply payload means "no result".
//!
//! Envelopes are encoded struct-as-map so workers in any language can
//! address fields by name instead of position.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::codec::MsgPackCodec;
use crate::error::Result;

/// A single call argument.
///
/// Arguments are self-describing on the wire (msgpack), so the enum is
/// untagged: a worker sees plain strings, booleans and integers.
///
/// # Example
///
/// ```
/// use apc_client::protocol::Value;
///
/// let args: Vec<Value> = vec!["你好世界".into(), "tn".into(), true.into(), 0i64.into()];
/// assert_eq!(args[0].as_text(), Some("你好世界"));
/// assert_eq!(args[2].as_flag(), Some(true));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean flag argument.
    Flag(bool),
    /// Integer argument.
    Number(i64),
    /// Text argument.
    Text(String),
}

impl Value {
    /// The text content, if this is a text argument.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The boolean content, if this is a flag argument.
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Value::Flag(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer content, if this is a number argument.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Flag(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n)
    }
}

/// The body of a request frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Remote operation name.
    pub method: String,
    /// Ordered call arguments.
    pub args: Vec<Value>,
    /// Submission time, milliseconds since the unix epoch.
    pub sent_at: u64,
    /// Requested time budget in milliseconds. `sent_at + ttl` is the
    /// point past which the caller no longer wants an answer.
    pub ttl: u64,
}

impl RequestEnvelope {
    /// Build an envelope stamped with the current wall-clock time.
    pub fn new(method: &str, args: Vec<Value>, ttl: Duration) -> Self {
        Self {
            method: method.to_string(),
            args,
            sent_at: unix_millis(),
            ttl: ttl.as_millis() as u64,
        }
    }

    /// Encode to msgpack bytes (struct-as-map).
    pub fn encode(&self) -> Result<Vec<u8>> {
        MsgPackCodec::encode(self)
    }

    /// Decode from msgpack bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        MsgPackCodec::decode(bytes)
    }
}

/// Encode a reply result as a msgpack string payload.
pub fn encode_reply_payload(text: &str) -> Result<Vec<u8>> {
    MsgPackCodec::encode(&text)
}

/// Decode a reply payload into an optional result string.
///
/// An empty payload decodes to `None`; anything else must be a msgpack
/// string.
pub fn decode_reply_payload(bytes: &[u8]) -> Result<Option<String>> {
    if bytes.is_empty() {
        return Ok(None);
    }
    Ok(Some(MsgPackCodec::decode(bytes)?))
}

/// Milliseconds since the unix epoch.
fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
