//! Pusher-protocol framing.
//!
//! The broker speaks JSON text frames `{"event", "channel", "data"}`. For
//! application events `data` is usually itself a JSON-encoded string; some
//! brokers inline the object. Both decode to the same [`InboundFrame`].

use crate::error::{Result, SyncError};
use serde::Deserialize;
use serde_json::{json, Value};

/// A decoded frame from the broker.
#[derive(Clone, Debug, PartialEq)]
pub enum InboundFrame {
    /// Handshake complete; the connection is usable.
    ConnectionEstablished {
        socket_id: String,
        activity_timeout: Option<u64>,
    },
    /// The broker confirmed a channel subscription.
    SubscriptionSucceeded { channel: String },
    /// Broker-side error. Codes 4000-4099 mean "do not reconnect".
    Error { code: Option<u16>, message: String },
    Ping,
    Pong,
    /// An application event on a channel.
    Event {
        channel: String,
        event: String,
        data: Value,
    },
}

impl InboundFrame {
    /// Whether a broker error forbids reconnecting with the same settings.
    pub fn is_fatal(&self) -> bool {
        matches!(self, InboundFrame::Error { code: Some(code), .. } if (4000..4100).contains(code))
    }
}

#[derive(Deserialize)]
struct RawFrame {
    event: String,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct EstablishedData {
    socket_id: String,
    #[serde(default)]
    activity_timeout: Option<u64>,
}

#[derive(Deserialize)]
struct ErrorData {
    #[serde(default)]
    code: Option<u16>,
    #[serde(default)]
    message: String,
}

/// `data` may arrive as a JSON-encoded string.
fn unwrap_data(data: Value) -> Value {
    match data {
        Value::String(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        other => other,
    }
}

/// Decode one text frame.
pub fn decode(text: &str) -> Result<InboundFrame> {
    let raw: RawFrame =
        serde_json::from_str(text).map_err(|e| SyncError::Frame(format!("invalid frame: {}", e)))?;
    let data = unwrap_data(raw.data);

    match raw.event.as_str() {
        "pusher:connection_established" => {
            let established: EstablishedData = serde_json::from_value(data)
                .map_err(|e| SyncError::Frame(format!("invalid handshake: {}", e)))?;
            Ok(InboundFrame::ConnectionEstablished {
                socket_id: established.socket_id,
                activity_timeout: established.activity_timeout,
            })
        }
        "pusher:error" => {
            let error: ErrorData = serde_json::from_value(data).unwrap_or(ErrorData {
                code: None,
                message: "unknown broker error".to_string(),
            });
            Ok(InboundFrame::Error {
                code: error.code,
                message: error.message,
            })
        }
        "pusher:ping" => Ok(InboundFrame::Ping),
        "pusher:pong" => Ok(InboundFrame::Pong),
        "pusher_internal:subscription_succeeded" => {
            let channel = raw
                .channel
                .ok_or_else(|| SyncError::Frame("subscription ack without channel".into()))?;
            Ok(InboundFrame::SubscriptionSucceeded { channel })
        }
        _ => {
            let channel = raw
                .channel
                .ok_or_else(|| SyncError::Frame(format!("event {} without channel", raw.event)))?;
            Ok(InboundFrame::Event {
                channel,
                event: raw.event,
                data,
            })
        }
    }
}

pub fn subscribe(channel: &str) -> String {
    json!({ "event": "pusher:subscribe", "data": { "channel": channel } }).to_string()
}

pub fn unsubscribe(channel: &str) -> String {
    json!({ "event": "pusher:unsubscribe", "data": { "channel": channel } }).to_string()
}

pub fn ping() -> String {
    json!({ "event": "pusher:ping", "data": {} }).to_string()
}

pub fn pong() -> String {
    json!({ "event": "pusher:pong", "data": {} }).to_string()
}
