//! Push transport.
//!
//! A single [`Connector`] owns the process-wide push connection. The actual
//! wire work is done by a [`PushTransport`] implementation, which also owns
//! reconnect and backoff. Inbound frames are decoded into typed events at
//! this boundary and handed to an [`EventSink`] (the subscription registry).
//!
//! Transports:
//! - [`LoopbackTransport`]: in-memory, for tests and previews
//! - `WebSocketTransport` (feature `websocket`): Pusher protocol over tokio-tungstenite

mod connector;
pub mod frame;
mod loopback;
#[cfg(feature = "websocket")]
mod websocket;

pub use connector::{
    ChannelHandle, ConnectionState, Connector, ConnectorLink, EventSink, FrameAction,
    PushTransport, StateCallback, StateChange,
};
pub use loopback::{LoopbackCall, LoopbackTransport};
#[cfg(feature = "websocket")]
pub use websocket::WebSocketTransport;
