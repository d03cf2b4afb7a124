//! The process-wide push connection.

use crate::error::{Result, SyncError};
use crate::events::PushEvent;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use super::frame::{self, InboundFrame};

/// Connection state as reported by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

/// A state transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateChange {
    pub previous: ConnectionState,
    pub current: ConnectionState,
    /// Connected again after the connection had been up and was lost,
    /// however many states the transport passed through in between.
    pub recovered: bool,
}

impl StateChange {
    /// Back online after an outage: events in between are lost and cached
    /// data must be refetched.
    pub fn is_recovery(&self) -> bool {
        self.recovered
    }
}

/// Receives decoded events for joined channels.
pub trait EventSink: Send + Sync {
    fn on_event(&self, channel: &str, event: PushEvent);
}

/// The underlying push transport.
///
/// Implementations own reconnect/backoff and report back through the
/// [`ConnectorLink`] they are given on `connect`. `subscribe` may be called
/// before the connection is up; the transport is expected to join once it
/// is, and to rejoin its channels after a reconnect.
pub trait PushTransport: Send + Sync {
    fn connect(&self, link: ConnectorLink) -> Result<()>;
    fn subscribe(&self, channel: &str) -> Result<()>;
    fn unsubscribe(&self, channel: &str) -> Result<()>;
    fn disconnect(&self);
}

/// Callback invoked on every state transition.
pub type StateCallback = Arc<dyn Fn(StateChange) + Send + Sync>;

/// Max buffered transitions per state watcher.
const STATE_WATCH_BUFFER: usize = 64;

struct ConnectorShared {
    transport: Box<dyn PushTransport>,
    state: RwLock<ConnectionState>,
    /// Set when leaving `Connected`, consumed by the next `Connected`.
    outage: AtomicBool,
    channels: Mutex<BTreeSet<String>>,
    sink: RwLock<Option<Weak<dyn EventSink>>>,
    state_callback: RwLock<Option<StateCallback>>,
    state_watchers: Mutex<Vec<Sender<StateChange>>>,
}

impl ConnectorShared {
    fn set_state(&self, current: ConnectionState) {
        let (previous, recovered) = {
            let mut state = self.state.write();
            let previous = std::mem::replace(&mut *state, current);
            if previous == current {
                return;
            }
            if previous == ConnectionState::Connected {
                self.outage.store(true, Ordering::SeqCst);
            }
            let recovered =
                current == ConnectionState::Connected && self.outage.swap(false, Ordering::SeqCst);
            (previous, recovered)
        };

        let change = StateChange {
            previous,
            current,
            recovered,
        };
        match current {
            ConnectionState::Connected => tracing::info!(?previous, recovered, "Push connection up"),
            ConnectionState::Error => tracing::warn!(?previous, "Push connection error"),
            _ => tracing::debug!(?previous, ?current, "Push connection state changed"),
        }

        self.state_watchers
            .lock()
            .retain(|watcher| watcher.try_send(change).is_ok());

        let callback = self.state_callback.read().clone();
        if let Some(callback) = callback {
            callback(change);
        }
    }

    fn deliver(&self, channel: &str, event_name: &str, data: serde_json::Value) {
        if !self.channels.lock().contains(channel) {
            tracing::debug!(channel, event = event_name, "Event for a channel we left, dropped");
            return;
        }

        let event = match PushEvent::decode(event_name, data) {
            Ok(event) => event,
            Err(SyncError::UnknownEvent(name)) => {
                tracing::debug!(channel, event = %name, "Unhandled event");
                return;
            }
            Err(e) => {
                tracing::warn!(channel, error = %e, "Dropping undecodable event");
                return;
            }
        };

        let sink = self.sink.read().as_ref().and_then(Weak::upgrade);
        match sink {
            Some(sink) => sink.on_event(channel, event),
            None => tracing::debug!(channel, "No event sink attached"),
        }
    }
}

/// Handle given to the transport for reporting state and inbound events.
#[derive(Clone)]
pub struct ConnectorLink {
    shared: Weak<ConnectorShared>,
}

impl ConnectorLink {
    pub fn report_state(&self, state: ConnectionState) {
        if let Some(shared) = self.shared.upgrade() {
            shared.set_state(state);
        }
    }

    /// Deliver an application event.
    pub fn deliver(&self, channel: &str, event: &str, data: serde_json::Value) {
        if let Some(shared) = self.shared.upgrade() {
            shared.deliver(channel, event, data);
        }
    }

    /// Handle one raw broker frame and tell the transport what to do next.
    pub fn deliver_frame(&self, text: &str) -> Result<FrameAction> {
        let inbound = frame::decode(text)?;
        let fatal = inbound.is_fatal();
        match inbound {
            InboundFrame::ConnectionEstablished { socket_id, .. } => {
                tracing::debug!(%socket_id, "Broker handshake complete");
                self.report_state(ConnectionState::Connected);
                Ok(FrameAction::Established)
            }
            InboundFrame::Event { channel, event, data } => {
                self.deliver(&channel, &event, data);
                Ok(FrameAction::None)
            }
            InboundFrame::Ping => Ok(FrameAction::Reply(frame::pong())),
            InboundFrame::Error { code, message } => {
                tracing::warn!(?code, %message, "Broker error");
                self.report_state(ConnectionState::Error);
                Ok(if fatal { FrameAction::Fatal } else { FrameAction::None })
            }
            InboundFrame::SubscriptionSucceeded { channel } => {
                tracing::trace!(%channel, "Subscription acknowledged");
                Ok(FrameAction::None)
            }
            InboundFrame::Pong => Ok(FrameAction::None),
        }
    }
}

/// What a transport should do after a frame was handled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameAction {
    None,
    /// Send this frame back.
    Reply(String),
    /// Handshake done: (re)join every channel.
    Established,
    /// Broker refused us for good; stop reconnecting.
    Fatal,
}

/// Named channel on the connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelHandle {
    name: String,
}

impl ChannelHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// One persistent push connection shared by the whole process.
///
/// Cheap to clone; clones share the connection.
#[derive(Clone)]
pub struct Connector {
    shared: Arc<ConnectorShared>,
}

impl Connector {
    pub fn new(transport: Box<dyn PushTransport>) -> Self {
        Self {
            shared: Arc::new(ConnectorShared {
                transport,
                state: RwLock::new(ConnectionState::Disconnected),
                outage: AtomicBool::new(false),
                channels: Mutex::new(BTreeSet::new()),
                sink: RwLock::new(None),
                state_callback: RwLock::new(None),
                state_watchers: Mutex::new(Vec::new()),
            }),
        }
    }

    fn link(&self) -> ConnectorLink {
        ConnectorLink {
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Attach the receiver of decoded events. Held weakly.
    pub fn set_sink(&self, sink: Weak<dyn EventSink>) {
        *self.shared.sink.write() = Some(sink);
    }

    /// Install the state callback, replacing any previous one.
    pub fn on_state_change(&self, callback: StateCallback) {
        *self.shared.state_callback.write() = Some(callback);
    }

    /// Receive state transitions. Slow watchers are dropped.
    pub fn watch_state(&self) -> Receiver<StateChange> {
        let (sender, receiver) = bounded(STATE_WATCH_BUFFER);
        self.shared.state_watchers.lock().push(sender);
        receiver
    }

    /// Open the connection. A no-op while connecting or connected.
    pub fn connect(&self) -> Result<()> {
        if matches!(
            self.state(),
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            return Ok(());
        }

        self.shared.set_state(ConnectionState::Connecting);
        if let Err(e) = self.shared.transport.connect(self.link()) {
            tracing::error!(error = %e, "Failed to start push transport");
            self.shared.set_state(ConnectionState::Error);
            return Err(e);
        }
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    /// Return the handle for `name`, joining the channel on first use.
    pub fn channel(&self, name: &str) -> Result<ChannelHandle> {
        let mut channels = self.shared.channels.lock();
        if !channels.contains(name) {
            self.shared.transport.subscribe(name)?;
            channels.insert(name.to_string());
            tracing::debug!(channel = name, "Joined channel");
        }
        Ok(ChannelHandle {
            name: name.to_string(),
        })
    }

    /// Leave a channel. Unknown names are ignored.
    pub fn leave(&self, name: &str) {
        let removed = self.shared.channels.lock().remove(name);
        if removed {
            if let Err(e) = self.shared.transport.unsubscribe(name) {
                tracing::warn!(channel = name, error = %e, "Unsubscribe failed");
            }
            tracing::debug!(channel = name, "Left channel");
        }
    }

    pub fn is_joined(&self, name: &str) -> bool {
        self.shared.channels.lock().contains(name)
    }

    /// Names of joined channels, sorted.
    pub fn channels(&self) -> Vec<String> {
        self.shared.channels.lock().iter().cloned().collect()
    }

    /// Close the connection for good (logout).
    pub fn disconnect(&self) {
        self.shared.transport.disconnect();
        self.shared.set_state(ConnectionState::Disconnected);
    }
}
