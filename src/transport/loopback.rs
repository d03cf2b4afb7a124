//! In-memory transport.
//!
//! Connects instantly, records every join and leave, and lets the owner
//! inject broker events and state changes. Clones share the same log.

use crate::error::{Result, SyncError};
use parking_lot::Mutex;
use std::sync::Arc;

use super::connector::{ConnectionState, ConnectorLink, PushTransport};

/// Recorded transport call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoopbackCall {
    Connect,
    Join(String),
    Leave(String),
    Disconnect,
}

#[derive(Default)]
struct LoopbackState {
    link: Option<ConnectorLink>,
    calls: Vec<LoopbackCall>,
    refuse_connect: bool,
}

#[derive(Clone, Default)]
pub struct LoopbackTransport {
    state: Arc<Mutex<LoopbackState>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `connect` fail.
    pub fn refuse_connections(&self) {
        self.state.lock().refuse_connect = true;
    }

    /// Link handed over by the connector, once connected.
    pub fn link(&self) -> Option<ConnectorLink> {
        self.state.lock().link.clone()
    }

    /// Inject an application event as if the broker sent it.
    pub fn emit(&self, channel: &str, event: &str, data: serde_json::Value) {
        if let Some(link) = self.link() {
            link.deliver(channel, event, data);
        }
    }

    /// Inject a state change as if the connection moved.
    pub fn set_state(&self, state: ConnectionState) {
        if let Some(link) = self.link() {
            link.report_state(state);
        }
    }

    pub fn calls(&self) -> Vec<LoopbackCall> {
        self.state.lock().calls.clone()
    }

    pub fn connect_count(&self) -> usize {
        self.count(|call| matches!(call, LoopbackCall::Connect))
    }

    pub fn join_count(&self, channel: &str) -> usize {
        self.count(|call| matches!(call, LoopbackCall::Join(name) if name == channel))
    }

    pub fn leave_count(&self, channel: &str) -> usize {
        self.count(|call| matches!(call, LoopbackCall::Leave(name) if name == channel))
    }

    fn count<F: Fn(&LoopbackCall) -> bool>(&self, predicate: F) -> usize {
        self.state.lock().calls.iter().filter(|call| predicate(call)).count()
    }
}

impl PushTransport for LoopbackTransport {
    fn connect(&self, link: ConnectorLink) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.refuse_connect {
                state.refuse_connect = false;
                return Err(SyncError::Transport("connection refused".into()));
            }
            state.calls.push(LoopbackCall::Connect);
            state.link = Some(link.clone());
        }
        link.report_state(ConnectionState::Connected);
        Ok(())
    }

    fn subscribe(&self, channel: &str) -> Result<()> {
        self.state.lock().calls.push(LoopbackCall::Join(channel.to_string()));
        Ok(())
    }

    fn unsubscribe(&self, channel: &str) -> Result<()> {
        self.state.lock().calls.push(LoopbackCall::Leave(channel.to_string()));
        Ok(())
    }

    fn disconnect(&self) {
        let mut state = self.state.lock();
        state.calls.push(LoopbackCall::Disconnect);
        state.link = None;
    }
}
