//! Reference-counted channel registry.

use crate::error::Result;
use crate::events::{EventKind, PushEvent};
use crate::transport::{Connector, EventSink};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::types::{Channel, HandlerId, SubscriptionHandle};

/// Consumer callback for one event kind.
pub type Handler = Arc<dyn Fn(&PushEvent) + Send + Sync>;

/// Runs once per delivered event, before handlers.
pub type Reconciler = Arc<dyn Fn(&Channel, &PushEvent) + Send + Sync>;

struct HandlerEntry {
    id: HandlerId,
    event: EventKind,
    handler: Handler,
}

/// Internal per-channel state.
struct ChannelEntry {
    channel: Channel,
    handlers: Vec<HandlerEntry>,
}

pub(crate) struct RegistryShared {
    connector: Connector,
    /// Joined channels by broker name.
    channels: Mutex<HashMap<String, ChannelEntry>>,
    reconciler: RwLock<Option<Reconciler>>,
    /// Counter for generating handler IDs.
    next_id: AtomicU64,
}

impl RegistryShared {
    pub(crate) fn handler_count(&self, channel: &Channel) -> usize {
        self.channels
            .lock()
            .get(&channel.name())
            .map_or(0, |entry| entry.handlers.len())
    }

    pub(crate) fn release(&self, channel: Channel, id: HandlerId) {
        let name = channel.name();
        let mut channels = self.channels.lock();
        let Some(entry) = channels.get_mut(&name) else {
            return;
        };

        entry.handlers.retain(|h| h.id != id);
        if entry.handlers.is_empty() {
            channels.remove(&name);
            self.connector.leave(&name);
            tracing::debug!(channel = %name, "Last handler released, left channel");
        }
    }

    fn dispatch(&self, name: &str, event: PushEvent) {
        let kind = event.kind();
        let (channel, handlers) = {
            let channels = self.channels.lock();
            let Some(entry) = channels.get(name) else {
                tracing::debug!(channel = name, event = %kind, "No subscribers, dropped");
                return;
            };
            let handlers: Vec<Handler> = entry
                .handlers
                .iter()
                .filter(|h| h.event == kind)
                .map(|h| h.handler.clone())
                .collect();
            (entry.channel, handlers)
        };

        // Locks are released: reconciler and handlers may acquire/release.
        let reconciler = self.reconciler.read().clone();
        if let Some(reconcile) = reconciler {
            reconcile(&channel, &event);
        }

        for handler in handlers {
            handler(&event);
        }
    }
}

impl EventSink for RegistryShared {
    fn on_event(&self, channel: &str, event: PushEvent) {
        self.dispatch(channel, event);
    }
}

/// Owns at most one underlying subscription per channel.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    shared: Arc<RegistryShared>,
}

impl SubscriptionRegistry {
    /// Create a registry and attach it as the connector's event sink.
    pub fn new(connector: Connector) -> Self {
        let shared = Arc::new(RegistryShared {
            connector: connector.clone(),
            channels: Mutex::new(HashMap::new()),
            reconciler: RwLock::new(None),
            next_id: AtomicU64::new(1),
        });
        let sink: Weak<dyn EventSink> = Arc::downgrade(&shared) as Weak<dyn EventSink>;
        connector.set_sink(sink);
        Self { shared }
    }

    /// Install the function run once per delivered event.
    pub fn set_reconciler(&self, reconciler: Reconciler) {
        *self.shared.reconciler.write() = Some(reconciler);
    }

    /// Register `handler` for `event` on `channel`, joining the channel if
    /// nobody held it yet.
    pub fn acquire(
        &self,
        channel: Channel,
        event: EventKind,
        handler: Handler,
    ) -> Result<SubscriptionHandle> {
        channel.validate()?;

        let name = channel.name();
        let id = HandlerId(self.shared.next_id.fetch_add(1, Ordering::SeqCst));

        let mut channels = self.shared.channels.lock();
        if !channels.contains_key(&name) {
            self.shared.connector.channel(&name)?;
            channels.insert(
                name.clone(),
                ChannelEntry {
                    channel,
                    handlers: Vec::new(),
                },
            );
        }
        if let Some(entry) = channels.get_mut(&name) {
            entry.handlers.push(HandlerEntry { id, event, handler });
            tracing::trace!(channel = %name, %event, handlers = entry.handlers.len(), "Acquired");
        }

        Ok(SubscriptionHandle {
            id,
            channel,
            event,
            registry: Arc::downgrade(&self.shared),
            released: false,
        })
    }

    /// Number of joined channels.
    pub fn channel_count(&self) -> usize {
        self.shared.channels.lock().len()
    }

    /// Number of live handlers on a channel.
    pub fn handler_count(&self, channel: &Channel) -> usize {
        self.shared.handler_count(channel)
    }

    pub fn is_joined(&self, channel: &Channel) -> bool {
        self.shared.channels.lock().contains_key(&channel.name())
    }

    /// Joined channels.
    pub fn channels(&self) -> Vec<Channel> {
        self.shared.channels.lock().values().map(|e| e.channel).collect()
    }

    /// Drop every handler and leave every channel (logout).
    ///
    /// Outstanding handles become inert.
    pub fn release_all(&self) {
        let names: Vec<String> = self.shared.channels.lock().drain().map(|(name, _)| name).collect();
        for name in names {
            self.shared.connector.leave(&name);
        }
    }

    /// Route an event as if the connector delivered it.
    pub fn dispatch(&self, channel: &Channel, event: PushEvent) {
        self.shared.dispatch(&channel.name(), event);
    }
}
