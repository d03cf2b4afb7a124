//! The process-wide cache store.

use crate::error::{Result, SyncError};
use crate::types::{Conversation, ConversationId, Message, Notification, Revision, UserRef};
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use super::types::{CacheChange, CacheKey, CacheValue, CacheWatch, WatchId};

/// Default per-watcher buffer.
const DEFAULT_WATCH_BUFFER: usize = 256;

static GLOBAL: OnceLock<CacheStore> = OnceLock::new();

/// One installed value.
struct CacheEntry {
    value: CacheValue,
    /// Logical arrival order of the install.
    revision: Revision,
    stale: bool,
}

struct Watcher {
    id: WatchId,
    sender: Sender<CacheChange>,
    lagged: Arc<AtomicBool>,
}

/// Outcome of handing a change to one watcher.
enum Delivery {
    Sent,
    /// Buffer full; the watcher is flagged and re-reads on its next drain.
    Coalesced,
    /// The receiving side is gone.
    Closed,
}

impl Watcher {
    fn deliver(&self, change: CacheChange) -> Delivery {
        match self.sender.try_send(change) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) => {
                self.lagged.store(true, Ordering::SeqCst);
                Delivery::Coalesced
            }
            Err(TrySendError::Disconnected(_)) => Delivery::Closed,
        }
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    watchers: HashMap<CacheKey, Vec<Watcher>>,
    revision: Revision,
    next_watch_id: u64,
}

impl CacheState {
    fn notify(&mut self, key: &CacheKey, change: CacheChange) {
        if let Some(watchers) = self.watchers.get_mut(key) {
            let mut coalesced = 0;
            watchers.retain(|w| match w.deliver(change.clone()) {
                Delivery::Sent => true,
                Delivery::Coalesced => {
                    coalesced += 1;
                    true
                }
                Delivery::Closed => false,
            });
            if coalesced > 0 {
                tracing::debug!(?key, coalesced, "Cache watchers lagging, changes coalesced");
            }
            if watchers.is_empty() {
                self.watchers.remove(key);
            }
        }
    }

    fn install(&mut self, key: CacheKey, value: CacheValue, stale: bool) -> Revision {
        self.revision = self.revision.next();
        let revision = self.revision;
        self.entries.insert(
            key,
            CacheEntry {
                value,
                revision,
                stale,
            },
        );
        self.notify(&key, CacheChange::Updated { key, revision });
        revision
    }
}

/// Normalized key→value store of query results.
///
/// Cheap to clone; clones share the same entries. Every mutation runs as one
/// critical section, so patches apply in call order and none is lost.
#[derive(Clone)]
pub struct CacheStore {
    state: Arc<Mutex<CacheState>>,
    watch_buffer: usize,
}

impl CacheStore {
    /// Create an empty store.
    pub fn new(watch_buffer: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState::default())),
            watch_buffer: watch_buffer.max(1),
        }
    }

    /// The process-wide store. Initialized on first use, never torn down;
    /// [`CacheStore::clear`] empties it on logout.
    pub fn global() -> &'static CacheStore {
        GLOBAL.get_or_init(|| CacheStore::new(DEFAULT_WATCH_BUFFER))
    }

    // --- Reads ---

    /// Current value for a key.
    pub fn read(&self, key: &CacheKey) -> Option<CacheValue> {
        self.state.lock().entries.get(key).map(|e| e.value.clone())
    }

    /// Revision of the value currently installed for a key.
    pub fn revision(&self, key: &CacheKey) -> Option<Revision> {
        self.state.lock().entries.get(key).map(|e| e.revision)
    }

    pub fn is_stale(&self, key: &CacheKey) -> bool {
        self.state.lock().entries.get(key).map_or(false, |e| e.stale)
    }

    /// Conversation list for a user, in list endpoint order.
    pub fn conversations(&self, scope: UserRef) -> Option<Arc<Vec<Conversation>>> {
        self.read(&CacheKey::Conversations(scope))
            .and_then(|v| v.as_conversations().cloned())
    }

    /// Messages of a conversation, oldest first.
    pub fn messages(&self, conversation: ConversationId) -> Option<Arc<Vec<Message>>> {
        self.read(&CacheKey::Messages(conversation))
            .and_then(|v| v.as_messages().cloned())
    }

    /// Notifications of a recipient, newest first.
    pub fn notifications(&self, recipient: UserRef) -> Option<Arc<Vec<Notification>>> {
        self.read(&CacheKey::Notifications(recipient))
            .and_then(|v| v.as_notifications().cloned())
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // --- Writes ---

    /// Install a value unconditionally.
    pub fn write(&self, key: CacheKey, value: CacheValue) -> Result<Revision> {
        if !value.fits(&key) {
            return Err(SyncError::InvalidOperation(format!(
                "value shape does not match key {:?}",
                key
            )));
        }
        Ok(self.state.lock().install(key, value, false))
    }

    /// Read-modify-write with a pure updater.
    ///
    /// The updater receives the current value, or the key's empty value when
    /// nothing is cached. Returning the same reference is a no-op: no
    /// revision is taken and watchers are not notified. Returns whether a new
    /// value was installed.
    ///
    /// A value built on the empty base only holds what was patched in, so it
    /// is installed stale and still gets refetched by active consumers.
    ///
    /// The updater runs under the store lock and must not call back into the
    /// store.
    pub fn patch<F>(&self, key: CacheKey, updater: F) -> Result<bool>
    where
        F: FnOnce(CacheValue) -> CacheValue,
    {
        let mut state = self.state.lock();
        let existing = state.entries.get(&key).map(|e| (e.value.clone(), e.stale));
        let partial = existing.as_ref().map_or(true, |(_, stale)| *stale);
        let current = existing
            .map(|(value, _)| value)
            .unwrap_or_else(|| key.empty_value());

        let next = updater(current.clone());
        if !next.fits(&key) {
            return Err(SyncError::InvalidOperation(format!(
                "patch returned wrong shape for key {:?}",
                key
            )));
        }

        if next.same_ref(&current) {
            return Ok(false);
        }

        state.install(key, next, partial);
        Ok(true)
    }

    /// Typed patch over a conversation list.
    pub fn patch_conversations<F>(&self, scope: UserRef, updater: F) -> bool
    where
        F: FnOnce(Arc<Vec<Conversation>>) -> Arc<Vec<Conversation>>,
    {
        self.patch(CacheKey::Conversations(scope), |value| match value {
            CacheValue::Conversations(list) => CacheValue::Conversations(updater(list)),
            other => other,
        })
        .unwrap_or(false)
    }

    /// Typed patch over a message list.
    pub fn patch_messages<F>(&self, conversation: ConversationId, updater: F) -> bool
    where
        F: FnOnce(Arc<Vec<Message>>) -> Arc<Vec<Message>>,
    {
        self.patch(CacheKey::Messages(conversation), |value| match value {
            CacheValue::Messages(list) => CacheValue::Messages(updater(list)),
            other => other,
        })
        .unwrap_or(false)
    }

    /// Typed patch over a notification list.
    pub fn patch_notifications<F>(&self, recipient: UserRef, updater: F) -> bool
    where
        F: FnOnce(Arc<Vec<Notification>>) -> Arc<Vec<Notification>>,
    {
        self.patch(CacheKey::Notifications(recipient), |value| match value {
            CacheValue::Notifications(list) => CacheValue::Notifications(updater(list)),
            other => other,
        })
        .unwrap_or(false)
    }

    /// Apply a conversation-list updater to every cached list.
    ///
    /// Used for events that are not scoped to a single list owner.
    pub fn patch_all_conversation_lists<F>(&self, updater: F) -> usize
    where
        F: Fn(Arc<Vec<Conversation>>) -> Arc<Vec<Conversation>>,
    {
        let scopes: Vec<UserRef> = {
            let state = self.state.lock();
            state
                .entries
                .keys()
                .filter_map(|k| match k {
                    CacheKey::Conversations(scope) => Some(*scope),
                    _ => None,
                })
                .collect()
        };

        scopes
            .into_iter()
            .filter(|scope| self.patch_conversations(*scope, &updater))
            .count()
    }

    // --- Staleness ---

    /// Mark a key stale so active consumers refetch it.
    ///
    /// The value keeps being served until the refetch installs a new one.
    pub fn invalidate(&self, key: &CacheKey) {
        let mut state = self.state.lock();
        if let Some(entry) = state.entries.get_mut(key) {
            entry.stale = true;
        }
        state.notify(key, CacheChange::Stale { key: *key });
    }

    /// Mark every entry stale (after a transport outage).
    pub fn invalidate_all(&self) {
        let mut state = self.state.lock();
        for entry in state.entries.values_mut() {
            entry.stale = true;
        }
        let watched: Vec<CacheKey> = state.watchers.keys().copied().collect();
        for key in watched {
            state.notify(&key, CacheChange::Stale { key });
        }
        tracing::debug!(entries = state.entries.len(), "Invalidated all cache entries");
    }

    /// Watched keys that need a refetch: stale entries and keys never filled.
    pub fn stale_watched_keys(&self) -> Vec<CacheKey> {
        let state = self.state.lock();
        state
            .watchers
            .keys()
            .filter(|key| state.entries.get(*key).map_or(true, |e| e.stale))
            .copied()
            .collect()
    }

    /// Drop every entry (explicit logout). Watchers stay registered.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        let keys: Vec<CacheKey> = state.watchers.keys().copied().collect();
        for key in keys {
            state.notify(&key, CacheChange::Cleared);
        }
    }

    // --- Watching ---

    /// Watch a key for changes.
    pub fn watch(&self, key: CacheKey) -> CacheWatch {
        let (sender, receiver) = bounded(self.watch_buffer);
        let lagged = Arc::new(AtomicBool::new(false));
        let mut state = self.state.lock();
        state.next_watch_id += 1;
        let id = WatchId(state.next_watch_id);
        state.watchers.entry(key).or_default().push(Watcher {
            id,
            sender,
            lagged: lagged.clone(),
        });
        CacheWatch {
            id,
            key,
            receiver,
            lagged,
        }
    }

    /// Stop a watch.
    pub fn unwatch(&self, watch: &CacheWatch) {
        let mut state = self.state.lock();
        if let Some(watchers) = state.watchers.get_mut(&watch.key) {
            watchers.retain(|w| w.id != watch.id);
            if watchers.is_empty() {
                state.watchers.remove(&watch.key);
            }
        }
    }

    /// Whether any consumer watches the key.
    pub fn is_watched(&self, key: &CacheKey) -> bool {
        self.state.lock().watchers.contains_key(key)
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_WATCH_BUFFER)
    }
}
