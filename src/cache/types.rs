//! Cache keys, values and change notifications.

use crate::types::{Conversation, ConversationId, Message, Notification, Revision, UserRef};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Identifies one cached query result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Ordered conversation list as seen by one user.
    Conversations(UserRef),
    /// Messages of one conversation, oldest first.
    Messages(ConversationId),
    /// Notifications of one recipient, newest first.
    Notifications(UserRef),
}

impl CacheKey {
    /// Value used as the patch base when nothing is cached yet.
    pub fn empty_value(&self) -> CacheValue {
        match self {
            CacheKey::Conversations(_) => CacheValue::Conversations(Arc::new(Vec::new())),
            CacheKey::Messages(_) => CacheValue::Messages(Arc::new(Vec::new())),
            CacheKey::Notifications(_) => CacheValue::Notifications(Arc::new(Vec::new())),
        }
    }
}

/// A cached value. Each variant matches one [`CacheKey`] variant.
#[derive(Clone, Debug, PartialEq)]
pub enum CacheValue {
    Conversations(Arc<Vec<Conversation>>),
    Messages(Arc<Vec<Message>>),
    Notifications(Arc<Vec<Notification>>),
}

impl CacheValue {
    /// Whether both values are the same installed reference.
    pub fn same_ref(&self, other: &CacheValue) -> bool {
        match (self, other) {
            (CacheValue::Conversations(a), CacheValue::Conversations(b)) => Arc::ptr_eq(a, b),
            (CacheValue::Messages(a), CacheValue::Messages(b)) => Arc::ptr_eq(a, b),
            (CacheValue::Notifications(a), CacheValue::Notifications(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Whether this value has the shape `key` expects.
    pub fn fits(&self, key: &CacheKey) -> bool {
        matches!(
            (self, key),
            (CacheValue::Conversations(_), CacheKey::Conversations(_))
                | (CacheValue::Messages(_), CacheKey::Messages(_))
                | (CacheValue::Notifications(_), CacheKey::Notifications(_))
        )
    }

    pub fn len(&self) -> usize {
        match self {
            CacheValue::Conversations(v) => v.len(),
            CacheValue::Messages(v) => v.len(),
            CacheValue::Notifications(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_conversations(&self) -> Option<&Arc<Vec<Conversation>>> {
        match self {
            CacheValue::Conversations(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_messages(&self) -> Option<&Arc<Vec<Message>>> {
        match self {
            CacheValue::Messages(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_notifications(&self) -> Option<&Arc<Vec<Notification>>> {
        match self {
            CacheValue::Notifications(v) => Some(v),
            _ => None,
        }
    }
}

/// Notification sent to key watchers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheChange {
    /// A new value reference was installed.
    Updated { key: CacheKey, revision: Revision },
    /// The value should be refetched; reads keep serving it meanwhile.
    Stale { key: CacheKey },
    /// Everything was dropped (logout).
    Cleared,
    /// The watch buffer was full and changes were coalesced. The current
    /// value must be re-read.
    Lagged { key: CacheKey },
}

/// Unique identifier for a watch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// Handle receiving changes for one key.
pub struct CacheWatch {
    pub id: WatchId,
    pub key: CacheKey,
    /// Channel to receive changes.
    pub receiver: crossbeam_channel::Receiver<CacheChange>,
    /// Set by the store when a change did not fit in the buffer.
    pub(super) lagged: Arc<AtomicBool>,
}

impl CacheWatch {
    /// Receive the next change (blocking).
    pub fn recv(&self) -> Result<CacheChange, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a change (non-blocking).
    pub fn try_recv(&self) -> Result<CacheChange, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<CacheChange, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently buffered.
    ///
    /// Ends with [`CacheChange::Lagged`] if changes were coalesced since the
    /// last drain.
    pub fn drain(&self) -> Vec<CacheChange> {
        let mut changes: Vec<CacheChange> = self.receiver.try_iter().collect();
        if self.lagged.swap(false, Ordering::SeqCst) {
            changes.push(CacheChange::Lagged { key: self.key });
        }
        changes
    }

    /// Whether changes were coalesced and not yet drained.
    pub fn is_lagged(&self) -> bool {
        self.lagged.load(Ordering::SeqCst)
    }
}
