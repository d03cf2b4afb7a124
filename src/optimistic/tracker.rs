use crate::backend::SendMessage;
use crate::cache::CacheStore;
use crate::error::Result;
use crate::reconcile::{confirm_message, insert_placeholder, rollback_message};
use crate::types::{ConversationId, Message, MessageBody, MessageId, Timestamp, UserRef};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// An unresolved send.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingSend {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender: UserRef,
    pub body: MessageBody,
    pub started_at: Timestamp,
}

impl PendingSend {
    /// The cache entry standing in for this send.
    pub fn placeholder(&self) -> Message {
        Message {
            id: self.id,
            conversation_id: self.conversation_id,
            sender: self.sender,
            body: self.body.clone(),
            created_at: self.started_at,
            optimistic: true,
        }
    }
}

/// Tracks placeholders between a send and its resolution.
pub struct OptimisticTracker {
    next_temp_id: AtomicU64,
    pending: Mutex<Vec<PendingSend>>,
}

impl OptimisticTracker {
    pub fn new() -> Self {
        Self {
            next_temp_id: AtomicU64::new(1),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Insert a placeholder for `request` and remember it.
    pub fn begin(&self, cache: &CacheStore, request: &SendMessage) -> Message {
        let id = MessageId::Pending(self.next_temp_id.fetch_add(1, Ordering::SeqCst));
        let send = PendingSend {
            id,
            conversation_id: request.conversation_id,
            sender: request.sender,
            body: request.body.clone(),
            started_at: Timestamp::now(),
        };
        let placeholder = send.placeholder();

        self.pending.lock().push(send);
        cache.patch_messages(request.conversation_id, |list| {
            insert_placeholder(list, &placeholder)
        });

        tracing::debug!(conversation = %request.conversation_id, ?id, "Inserted placeholder");
        placeholder
    }

    /// Replace a placeholder with the server record.
    pub fn confirm(&self, cache: &CacheStore, pending: MessageId, confirmed: &Message) {
        let Some(send) = self.forget(pending) else {
            return;
        };
        cache.patch_messages(send.conversation_id, |list| {
            confirm_message(list, pending, confirmed)
        });
        tracing::debug!(conversation = %send.conversation_id, ?pending, id = ?confirmed.id, "Send confirmed");
    }

    /// Remove a placeholder whose write failed.
    pub fn rollback(&self, cache: &CacheStore, pending: MessageId) {
        let Some(send) = self.forget(pending) else {
            return;
        };
        cache.patch_messages(send.conversation_id, |list| rollback_message(list, pending));
        tracing::debug!(conversation = %send.conversation_id, ?pending, "Send rolled back");
    }

    /// Run `write` optimistically.
    ///
    /// The placeholder is in the cache before `write` is first polled.
    /// Dropping the returned future cancels the write and rolls the
    /// placeholder back; a write that must outlive its caller belongs on a
    /// spawned task (see `SyncClient::spawn_send`).
    pub async fn send<F>(&self, cache: &CacheStore, request: &SendMessage, write: F) -> Result<Message>
    where
        F: Future<Output = Result<Message>>,
    {
        request.validate()?;

        let placeholder = self.begin(cache, request);
        let mut guard = Unresolved {
            tracker: self,
            cache,
            pending: Some(placeholder.id),
        };

        let result = write.await;
        guard.pending = None;

        self.settle(cache, placeholder.id, result)
    }

    /// Resolve a placeholder from its write outcome.
    pub fn settle(
        &self,
        cache: &CacheStore,
        pending: MessageId,
        result: Result<Message>,
    ) -> Result<Message> {
        match result {
            Ok(mut message) => {
                self.confirm(cache, pending, &message);
                message.optimistic = false;
                Ok(message)
            }
            Err(e) => {
                tracing::warn!(?pending, error = %e, "Send failed");
                self.rollback(cache, pending);
                Err(e)
            }
        }
    }

    /// Unresolved sends in a conversation, oldest first.
    pub fn outstanding(&self, conversation: ConversationId) -> Vec<PendingSend> {
        self.pending
            .lock()
            .iter()
            .filter(|send| send.conversation_id == conversation)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every unresolved send (logout). Placeholders go with the cache.
    pub fn clear(&self) {
        self.pending.lock().clear();
    }

    fn forget(&self, id: MessageId) -> Option<PendingSend> {
        let mut pending = self.pending.lock();
        let index = pending.iter().position(|send| send.id == id)?;
        Some(pending.remove(index))
    }
}

impl Default for OptimisticTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Rolls back a placeholder if the send future is dropped mid-flight.
struct Unresolved<'a> {
    tracker: &'a OptimisticTracker,
    cache: &'a CacheStore,
    pending: Option<MessageId>,
}

impl Drop for Unresolved<'_> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            tracing::debug!(?pending, "Send cancelled");
            self.tracker.rollback(self.cache, pending);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::reconcile::new_message;
    use std::sync::Arc;
    use std::task::{Wake, Waker};

    fn request(text: &str) -> SendMessage {
        SendMessage::new(ConversationId(5), UserRef::guest(3), MessageBody::text(text))
    }

    fn server(id: u64, text: &str) -> Message {
        Message {
            id: MessageId::Server(id),
            conversation_id: ConversationId(5),
            sender: UserRef::guest(3),
            body: MessageBody::text(text),
            created_at: Timestamp(1_000),
            optimistic: false,
        }
    }

    struct NoopWake;

    impl Wake for NoopWake {
        fn wake(self: Arc<Self>) {}
    }

    fn block_on<F: Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[test]
    fn test_send_success_replaces_placeholder() {
        let cache = CacheStore::default();
        let tracker = OptimisticTracker::new();
        let req = request("hi");

        let confirmed = block_on(tracker.send(&cache, &req, async {
            // Placeholder is visible while the write is in flight.
            let list = cache.messages(ConversationId(5)).unwrap();
            assert_eq!(list.len(), 1);
            assert!(list[0].optimistic);
            Ok(server(42, "hi"))
        }))
        .unwrap();

        assert_eq!(confirmed.id, MessageId::Server(42));
        let list = cache.messages(ConversationId(5)).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, MessageId::Server(42));
        assert!(!list[0].optimistic);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_send_failure_rolls_back() {
        let cache = CacheStore::default();
        let tracker = OptimisticTracker::new();
        let req = request("hi");

        let result = block_on(tracker.send(&cache, &req, async { Err(SyncError::Timeout) }));

        assert!(matches!(result, Err(SyncError::Timeout)));
        assert!(cache.messages(ConversationId(5)).unwrap().is_empty());
        assert!(tracker.outstanding(ConversationId(5)).is_empty());
    }

    #[test]
    fn test_push_before_response() {
        let cache = CacheStore::default();
        let tracker = OptimisticTracker::new();
        let req = request("hi");

        let result = block_on(tracker.send(&cache, &req, async {
            cache.patch_messages(ConversationId(5), |list| new_message(list, &server(42, "hi")));
            Ok(server(42, "hi"))
        }));

        assert!(result.is_ok());
        let list = cache.messages(ConversationId(5)).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, MessageId::Server(42));
    }

    #[test]
    fn test_outstanding_in_send_order() {
        let cache = CacheStore::default();
        let tracker = OptimisticTracker::new();

        let first = tracker.begin(&cache, &request("a"));
        let second = tracker.begin(&cache, &request("b"));

        let ids: Vec<_> = tracker.outstanding(ConversationId(5)).iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
        assert!(first.id.is_pending());

        tracker.rollback(&cache, first.id);
        assert_eq!(tracker.len(), 1);
        assert_eq!(cache.messages(ConversationId(5)).unwrap().len(), 1);
    }

    #[test]
    fn test_dropped_send_rolls_back() {
        let cache = CacheStore::default();
        let tracker = OptimisticTracker::new();
        let req = request("hi");

        {
            let mut send = Box::pin(tracker.send(&cache, &req, std::future::pending()));
            let waker = Waker::from(Arc::new(NoopWake));
            let mut cx = std::task::Context::from_waker(&waker);
            assert!(send.as_mut().poll(&mut cx).is_pending());
            assert_eq!(tracker.len(), 1);
        }

        assert!(tracker.is_empty());
        assert!(cache.messages(ConversationId(5)).unwrap().is_empty());
    }

    #[test]
    fn test_settle_after_begin() {
        let cache = CacheStore::default();
        let tracker = OptimisticTracker::new();
        let first = tracker.begin(&cache, &request("a"));
        let second = tracker.begin(&cache, &request("b"));

        let confirmed = tracker.settle(&cache, second.id, Ok(server(7, "b"))).unwrap();
        let failed = tracker.settle(&cache, first.id, Err(SyncError::Timeout));

        assert_eq!(confirmed.id, MessageId::Server(7));
        assert!(matches!(failed, Err(SyncError::Timeout)));
        let list = cache.messages(ConversationId(5)).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, MessageId::Server(7));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_invalid_request_writes_nothing() {
        let cache = CacheStore::default();
        let tracker = OptimisticTracker::new();
        let req = request("");

        let result = block_on(tracker.send(&cache, &req, async { Ok(server(1, "")) }));

        assert!(matches!(result, Err(SyncError::InvalidOperation(_))));
        assert!(cache.messages(ConversationId(5)).is_none());
    }
}
