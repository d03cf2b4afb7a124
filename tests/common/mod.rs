//! Shared fixtures: an in-memory backend and record builders.

#![allow(dead_code)]

use parking_lot::Mutex;
use rendezvous::{
    Backend, CacheStore, Conversation, ConversationId, ConversationKind, LoopbackTransport,
    Message, MessageBody, MessageId, NewConversation, NewGroup, Notification, NotificationCategory,
    NotificationId, Result, SendMessage, SyncClient, SyncConfig, SyncError, Timestamp, UserRef,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Notify};

#[derive(Default)]
pub struct MockBackend {
    pub conversations: Mutex<HashMap<UserRef, Vec<Conversation>>>,
    pub messages: Mutex<HashMap<ConversationId, Vec<Message>>>,
    pub notifications: Mutex<HashMap<UserRef, Vec<Notification>>>,
    next_message_id: AtomicU64,
    fail_writes: AtomicBool,
    unread_after_read: AtomicU32,
    /// When set, sends wait for a permit before answering.
    gate: Mutex<Option<Arc<Notify>>>,
    /// Replies handed out to sends in call order.
    replies: Mutex<VecDeque<oneshot::Receiver<Result<Message>>>>,
    pub list_calls: AtomicU64,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            next_message_id: AtomicU64::new(1),
            ..Default::default()
        }
    }

    /// Server id given to the next sent message.
    pub fn next_message_id(self, id: u64) -> Self {
        self.next_message_id.store(id, Ordering::SeqCst);
        self
    }

    pub fn failing(self) -> Self {
        self.fail_writes.store(true, Ordering::SeqCst);
        self
    }

    pub fn unread_after_read(self, unread: u32) -> Self {
        self.unread_after_read.store(unread, Ordering::SeqCst);
        self
    }

    /// Hold sends until the returned notifier is signalled.
    pub fn gated(self) -> (Self, Arc<Notify>) {
        let notify = Arc::new(Notify::new());
        *self.gate.lock() = Some(notify.clone());
        (self, notify)
    }

    /// Answer the next `sends` sends with whatever the test pushes into the
    /// returned senders, in call order.
    pub fn scripted(self, sends: usize) -> (Self, Vec<oneshot::Sender<Result<Message>>>) {
        let mut senders = Vec::with_capacity(sends);
        {
            let mut replies = self.replies.lock();
            for _ in 0..sends {
                let (tx, rx) = oneshot::channel();
                senders.push(tx);
                replies.push_back(rx);
            }
        }
        (self, senders)
    }

    pub fn with_conversations(self, scope: UserRef, list: Vec<Conversation>) -> Self {
        self.conversations.lock().insert(scope, list);
        self
    }

    pub fn with_messages(self, id: ConversationId, list: Vec<Message>) -> Self {
        self.messages.lock().insert(id, list);
        self
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SyncError::Backend {
                status: 500,
                message: "boom".into(),
            });
        }
        Ok(())
    }
}

impl Backend for MockBackend {
    async fn send_message(&self, request: &SendMessage) -> Result<Message> {
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let reply = self.replies.lock().pop_front();
        if let Some(reply) = reply {
            return reply.await.unwrap_or(Err(SyncError::Timeout));
        }
        self.check_write()?;

        let message = Message {
            id: MessageId::Server(self.next_message_id.fetch_add(1, Ordering::SeqCst)),
            conversation_id: request.conversation_id,
            sender: request.sender,
            body: request.body.clone(),
            created_at: Timestamp(1_000),
            optimistic: false,
        };
        self.messages
            .lock()
            .entry(request.conversation_id)
            .or_default()
            .push(message.clone());
        Ok(message)
    }

    async fn create_conversation(&self, request: &NewConversation) -> Result<Conversation> {
        self.check_write()?;
        Ok(Conversation::new(
            ConversationId(request.guest_id * 1_000 + request.cast_id),
            ConversationKind::Direct,
            vec![UserRef::guest(request.guest_id), UserRef::cast(request.cast_id)],
        ))
    }

    async fn mark_as_read(&self, _conversation: ConversationId, _reader: UserRef) -> Result<u32> {
        self.check_write()?;
        Ok(self.unread_after_read.load(Ordering::SeqCst))
    }

    async fn create_group(&self, request: &NewGroup) -> Result<Conversation> {
        self.check_write()?;
        let mut group = Conversation::new(
            ConversationId(900),
            ConversationKind::Group,
            request.members.clone(),
        );
        group.title = Some(request.name.clone());
        Ok(group)
    }

    async fn leave_group(&self, _conversation: ConversationId, _member: UserRef) -> Result<()> {
        self.check_write()
    }

    async fn list_conversations(&self, scope: UserRef) -> Result<Vec<Conversation>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.conversations.lock().get(&scope).cloned().unwrap_or_default())
    }

    async fn list_messages(&self, conversation: ConversationId) -> Result<Vec<Message>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.messages.lock().get(&conversation).cloned().unwrap_or_default())
    }

    async fn list_notifications(&self, recipient: UserRef) -> Result<Vec<Notification>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.notifications.lock().get(&recipient).cloned().unwrap_or_default())
    }

    async fn mark_notification_read(&self, _id: NotificationId) -> Result<()> {
        self.check_write()
    }

    async fn delete_notification(&self, _id: NotificationId) -> Result<()> {
        self.check_write()
    }
}

/// Route library logs to the test output (`RUST_LOG=rendezvous=debug`).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Client over a private cache and a loopback transport.
pub fn client(backend: MockBackend) -> (SyncClient<MockBackend>, LoopbackTransport) {
    init_tracing();
    let transport = LoopbackTransport::new();
    let client = SyncClient::with_cache(
        SyncConfig::default(),
        Box::new(transport.clone()),
        backend,
        CacheStore::default(),
    );
    (client, transport)
}

pub fn message(id: u64, conversation: u64, sender: UserRef, text: &str) -> Message {
    Message {
        id: MessageId::Server(id),
        conversation_id: ConversationId(conversation),
        sender,
        body: MessageBody::text(text),
        created_at: Timestamp(id as i64),
        optimistic: false,
    }
}

pub fn conversation(id: u64, unread: u32) -> Conversation {
    let mut c = Conversation::new(
        ConversationId(id),
        ConversationKind::Direct,
        vec![UserRef::guest(3), UserRef::cast(8)],
    );
    c.unread_count = unread;
    c
}

pub fn notification(id: u64, conversation: Option<u64>) -> Notification {
    Notification {
        id: NotificationId(id),
        category: NotificationCategory::Message,
        conversation_id: conversation.map(ConversationId),
        cast_id: Some(8),
        guest_id: None,
        body: Some("new message".into()),
        read: false,
        created_at: Timestamp(id as i64),
    }
}

/// Broker payload for `new-message`.
pub fn new_message_event(message: &Message) -> serde_json::Value {
    serde_json::json!({ "message": message })
}

pub fn noop() -> rendezvous::EventCallback {
    Arc::new(|_| {})
}
