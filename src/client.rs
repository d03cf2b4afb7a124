//! The sync client: one place that wires the transport, registry, cache,
//! optimistic tracker and backend together for a signed-in user.

use crate::backend::{Backend, NewConversation, NewGroup, SendMessage};
use crate::cache::{CacheKey, CacheStore, CacheValue};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::events::EventKind;
use crate::hooks::Hooks;
use crate::optimistic::OptimisticTracker;
use crate::reconcile::{
    apply_event, conversation_created, hide_conversation, messages_read, notification_read,
    notification_removed,
};
use crate::registry::{Channel, SubscriptionHandle, SubscriptionRegistry};
use crate::transport::{ConnectionState, Connector, PushTransport};
use crate::types::{Conversation, ConversationId, Message, Notification, NotificationId, UserRef};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// The signed-in user and the mailbox subscription held for them.
struct Session {
    user: UserRef,
    _mailbox: SubscriptionHandle,
}

/// Real-time sync client.
///
/// Owns the push connection and keeps the session user's mailbox channel
/// joined for as long as it is connected, so list and notification events
/// land in the cache even when no surface shows them.
pub struct SyncClient<B: Backend> {
    config: SyncConfig,
    connector: Connector,
    registry: SubscriptionRegistry,
    cache: CacheStore,
    tracker: Arc<OptimisticTracker>,
    backend: Arc<B>,
    session: RwLock<Option<Session>>,
}

impl<B: Backend> SyncClient<B> {
    /// Client over the process-wide cache.
    pub fn new(config: SyncConfig, transport: Box<dyn PushTransport>, backend: B) -> Self {
        Self::with_cache(config, transport, backend, CacheStore::global().clone())
    }

    /// Client over a caller-provided cache.
    pub fn with_cache(
        config: SyncConfig,
        transport: Box<dyn PushTransport>,
        backend: B,
        cache: CacheStore,
    ) -> Self {
        let connector = Connector::new(transport);
        let registry = SubscriptionRegistry::new(connector.clone());

        let reconcile_cache = cache.clone();
        registry.set_reconciler(Arc::new(move |channel, event| {
            apply_event(&reconcile_cache, channel, event);
        }));

        // Events during an outage are gone; everything cached may be behind.
        let recovery_cache = cache.clone();
        connector.on_state_change(Arc::new(move |change| {
            if change.is_recovery() {
                tracing::info!("Push connection recovered, invalidating cache");
                recovery_cache.invalidate_all();
            }
        }));

        Self {
            config,
            connector,
            registry,
            cache,
            tracker: Arc::new(OptimisticTracker::new()),
            backend: Arc::new(backend),
            session: RwLock::new(None),
        }
    }

    // --- Lifecycle ---

    /// Open the push connection and join `user`'s mailbox.
    pub fn connect(&self, user: UserRef) -> Result<()> {
        let mailbox = Channel::Mailbox(user);
        mailbox.validate()?;

        self.connector.connect()?;

        let mut session = self.session.write();
        if session.as_ref().map_or(false, |s| s.user == user) {
            return Ok(());
        }

        // The reconciler runs for every event on a joined channel, so one
        // handle keeps all mailbox events flowing into the cache.
        let handle = self.registry.acquire(
            mailbox,
            EventKind::NotificationCreated,
            Arc::new(|_| {}),
        )?;
        *session = Some(Session {
            user,
            _mailbox: handle,
        });
        tracing::info!(%user, "Session started");
        Ok(())
    }

    /// Leave every channel, drop cached data and close the connection.
    pub fn logout(&self) {
        let user = self.session.write().take().map(|s| s.user);
        self.registry.release_all();
        self.tracker.clear();
        self.cache.clear();
        self.connector.disconnect();
        tracing::info!(user = ?user, "Logged out");
    }

    pub fn session_user(&self) -> Option<UserRef> {
        self.session.read().as_ref().map(|s| s.user)
    }

    fn require_user(&self) -> Result<UserRef> {
        self.session_user().ok_or(SyncError::NotConnected)
    }

    pub fn state(&self) -> ConnectionState {
        self.connector.state()
    }

    // --- Accessors ---

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn connector(&self) -> &Connector {
        &self.connector
    }

    pub fn tracker(&self) -> &OptimisticTracker {
        &self.tracker
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Hook entry point bound to this client's registry and cache.
    pub fn hooks(&self) -> Hooks {
        Hooks::new(self.registry.clone(), self.cache.clone())
    }

    // --- Reads ---

    /// Fetch a user's conversation list and install it.
    pub async fn load_conversations(&self, scope: UserRef) -> Result<Arc<Vec<Conversation>>> {
        let list = Arc::new(self.backend.list_conversations(scope).await?);
        self.cache
            .write(CacheKey::Conversations(scope), CacheValue::Conversations(list.clone()))?;
        tracing::debug!(%scope, count = list.len(), "Loaded conversations");
        Ok(list)
    }

    /// Fetch a conversation's messages and install them.
    ///
    /// Placeholders of sends still in flight are carried over so a refetch
    /// never hides a pending message. A placeholder a push already replaced
    /// stays replaced; the write response collapses any overlap later.
    pub async fn load_messages(&self, conversation: ConversationId) -> Result<Arc<Vec<Message>>> {
        let mut list = self.backend.list_messages(conversation).await?;
        let current = self.cache.messages(conversation);
        let carried = self
            .tracker
            .outstanding(conversation)
            .into_iter()
            .filter(|send| {
                current
                    .as_ref()
                    .map_or(true, |current| current.iter().any(|m| m.id == send.id))
            })
            .map(|send| send.placeholder());
        list.extend(carried);
        let list = Arc::new(list);
        self.cache
            .write(CacheKey::Messages(conversation), CacheValue::Messages(list.clone()))?;
        tracing::debug!(%conversation, count = list.len(), "Loaded messages");
        Ok(list)
    }

    /// Fetch a recipient's notifications and install them.
    pub async fn load_notifications(&self, recipient: UserRef) -> Result<Arc<Vec<Notification>>> {
        let list = Arc::new(self.backend.list_notifications(recipient).await?);
        self.cache.write(
            CacheKey::Notifications(recipient),
            CacheValue::Notifications(list.clone()),
        )?;
        tracing::debug!(%recipient, count = list.len(), "Loaded notifications");
        Ok(list)
    }

    /// Refetch every watched key that is stale or was never loaded.
    ///
    /// Every key is attempted; the first failure is returned.
    pub async fn refetch_stale(&self) -> Result<usize> {
        let keys = self.cache.stale_watched_keys();
        let mut refetched = 0;
        let mut first_error = None;

        for key in keys {
            let result = match key {
                CacheKey::Conversations(scope) => self.load_conversations(scope).await.map(|_| ()),
                CacheKey::Messages(id) => self.load_messages(id).await.map(|_| ()),
                CacheKey::Notifications(recipient) => {
                    self.load_notifications(recipient).await.map(|_| ())
                }
            };
            match result {
                Ok(()) => refetched += 1,
                Err(e) => {
                    tracing::warn!(?key, error = %e, "Refetch failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(refetched),
        }
    }

    // --- Writes ---

    /// Send a message optimistically.
    ///
    /// Dropping the returned future cancels the write and removes the
    /// placeholder. Use [`SyncClient::spawn_send`] when the send must
    /// outlive the surface that started it.
    pub async fn send_message(&self, request: SendMessage) -> Result<Message> {
        let write = self.backend.send_message(&request);
        self.tracker.send(&self.cache, &request, write).await
    }

    /// Send a message optimistically on its own task.
    ///
    /// The placeholder is in the cache when this returns. The write runs to
    /// completion and confirms or rolls back the placeholder whether or not
    /// the handle is awaited, so leaving a screen never loses a message.
    /// Needs a tokio runtime.
    pub fn spawn_send(&self, request: SendMessage) -> Result<JoinHandle<Result<Message>>>
    where
        B: 'static,
    {
        request.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| SyncError::InvalidOperation("no tokio runtime".into()))?;

        let placeholder = self.tracker.begin(&self.cache, &request);
        let tracker = self.tracker.clone();
        let cache = self.cache.clone();
        let backend = self.backend.clone();

        Ok(runtime.spawn(async move {
            let result = backend.send_message(&request).await;
            tracker.settle(&cache, placeholder.id, result)
        }))
    }

    /// Open a direct conversation and surface it in the session user's list.
    pub async fn create_conversation(&self, request: NewConversation) -> Result<Conversation> {
        let user = self.require_user()?;
        let conversation = self.backend.create_conversation(&request).await?;
        self.cache
            .patch_conversations(user, |list| conversation_created(list, &conversation));
        Ok(conversation)
    }

    pub async fn create_group(&self, request: NewGroup) -> Result<Conversation> {
        let user = self.require_user()?;
        let group = self.backend.create_group(&request).await?;
        self.cache
            .patch_conversations(user, |list| conversation_created(list, &group));
        Ok(group)
    }

    /// Leave a group; it stays cached but hidden.
    pub async fn leave_group(&self, conversation: ConversationId) -> Result<()> {
        let user = self.require_user()?;
        self.backend.leave_group(conversation, user).await?;
        self.cache
            .patch_conversations(user, |list| hide_conversation(list, conversation));
        Ok(())
    }

    /// Mark a conversation read; applies the server's remaining count.
    pub async fn mark_as_read(&self, conversation: ConversationId) -> Result<u32> {
        let user = self.require_user()?;
        let unread = self.backend.mark_as_read(conversation, user).await?;
        self.cache
            .patch_conversations(user, |list| messages_read(list, conversation, unread));
        Ok(unread)
    }

    pub async fn acknowledge_notification(&self, id: NotificationId) -> Result<()> {
        let user = self.require_user()?;
        self.backend.mark_notification_read(id).await?;
        self.cache
            .patch_notifications(user, |list| notification_read(list, id));
        Ok(())
    }

    pub async fn delete_notification(&self, id: NotificationId) -> Result<()> {
        let user = self.require_user()?;
        self.backend.delete_notification(id).await?;
        self.cache
            .patch_notifications(user, |list| notification_removed(list, id));
        Ok(())
    }
}
