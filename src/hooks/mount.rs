use crate::cache::{CacheChange, CacheKey, CacheStore, CacheWatch};
use crate::error::Result;
use crate::events::{EventKind, PushEvent};
use crate::registry::{Channel, Handler, SubscriptionHandle, SubscriptionRegistry};
use crate::types::{Conversation, ConversationId, Message, Notification, Role, UserRef};
use parking_lot::RwLock;
use std::fmt::Debug;
use std::sync::Arc;

/// Presentation callback for events on a mounted entity.
pub type EventCallback = Arc<dyn Fn(&PushEvent) + Send + Sync>;

const MESSAGE_EVENTS: &[EventKind] = &[EventKind::NewMessage, EventKind::MessagesRead];

const LIST_EVENTS: &[EventKind] = &[
    EventKind::ConversationCreated,
    EventKind::ConversationUpdated,
    EventKind::ConversationListChanged,
    EventKind::MessagesRead,
    EventKind::GroupCreated,
];

const NOTIFICATION_EVENTS: &[EventKind] = &[EventKind::NotificationCreated];

/// What a hook is mounted on.
trait Target: Copy + PartialEq + Debug {
    fn channel(&self) -> Channel;
    fn events(&self) -> &'static [EventKind];
    fn key(&self) -> CacheKey;
}

/// Messages of one conversation, over its direct or group channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct MessagesTarget {
    channel: Channel,
    conversation: ConversationId,
}

impl Target for MessagesTarget {
    fn channel(&self) -> Channel {
        self.channel
    }

    fn events(&self) -> &'static [EventKind] {
        MESSAGE_EVENTS
    }

    fn key(&self) -> CacheKey {
        CacheKey::Messages(self.conversation)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ListTarget(UserRef);

impl Target for ListTarget {
    fn channel(&self) -> Channel {
        Channel::Mailbox(self.0)
    }

    fn events(&self) -> &'static [EventKind] {
        LIST_EVENTS
    }

    fn key(&self) -> CacheKey {
        CacheKey::Conversations(self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct NotificationsTarget(UserRef);

impl Target for NotificationsTarget {
    fn channel(&self) -> Channel {
        Channel::Mailbox(self.0)
    }

    fn events(&self) -> &'static [EventKind] {
        NOTIFICATION_EVENTS
    }

    fn key(&self) -> CacheKey {
        CacheKey::Notifications(self.0)
    }
}

/// Entry point for mounting hooks against one registry and cache.
#[derive(Clone)]
pub struct Hooks {
    registry: SubscriptionRegistry,
    cache: CacheStore,
}

impl Hooks {
    pub fn new(registry: SubscriptionRegistry, cache: CacheStore) -> Self {
        Self { registry, cache }
    }

    /// Messages of a direct conversation.
    pub fn use_conversation_messages(
        &self,
        id: ConversationId,
        on_event: EventCallback,
    ) -> Result<ConversationMessagesHook> {
        let target = MessagesTarget {
            channel: Channel::Conversation(id),
            conversation: id,
        };
        Ok(ConversationMessagesHook(self.mount(target, on_event)?))
    }

    /// Messages of a group conversation.
    pub fn use_group_messages(
        &self,
        id: ConversationId,
        on_event: EventCallback,
    ) -> Result<ConversationMessagesHook> {
        let target = MessagesTarget {
            channel: Channel::Group(id),
            conversation: id,
        };
        Ok(ConversationMessagesHook(self.mount(target, on_event)?))
    }

    /// Conversation list of a guest or a cast.
    pub fn use_conversation_list(
        &self,
        scope_id: u64,
        scope_type: Role,
        on_event: EventCallback,
    ) -> Result<ConversationListHook> {
        let target = ListTarget(UserRef {
            role: scope_type,
            id: scope_id,
        });
        Ok(ConversationListHook(self.mount(target, on_event)?))
    }

    /// Notifications of a recipient.
    pub fn use_notifications(
        &self,
        recipient: UserRef,
        on_event: EventCallback,
    ) -> Result<NotificationsHook> {
        let target = NotificationsTarget(recipient);
        Ok(NotificationsHook(self.mount(target, on_event)?))
    }

    fn mount<T: Target>(&self, target: T, on_event: EventCallback) -> Result<Mount<T>> {
        let callback = Arc::new(RwLock::new(on_event));
        let handles = acquire(&self.registry, &target, &callback)?;
        let watch = self.cache.watch(target.key());
        tracing::debug!(?target, "Mounted hook");
        Ok(Mount {
            target,
            registry: self.registry.clone(),
            cache: self.cache.clone(),
            callback,
            handles,
            watch,
        })
    }
}

fn acquire<T: Target>(
    registry: &SubscriptionRegistry,
    target: &T,
    callback: &Arc<RwLock<EventCallback>>,
) -> Result<Vec<SubscriptionHandle>> {
    let channel = target.channel();
    target
        .events()
        .iter()
        .map(|event| {
            let callback = callback.clone();
            let handler: Handler = Arc::new(move |event: &PushEvent| {
                let current = callback.read().clone();
                current(event);
            });
            registry.acquire(channel, *event, handler)
        })
        .collect()
}

/// Shared state of every hook kind.
struct Mount<T: Target> {
    target: T,
    registry: SubscriptionRegistry,
    cache: CacheStore,
    callback: Arc<RwLock<EventCallback>>,
    handles: Vec<SubscriptionHandle>,
    watch: CacheWatch,
}

impl<T: Target> Mount<T> {
    fn rerender(&mut self, target: T, on_event: EventCallback) -> Result<()> {
        if target == self.target {
            *self.callback.write() = on_event;
            return Ok(());
        }

        // Acquire first so a shared channel is never left and re-joined.
        let callback = Arc::new(RwLock::new(on_event));
        let handles = acquire(&self.registry, &target, &callback)?;
        let watch = self.cache.watch(target.key());

        self.cache.unwatch(&self.watch);
        self.handles = handles;
        self.watch = watch;
        self.callback = callback;
        tracing::debug!(from = ?self.target, to = ?target, "Remounted hook");
        self.target = target;
        Ok(())
    }

    fn needs_fetch(&self) -> bool {
        let key = self.target.key();
        self.cache.read(&key).is_none() || self.cache.is_stale(&key)
    }
}

impl<T: Target> Drop for Mount<T> {
    fn drop(&mut self) {
        self.cache.unwatch(&self.watch);
        tracing::debug!(hook = ?self.target, "Unmounted hook");
    }
}

macro_rules! hook_common {
    ($hook:ident) => {
        impl $hook {
            /// Changes to the mounted cache key.
            pub fn watch(&self) -> &CacheWatch {
                &self.0.watch
            }

            /// Drain pending changes; true if the value needs re-reading.
            pub fn changed(&self) -> bool {
                self.0
                    .watch
                    .drain()
                    .iter()
                    .any(|change| !matches!(change, CacheChange::Stale { .. }))
            }

            /// Whether the cached value is missing or stale.
            pub fn needs_fetch(&self) -> bool {
                self.0.needs_fetch()
            }

            /// Channel this hook holds open.
            pub fn channel(&self) -> Channel {
                self.0.target.channel()
            }

            /// Event subscriptions held by this hook.
            pub fn subscriptions(&self) -> usize {
                self.0.handles.len()
            }
        }
    };
}

/// A mounted `use_conversation_messages` / `use_group_messages`.
pub struct ConversationMessagesHook(Mount<MessagesTarget>);

impl ConversationMessagesHook {
    pub fn conversation(&self) -> ConversationId {
        self.0.target.conversation
    }

    /// Cached messages, oldest first.
    pub fn messages(&self) -> Option<Arc<Vec<Message>>> {
        self.0.cache.messages(self.conversation())
    }

    /// Re-render with `id`; only a different id re-subscribes.
    pub fn rerender(&mut self, id: ConversationId, on_event: EventCallback) -> Result<()> {
        let channel = match self.0.target.channel {
            Channel::Group(_) => Channel::Group(id),
            _ => Channel::Conversation(id),
        };
        let target = MessagesTarget {
            channel,
            conversation: id,
        };
        self.0.rerender(target, on_event)
    }
}

hook_common!(ConversationMessagesHook);

/// A mounted `use_conversation_list`.
pub struct ConversationListHook(Mount<ListTarget>);

impl ConversationListHook {
    pub fn scope(&self) -> UserRef {
        self.0.target.0
    }

    /// Cached conversations, visible ones only.
    pub fn conversations(&self) -> Option<Vec<Conversation>> {
        self.0
            .cache
            .conversations(self.scope())
            .map(|list| list.iter().filter(|c| !c.hidden).cloned().collect())
    }

    pub fn rerender(&mut self, scope_id: u64, scope_type: Role, on_event: EventCallback) -> Result<()> {
        let target = ListTarget(UserRef {
            role: scope_type,
            id: scope_id,
        });
        self.0.rerender(target, on_event)
    }
}

hook_common!(ConversationListHook);

/// A mounted `use_notifications`.
pub struct NotificationsHook(Mount<NotificationsTarget>);

impl NotificationsHook {
    pub fn recipient(&self) -> UserRef {
        self.0.target.0
    }

    /// Cached notifications, newest first.
    pub fn notifications(&self) -> Option<Arc<Vec<Notification>>> {
        self.0.cache.notifications(self.recipient())
    }

    pub fn unread(&self) -> usize {
        self.notifications()
            .map_or(0, |list| list.iter().filter(|n| !n.read).count())
    }

    pub fn rerender(&mut self, recipient: UserRef, on_event: EventCallback) -> Result<()> {
        self.0.rerender(NotificationsTarget(recipient), on_event)
    }
}

hook_common!(NotificationsHook);
