//! Channel names and subscription handles.

use crate::error::{Result, SyncError};
use crate::events::EventKind;
use crate::types::{ConversationId, Role, UserRef};
use std::fmt;
use std::sync::Weak;

use super::manager::RegistryShared;

/// A push channel scoped to one entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    /// A direct conversation.
    Conversation(ConversationId),
    /// A group conversation.
    Group(ConversationId),
    /// A user's mailbox: list changes and notifications.
    Mailbox(UserRef),
}

impl Channel {
    /// Broker channel name.
    pub fn name(&self) -> String {
        match self {
            Channel::Conversation(id) => format!("private-chat.{}", id.0),
            Channel::Group(id) => format!("private-group.{}", id.0),
            Channel::Mailbox(user) => format!("private-{}.{}", user.role.as_str(), user.id),
        }
    }

    /// Parse a broker channel name.
    pub fn parse(name: &str) -> Option<Self> {
        let rest = name.strip_prefix("private-")?;
        let (scope, id) = rest.split_once('.')?;
        let id: u64 = id.parse().ok()?;
        match scope {
            "chat" => Some(Channel::Conversation(ConversationId(id))),
            "group" => Some(Channel::Group(ConversationId(id))),
            "guest" => Some(Channel::Mailbox(UserRef { role: Role::Guest, id })),
            "cast" => Some(Channel::Mailbox(UserRef { role: Role::Cast, id })),
            _ => None,
        }
    }

    /// Reject channels derived from an unset (zero) id.
    pub fn validate(&self) -> Result<()> {
        let id = match self {
            Channel::Conversation(id) | Channel::Group(id) => id.0,
            Channel::Mailbox(user) => user.id,
        };
        if id == 0 {
            return Err(SyncError::InvalidChannel(self.name()));
        }
        Ok(())
    }

    /// Mailbox owner, if this is a mailbox channel.
    pub fn owner(&self) -> Option<UserRef> {
        match self {
            Channel::Mailbox(user) => Some(*user),
            _ => None,
        }
    }

    /// Conversation, if this is a conversation or group channel.
    pub fn conversation(&self) -> Option<ConversationId> {
        match self {
            Channel::Conversation(id) | Channel::Group(id) => Some(*id),
            Channel::Mailbox(_) => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Unique identifier for one acquired handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandlerId(pub u64);

/// One consumer's interest in one event on one channel.
///
/// Released explicitly with [`SubscriptionHandle::release`] or on drop.
pub struct SubscriptionHandle {
    pub(super) id: HandlerId,
    pub(super) channel: Channel,
    pub(super) event: EventKind,
    pub(super) registry: Weak<RegistryShared>,
    pub(super) released: bool,
}

impl SubscriptionHandle {
    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn event(&self) -> EventKind {
        self.event
    }

    /// Handlers currently holding this handle's channel open.
    pub fn ref_count(&self) -> usize {
        self.registry
            .upgrade()
            .map_or(0, |registry| registry.handler_count(&self.channel))
    }

    /// Release interest; leaves the channel if this was the last handler.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Some(registry) = self.registry.upgrade() {
            registry.release(self.channel, self.id);
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .field("event", &self.event)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names_roundtrip() {
        for channel in [
            Channel::Conversation(ConversationId(5)),
            Channel::Group(ConversationId(12)),
            Channel::Mailbox(UserRef::guest(3)),
            Channel::Mailbox(UserRef::cast(8)),
        ] {
            assert_eq!(Channel::parse(&channel.name()), Some(channel));
        }
        assert_eq!(Channel::parse("presence-room.1"), None);
        assert_eq!(Channel::parse("private-chat.abc"), None);
    }

    #[test]
    fn test_zero_id_rejected() {
        assert!(Channel::Conversation(ConversationId(0)).validate().is_err());
        assert!(Channel::Mailbox(UserRef::cast(0)).validate().is_err());
        assert!(Channel::Group(ConversationId(1)).validate().is_ok());
    }
}
