//! Typed push events.
//!
//! Broker payloads are loosely typed JSON keyed by an event name. They are
//! decoded once, at the transport boundary, into [`PushEvent`]; everything
//! downstream matches on the variant instead of probing fields.

use crate::error::{Result, SyncError};
use crate::types::{Conversation, ConversationId, ConversationPatch, Message, Notification, UserRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Events emitted on push channels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum PushEvent {
    /// A message was posted to a conversation.
    NewMessage { message: Message },

    /// A direct conversation was created for this user.
    ConversationCreated { conversation: Conversation },

    /// Some fields of a conversation changed.
    ConversationUpdated { conversation: ConversationPatch },

    /// A conversation's position in the list changed (new activity).
    ConversationListChanged { conversation: Conversation },

    /// A reader acknowledged messages; `unread_count` is the server's value.
    MessagesRead {
        conversation_id: ConversationId,
        #[serde(default)]
        reader: Option<UserRef>,
        unread_count: u32,
    },

    /// A notification was delivered to the mailbox owner.
    NotificationCreated { notification: Notification },

    /// A group conversation was created with this user as a member.
    GroupCreated { conversation: Conversation },
}

impl PushEvent {
    /// Decode a broker event from its name and data object.
    pub fn decode(name: &str, data: serde_json::Value) -> Result<Self> {
        if EventKind::from_name(name).is_none() {
            return Err(SyncError::UnknownEvent(name.to_string()));
        }

        let tagged = serde_json::json!({ "event": name, "data": data });
        serde_json::from_value(tagged).map_err(|e| SyncError::MalformedPayload {
            event: name.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            PushEvent::NewMessage { .. } => EventKind::NewMessage,
            PushEvent::ConversationCreated { .. } => EventKind::ConversationCreated,
            PushEvent::ConversationUpdated { .. } => EventKind::ConversationUpdated,
            PushEvent::ConversationListChanged { .. } => EventKind::ConversationListChanged,
            PushEvent::MessagesRead { .. } => EventKind::MessagesRead,
            PushEvent::NotificationCreated { .. } => EventKind::NotificationCreated,
            PushEvent::GroupCreated { .. } => EventKind::GroupCreated,
        }
    }
}

/// Event names a handler can bind to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewMessage,
    ConversationCreated,
    ConversationUpdated,
    ConversationListChanged,
    MessagesRead,
    NotificationCreated,
    GroupCreated,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::NewMessage,
        EventKind::ConversationCreated,
        EventKind::ConversationUpdated,
        EventKind::ConversationListChanged,
        EventKind::MessagesRead,
        EventKind::NotificationCreated,
        EventKind::GroupCreated,
    ];

    /// Wire name of the event.
    pub fn name(self) -> &'static str {
        match self {
            EventKind::NewMessage => "new-message",
            EventKind::ConversationCreated => "conversation-created",
            EventKind::ConversationUpdated => "conversation-updated",
            EventKind::ConversationListChanged => "conversation-list-changed",
            EventKind::MessagesRead => "messages-read",
            EventKind::NotificationCreated => "notification-created",
            EventKind::GroupCreated => "group-created",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageId;
    use serde_json::json;

    #[test]
    fn test_decode_new_message() {
        let event = PushEvent::decode(
            "new-message",
            json!({
                "message": {
                    "id": 42,
                    "conversation_id": 5,
                    "sender": { "role": "guest", "id": 3 },
                    "body": { "text": "hi" },
                    "created_at": 1700000000000i64
                }
            }),
        )
        .unwrap();

        match event {
            PushEvent::NewMessage { message } => {
                assert_eq!(message.id, MessageId::Server(42));
                assert_eq!(message.sender, UserRef::guest(3));
                assert!(!message.optimistic);
            }
            other => panic!("Expected NewMessage, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_messages_read_without_reader() {
        let event = PushEvent::decode(
            "messages-read",
            json!({ "conversation_id": 7, "unread_count": 0 }),
        )
        .unwrap();
        assert_eq!(event.kind(), EventKind::MessagesRead);
    }

    #[test]
    fn test_decode_unknown_event() {
        let result = PushEvent::decode("typing", json!({}));
        assert!(matches!(result, Err(SyncError::UnknownEvent(_))));
    }

    #[test]
    fn test_decode_missing_required_field() {
        let result = PushEvent::decode("messages-read", json!({ "conversation_id": 7 }));
        assert!(matches!(result, Err(SyncError::MalformedPayload { .. })));
    }

    #[test]
    fn test_kind_names_roundtrip() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_name(kind.name()), Some(kind));
        }
    }
}
