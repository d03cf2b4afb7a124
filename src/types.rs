//! Core domain types shared by the cache, reconcilers and wire events.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Server identifier of a conversation (direct or group).
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub u64);

impl fmt::Debug for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConversationId({})", self.0)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server identifier of a notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub u64);

/// The two user roles of the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Guest,
    Cast,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Cast => "cast",
        }
    }
}

/// A guest or a cast. Senders, list scopes and notification recipients are
/// all user references, so "guest xor cast" holds by construction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRef {
    pub role: Role,
    pub id: u64,
}

impl UserRef {
    pub fn guest(id: u64) -> Self {
        Self { role: Role::Guest, id }
    }

    pub fn cast(id: u64) -> Self {
        Self { role: Role::Cast, id }
    }
}

impl fmt::Debug for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role.as_str(), self.id)
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role.as_str(), self.id)
    }
}

/// Milliseconds since Unix epoch.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_millis() as i64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Logical arrival order of cache installations.
///
/// Server timestamps are not monotonic relative to event arrival, so the
/// cache orders installs by this counter instead.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Revision(pub u64);

impl Revision {
    pub fn next(self) -> Self {
        Revision(self.0 + 1)
    }
}

impl fmt::Debug for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rev({})", self.0)
    }
}

/// Identifier of a message.
///
/// Server ids travel as JSON numbers. Client placeholders travel as
/// `"tmp-<n>"` strings so they can never collide with a server id.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageId {
    Server(u64),
    Pending(u64),
}

impl MessageId {
    pub fn is_pending(&self) -> bool {
        matches!(self, MessageId::Pending(_))
    }

    pub fn server(&self) -> Option<u64> {
        match self {
            MessageId::Server(id) => Some(*id),
            MessageId::Pending(_) => None,
        }
    }
}

const PENDING_PREFIX: &str = "tmp-";

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Server(id) => write!(f, "MessageId({})", id),
            MessageId::Pending(id) => write!(f, "MessageId({}{})", PENDING_PREFIX, id),
        }
    }
}

impl Serialize for MessageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MessageId::Server(id) => serializer.serialize_u64(*id),
            MessageId::Pending(id) => serializer.collect_str(&format_args!("{}{}", PENDING_PREFIX, id)),
        }
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(id) => Ok(MessageId::Server(id)),
            Repr::Text(text) => {
                if let Some(rest) = text.strip_prefix(PENDING_PREFIX) {
                    rest.parse()
                        .map(MessageId::Pending)
                        .map_err(serde::de::Error::custom)
                } else {
                    // Some endpoints stringify numeric ids.
                    text.parse()
                        .map(MessageId::Server)
                        .map_err(serde::de::Error::custom)
                }
            }
        }
    }
}

/// Message content: text, an image attachment, a gift, or a mix.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gift_id: Option<u64>,
}

impl MessageBody {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self {
            image_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn gift(gift_id: u64) -> Self {
        Self {
            gift_id: Some(gift_id),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.as_deref().map_or(true, str::is_empty)
            && self.image_url.is_none()
            && self.gift_id.is_none()
    }
}

/// A chat message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender: UserRef,
    pub body: MessageBody,
    pub created_at: Timestamp,
    /// Set on client placeholders until the server record replaces them.
    #[serde(default)]
    pub optimistic: bool,
}

impl Message {
    /// True when a server record with this sender and body could be this message.
    pub fn same_content(&self, sender: &UserRef, body: &MessageBody) -> bool {
        self.sender == *sender && self.body == *body
    }
}

/// Direct (two participants) or group conversation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    #[default]
    Direct,
    Group,
}

/// A conversation as listed for one user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    #[serde(default)]
    pub kind: ConversationKind,
    #[serde(default)]
    pub participants: Vec<UserRef>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_activity: Option<Timestamp>,
    #[serde(default)]
    pub unread_count: u32,
    /// Conversations are never deleted client-side, only hidden.
    #[serde(default)]
    pub hidden: bool,
}

impl Conversation {
    pub fn new(id: ConversationId, kind: ConversationKind, participants: Vec<UserRef>) -> Self {
        Self {
            id,
            kind,
            participants,
            title: None,
            avatar_url: None,
            last_message: None,
            last_activity: None,
            unread_count: 0,
            hidden: false,
        }
    }
}

/// Partial conversation update as pushed by `conversation-updated`.
///
/// Only `id` is guaranteed; every other field is applied when present.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationPatch {
    pub id: ConversationId,
    #[serde(default)]
    pub kind: Option<ConversationKind>,
    #[serde(default)]
    pub participants: Option<Vec<UserRef>>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_activity: Option<Timestamp>,
    #[serde(default)]
    pub unread_count: Option<u32>,
    #[serde(default)]
    pub hidden: Option<bool>,
}

impl ConversationPatch {
    /// Apply present fields on top of `base`.
    pub fn merge_into(&self, base: &Conversation) -> Conversation {
        let mut merged = base.clone();
        if let Some(kind) = self.kind {
            merged.kind = kind;
        }
        if let Some(ref participants) = self.participants {
            merged.participants = participants.clone();
        }
        if self.title.is_some() {
            merged.title = self.title.clone();
        }
        if self.avatar_url.is_some() {
            merged.avatar_url = self.avatar_url.clone();
        }
        if self.last_message.is_some() {
            merged.last_message = self.last_message.clone();
        }
        if self.last_activity.is_some() {
            merged.last_activity = self.last_activity;
        }
        if let Some(unread) = self.unread_count {
            merged.unread_count = unread;
        }
        if let Some(hidden) = self.hidden {
            merged.hidden = hidden;
        }
        merged
    }

    /// Build a full conversation for an update that references an unknown id.
    pub fn into_conversation(self) -> Conversation {
        let base = Conversation::new(self.id, self.kind.unwrap_or_default(), Vec::new());
        self.merge_into(&base)
    }
}

/// What a notification is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    Message,
    Reservation,
    Payment,
    Gift,
    System,
    #[serde(other)]
    Other,
}

/// A notification for one recipient.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub category: NotificationCategory,
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    #[serde(default)]
    pub cast_id: Option<u64>,
    #[serde(default)]
    pub guest_id: Option<u64>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub read: bool,
    pub created_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_id_wire_format() {
        let server: MessageId = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(server, MessageId::Server(42));

        let stringly: MessageId = serde_json::from_value(json!("42")).unwrap();
        assert_eq!(stringly, MessageId::Server(42));

        let pending: MessageId = serde_json::from_value(json!("tmp-7")).unwrap();
        assert_eq!(pending, MessageId::Pending(7));
        assert_eq!(serde_json::to_value(pending).unwrap(), json!("tmp-7"));

        assert!(serde_json::from_value::<MessageId>(json!("tmp-x")).is_err());
    }

    #[test]
    fn test_patch_merges_present_fields_only() {
        let mut base = Conversation::new(ConversationId(5), ConversationKind::Direct, vec![]);
        base.title = Some("Aiko".into());
        base.unread_count = 3;

        let patch = ConversationPatch {
            id: ConversationId(5),
            last_message: Some("see you".into()),
            ..Default::default()
        };
        let merged = patch.merge_into(&base);

        assert_eq!(merged.title.as_deref(), Some("Aiko"));
        assert_eq!(merged.last_message.as_deref(), Some("see you"));
        assert_eq!(merged.unread_count, 3);
    }

    #[test]
    fn test_body_emptiness() {
        assert!(MessageBody::default().is_empty());
        assert!(MessageBody::text("").is_empty());
        assert!(!MessageBody::gift(3).is_empty());
    }

    #[test]
    fn test_unknown_notification_category() {
        let n: Notification = serde_json::from_value(json!({
            "id": 1,
            "category": "tweet",
            "created_at": 0
        }))
        .unwrap();
        assert_eq!(n.category, NotificationCategory::Other);
        assert!(!n.read);
    }
}
