//! Write request bodies.

use crate::error::{Result, SyncError};
use crate::types::{ConversationId, MessageBody, UserRef};
use serde::{Deserialize, Serialize};

/// A message to post.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessage {
    pub conversation_id: ConversationId,
    pub sender: UserRef,
    #[serde(flatten)]
    pub body: MessageBody,
}

impl SendMessage {
    pub fn new(conversation_id: ConversationId, sender: UserRef, body: MessageBody) -> Self {
        Self {
            conversation_id,
            sender,
            body,
        }
    }

    /// Reject drafts the server would refuse anyway.
    pub fn validate(&self) -> Result<()> {
        if self.conversation_id.0 == 0 {
            return Err(SyncError::InvalidOperation("message without a conversation".into()));
        }
        if self.body.is_empty() {
            return Err(SyncError::InvalidOperation("empty message body".into()));
        }
        Ok(())
    }
}

/// Direct conversation between a guest and a cast.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewConversation {
    pub guest_id: u64,
    pub cast_id: u64,
}

/// Group conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
    pub creator: UserRef,
    pub members: Vec<UserRef>,
}
