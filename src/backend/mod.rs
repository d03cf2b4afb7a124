//! Backend collaborator interface.
//!
//! The REST service that owns the data. Writes return the authoritative
//! record; reads return lists in the same shape the cache stores them, so
//! consumers cannot tell a fetched value from a reconciled one.
//!
//! Methods return `impl Future + Send` so callers can drive them on any
//! executor; [`HttpBackend`] (feature `http`) is the production
//! implementation, tests use in-memory fakes.

#[cfg(feature = "http")]
mod http;
mod types;

#[cfg(feature = "http")]
pub use http::HttpBackend;
pub use types::{NewConversation, NewGroup, SendMessage};

use crate::error::Result;
use crate::types::{Conversation, ConversationId, Message, Notification, NotificationId, UserRef};
use std::future::Future;

pub trait Backend: Send + Sync {
    /// Post a message; returns the server record.
    fn send_message(&self, request: &SendMessage) -> impl Future<Output = Result<Message>> + Send;

    /// Open (or fetch the existing) direct conversation between two users.
    fn create_conversation(
        &self,
        request: &NewConversation,
    ) -> impl Future<Output = Result<Conversation>> + Send;

    /// Mark a conversation read for `reader`; returns the remaining unread count.
    fn mark_as_read(
        &self,
        conversation: ConversationId,
        reader: UserRef,
    ) -> impl Future<Output = Result<u32>> + Send;

    fn create_group(&self, request: &NewGroup) -> impl Future<Output = Result<Conversation>> + Send;

    fn leave_group(
        &self,
        conversation: ConversationId,
        member: UserRef,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Conversation list for a user, most recent activity first.
    fn list_conversations(
        &self,
        scope: UserRef,
    ) -> impl Future<Output = Result<Vec<Conversation>>> + Send;

    /// Messages of a conversation, oldest first.
    fn list_messages(
        &self,
        conversation: ConversationId,
    ) -> impl Future<Output = Result<Vec<Message>>> + Send;

    /// Notifications of a recipient, newest first.
    fn list_notifications(
        &self,
        recipient: UserRef,
    ) -> impl Future<Output = Result<Vec<Notification>>> + Send;

    fn mark_notification_read(&self, id: NotificationId) -> impl Future<Output = Result<()>> + Send;

    fn delete_notification(&self, id: NotificationId) -> impl Future<Output = Result<()>> + Send;
}
