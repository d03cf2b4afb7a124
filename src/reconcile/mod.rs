//! Event reconciliation.
//!
//! Each submodule holds pure `(current, payload) -> next` functions for one
//! cached list shape. They are deterministic, idempotent against duplicate
//! delivery, and hand back the input `Arc` untouched when an event changes
//! nothing, which lets the cache skip the install and the notification.
//!
//! [`apply_event`] is the one impure edge: it routes a typed event to the
//! cache keys it affects and runs the matching functions through
//! [`CacheStore`] patches.

mod conversations;
mod messages;
mod notifications;

pub use conversations::{
    bump_unread, conversation_created, conversation_list_changed, conversation_updated,
    hide_conversation, messages_read,
};
pub use messages::{confirm_message, insert_placeholder, new_message, rollback_message};
pub use notifications::{notification_created, notification_read, notification_removed};

use crate::cache::CacheStore;
use crate::events::PushEvent;
use crate::registry::Channel;
use crate::types::{Conversation, UserRef};
use std::sync::Arc;

/// Patch the conversation list of `owner`, or every cached list when the
/// event arrived on a channel without an owner.
fn patch_lists<F>(cache: &CacheStore, owner: Option<UserRef>, updater: F) -> bool
where
    F: Fn(Arc<Vec<Conversation>>) -> Arc<Vec<Conversation>>,
{
    match owner {
        Some(owner) => cache.patch_conversations(owner, updater),
        None => cache.patch_all_conversation_lists(updater) > 0,
    }
}

/// Apply one pushed event to the cache. Returns whether anything changed.
pub fn apply_event(cache: &CacheStore, channel: &Channel, event: &PushEvent) -> bool {
    let owner = channel.owner();

    let changed = match event {
        PushEvent::NewMessage { message } => {
            if let Some(expected) = channel.conversation() {
                if expected != message.conversation_id {
                    tracing::warn!(
                        channel = %channel,
                        conversation = %message.conversation_id,
                        "Message for another conversation; applying to its own list"
                    );
                }
            }
            cache.patch_messages(message.conversation_id, |list| new_message(list, message))
        }

        PushEvent::ConversationCreated { conversation }
        | PushEvent::GroupCreated { conversation } => {
            patch_lists(cache, owner, |list| conversation_created(list, conversation))
        }

        PushEvent::ConversationUpdated { conversation } => {
            patch_lists(cache, owner, |list| conversation_updated(list, conversation))
        }

        PushEvent::ConversationListChanged { conversation } => {
            patch_lists(cache, owner, |list| conversation_list_changed(list, conversation))
        }

        PushEvent::MessagesRead {
            conversation_id,
            unread_count,
            ..
        } => patch_lists(cache, owner, |list| {
            messages_read(list, *conversation_id, *unread_count)
        }),

        PushEvent::NotificationCreated { notification } => {
            let Some(recipient) = owner else {
                tracing::debug!(channel = %channel, "Notification outside a mailbox channel, ignored");
                return false;
            };
            let inserted = cache.patch_notifications(recipient, |list| {
                notification_created(list, notification)
            });
            // Only a first delivery counts towards unread.
            if inserted {
                if let Some(conversation_id) = notification.conversation_id {
                    cache.patch_conversations(recipient, |list| bump_unread(list, conversation_id));
                }
            }
            inserted
        }
    };

    tracing::trace!(channel = %channel, event = %event.kind(), changed, "Reconciled event");
    changed
}
