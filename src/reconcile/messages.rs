//! Message list reconciliation.

use crate::types::{Message, MessageId};
use std::sync::Arc;

/// Merge a pushed message into a conversation's message list.
///
/// - Already present by server id: unchanged.
/// - Matches an optimistic placeholder (same sender, same body): replaces
///   the oldest such placeholder in place.
/// - Otherwise appended.
pub fn new_message(list: Arc<Vec<Message>>, incoming: &Message) -> Arc<Vec<Message>> {
    if list.iter().any(|m| m.id == incoming.id) {
        return list;
    }

    let mut confirmed = incoming.clone();
    confirmed.optimistic = false;

    // Placeholders are appended in send order, so the first match is the
    // oldest outstanding send.
    let placeholder = list
        .iter()
        .position(|m| m.optimistic && m.same_content(&incoming.sender, &incoming.body));

    let mut next = (*list).clone();
    match placeholder {
        Some(index) => next[index] = confirmed,
        None => next.push(confirmed),
    }
    Arc::new(next)
}

/// Replace a placeholder with the write response for it.
///
/// If a push already delivered the server record (and consumed the
/// placeholder, or appended next to it), the two collapse into one entry.
pub fn confirm_message(
    list: Arc<Vec<Message>>,
    pending: MessageId,
    confirmed: &Message,
) -> Arc<Vec<Message>> {
    let mut record = confirmed.clone();
    record.optimistic = false;

    let at_pending = list.iter().position(|m| m.id == pending);
    let at_server = list.iter().position(|m| m.id == record.id);

    let mut next = (*list).clone();
    match (at_pending, at_server) {
        (Some(p), None) => next[p] = record,
        (Some(p), Some(s)) => {
            next[s] = record;
            next.remove(p);
        }
        (None, Some(s)) => {
            if next[s] == record {
                return list;
            }
            next[s] = record;
        }
        (None, None) => next.push(record),
    }
    Arc::new(next)
}

/// Drop a placeholder whose write failed.
pub fn rollback_message(list: Arc<Vec<Message>>, pending: MessageId) -> Arc<Vec<Message>> {
    match list.iter().position(|m| m.id == pending) {
        Some(index) => {
            let mut next = (*list).clone();
            next.remove(index);
            Arc::new(next)
        }
        None => list,
    }
}

/// Append a client placeholder.
pub fn insert_placeholder(list: Arc<Vec<Message>>, placeholder: &Message) -> Arc<Vec<Message>> {
    if list.iter().any(|m| m.id == placeholder.id) {
        return list;
    }
    let mut next = (*list).clone();
    next.push(placeholder.clone());
    Arc::new(next)
}
