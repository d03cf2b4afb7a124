//! Conversation list reconciliation.

use crate::types::{Conversation, ConversationId, ConversationPatch};
use std::sync::Arc;

fn position(list: &[Conversation], id: ConversationId) -> Option<usize> {
    list.iter().position(|c| c.id == id)
}

fn prepend(list: &[Conversation], conversation: Conversation) -> Arc<Vec<Conversation>> {
    let mut next = Vec::with_capacity(list.len() + 1);
    next.push(conversation);
    next.extend_from_slice(list);
    Arc::new(next)
}

/// Merge changed fields by id; an unknown id surfaces at the head.
pub fn conversation_updated(
    list: Arc<Vec<Conversation>>,
    patch: &ConversationPatch,
) -> Arc<Vec<Conversation>> {
    match position(&list, patch.id) {
        Some(index) => {
            let merged = patch.merge_into(&list[index]);
            if merged == list[index] {
                return list;
            }
            let mut next = (*list).clone();
            next[index] = merged;
            Arc::new(next)
        }
        None => prepend(&list, patch.clone().into_conversation()),
    }
}

/// New activity: replace by id and move to the head.
pub fn conversation_list_changed(
    list: Arc<Vec<Conversation>>,
    conversation: &Conversation,
) -> Arc<Vec<Conversation>> {
    if list.first() == Some(conversation) {
        return list;
    }
    let rest: Vec<Conversation> = list
        .iter()
        .filter(|c| c.id != conversation.id)
        .cloned()
        .collect();
    prepend(&rest, conversation.clone())
}

/// Prepend unless already listed. Covers both direct and group creation.
pub fn conversation_created(
    list: Arc<Vec<Conversation>>,
    conversation: &Conversation,
) -> Arc<Vec<Conversation>> {
    if position(&list, conversation.id).is_some() {
        return list;
    }
    prepend(&list, conversation.clone())
}

/// Set the unread counter to the server's value.
pub fn messages_read(
    list: Arc<Vec<Conversation>>,
    conversation_id: ConversationId,
    unread_count: u32,
) -> Arc<Vec<Conversation>> {
    update_at(list, conversation_id, |c| {
        if c.unread_count == unread_count {
            return false;
        }
        c.unread_count = unread_count;
        true
    })
}

/// One more unread message in a conversation.
pub fn bump_unread(list: Arc<Vec<Conversation>>, conversation_id: ConversationId) -> Arc<Vec<Conversation>> {
    update_at(list, conversation_id, |c| {
        c.unread_count = c.unread_count.saturating_add(1);
        true
    })
}

/// Hide a conversation (left group). Entries are never removed.
pub fn hide_conversation(list: Arc<Vec<Conversation>>, conversation_id: ConversationId) -> Arc<Vec<Conversation>> {
    update_at(list, conversation_id, |c| {
        if c.hidden {
            return false;
        }
        c.hidden = true;
        true
    })
}

/// Apply `edit` to the conversation with `id`; keeps the input reference when
/// the id is unknown or `edit` reports no change.
fn update_at<F>(list: Arc<Vec<Conversation>>, id: ConversationId, edit: F) -> Arc<Vec<Conversation>>
where
    F: FnOnce(&mut Conversation) -> bool,
{
    let Some(index) = position(&list, id) else {
        return list;
    };
    let mut edited = list[index].clone();
    if !edit(&mut edited) {
        return list;
    }
    let mut next = (*list).clone();
    next[index] = edited;
    Arc::new(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConversationKind, UserRef};

    fn conv(id: u64, unread: u32) -> Conversation {
        let mut c = Conversation::new(
            ConversationId(id),
            ConversationKind::Direct,
            vec![UserRef::guest(1), UserRef::cast(id)],
        );
        c.unread_count = unread;
        c
    }

    fn ids(list: &[Conversation]) -> Vec<u64> {
        list.iter().map(|c| c.id.0).collect()
    }

    #[test]
    fn test_updated_merges_in_place() {
        let list = Arc::new(vec![conv(1, 0), conv(2, 0)]);
        let patch = ConversationPatch {
            id: ConversationId(2),
            title: Some("Mika".into()),
            ..Default::default()
        };

        let next = conversation_updated(list, &patch);

        assert_eq!(ids(&next), vec![1, 2]);
        assert_eq!(next[1].title.as_deref(), Some("Mika"));
    }

    #[test]
    fn test_updated_unknown_prepends() {
        let list = Arc::new(vec![conv(1, 0)]);
        let patch = ConversationPatch {
            id: ConversationId(9),
            unread_count: Some(2),
            ..Default::default()
        };

        let next = conversation_updated(list, &patch);

        assert_eq!(ids(&next), vec![9, 1]);
        assert_eq!(next[0].unread_count, 2);
    }

    #[test]
    fn test_updated_without_change_keeps_reference() {
        let list = Arc::new(vec![conv(1, 4)]);
        let patch = ConversationPatch {
            id: ConversationId(1),
            unread_count: Some(4),
            ..Default::default()
        };
        let next = conversation_updated(list.clone(), &patch);
        assert!(Arc::ptr_eq(&list, &next));
    }

    #[test]
    fn test_list_changed_moves_to_head() {
        let list = Arc::new(vec![conv(1, 0), conv(2, 0), conv(3, 0)]);
        let mut updated = conv(3, 1);
        updated.last_message = Some("hello".into());

        let next = conversation_list_changed(list, &updated);
        assert_eq!(ids(&next), vec![3, 1, 2]);

        let again = conversation_list_changed(next.clone(), &updated);
        assert!(Arc::ptr_eq(&next, &again));
    }

    #[test]
    fn test_created_is_idempotent() {
        let list = Arc::new(vec![conv(1, 0)]);
        let next = conversation_created(list, &conv(2, 0));
        assert_eq!(ids(&next), vec![2, 1]);

        let again = conversation_created(next.clone(), &conv(2, 0));
        assert!(Arc::ptr_eq(&next, &again));
    }

    #[test]
    fn test_messages_read_sets_explicit_value() {
        let list = Arc::new(vec![conv(7, 5), conv(8, 3)]);

        let next = messages_read(list, ConversationId(7), 0);
        assert_eq!(next[0].unread_count, 0);
        assert_eq!(next[1].unread_count, 3);

        // Another device still has one unread.
        let next = messages_read(next, ConversationId(7), 1);
        assert_eq!(next[0].unread_count, 1);
    }

    #[test]
    fn test_bump_and_hide() {
        let list = Arc::new(vec![conv(1, 0)]);
        let next = bump_unread(list, ConversationId(1));
        assert_eq!(next[0].unread_count, 1);

        let unknown = bump_unread(next.clone(), ConversationId(99));
        assert!(Arc::ptr_eq(&next, &unknown));

        let hidden = hide_conversation(next, ConversationId(1));
        assert!(hidden[0].hidden);
        let again = hide_conversation(hidden.clone(), ConversationId(1));
        assert!(Arc::ptr_eq(&hidden, &again));
    }
}
