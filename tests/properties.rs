//! Property tests for the reconcilers.

use proptest::prelude::*;
use rendezvous::reconcile::{
    conversation_created, messages_read, new_message, notification_created,
};
use rendezvous::{
    Conversation, ConversationId, ConversationKind, Message, MessageBody, MessageId, Notification,
    NotificationCategory, NotificationId, Timestamp, UserRef,
};
use std::collections::HashSet;
use std::sync::Arc;

fn message(id: u64, sender: u64, text: u8) -> Message {
    Message {
        id: MessageId::Server(id),
        conversation_id: ConversationId(5),
        sender: UserRef::guest(sender),
        body: MessageBody::text(format!("t{}", text)),
        created_at: Timestamp(id as i64),
        optimistic: false,
    }
}

fn messages() -> impl Strategy<Value = Vec<Message>> {
    prop::collection::vec((1u64..20, 1u64..3, 0u8..3), 0..30)
        .prop_map(|raw| raw.into_iter().map(|(id, s, t)| message(id, s, t)).collect())
}

fn apply_all(events: &[Message]) -> Arc<Vec<Message>> {
    events
        .iter()
        .fold(Arc::new(Vec::new()), |list, m| new_message(list, m))
}

proptest! {
    #[test]
    fn prop_redelivery_is_idempotent(events in messages()) {
        let once = apply_all(&events);
        let mut doubled = events.clone();
        doubled.extend(events.iter().cloned());
        let twice = apply_all(&doubled);
        prop_assert_eq!(&*once, &*twice);
    }

    #[test]
    fn prop_server_ids_are_unique(events in messages()) {
        let list = apply_all(&events);
        let ids: HashSet<_> = list.iter().map(|m| m.id).collect();
        prop_assert_eq!(ids.len(), list.len());
    }

    #[test]
    fn prop_placeholders_never_duplicate(
        sends in prop::collection::vec((1u64..3, 0u8..3), 1..10),
        seed in 100u64..200,
    ) {
        // Every send leaves a placeholder; every push of its server record
        // must consume one instead of appending.
        let mut list = Arc::new(Vec::new());
        for (i, (sender, text)) in sends.iter().enumerate() {
            let mut placeholder = message(0, *sender, *text);
            placeholder.id = MessageId::Pending(i as u64 + 1);
            placeholder.optimistic = true;
            list = rendezvous::reconcile::insert_placeholder(list, &placeholder);
        }
        for (i, (sender, text)) in sends.iter().enumerate() {
            list = new_message(list, &message(seed + i as u64, *sender, *text));
        }

        prop_assert_eq!(list.len(), sends.len());
        prop_assert!(list.iter().all(|m| !m.optimistic));
    }

    #[test]
    fn prop_created_conversations_listed_once(ids in prop::collection::vec(1u64..10, 0..40)) {
        let list = ids.iter().fold(Arc::new(Vec::new()), |list, id| {
            conversation_created(list, &Conversation::new(ConversationId(*id), ConversationKind::Direct, vec![]))
        });
        let unique: HashSet<_> = ids.iter().collect();
        prop_assert_eq!(list.len(), unique.len());
        if let Some(last) = ids.last() {
            if ids.iter().filter(|id| *id == last).count() == 1 {
                prop_assert_eq!(list[0].id, ConversationId(*last));
            }
        }
    }

    #[test]
    fn prop_messages_read_touches_only_target(
        counts in prop::collection::vec(0u32..50, 1..10),
        target in 0usize..10,
        unread in 0u32..5,
    ) {
        let list: Vec<Conversation> = counts
            .iter()
            .enumerate()
            .map(|(i, count)| {
                let mut c = Conversation::new(ConversationId(i as u64 + 1), ConversationKind::Direct, vec![]);
                c.unread_count = *count;
                c
            })
            .collect();
        let target = target % counts.len();

        let next = messages_read(Arc::new(list.clone()), ConversationId(target as u64 + 1), unread);

        for (i, c) in next.iter().enumerate() {
            if i == target {
                prop_assert_eq!(c.unread_count, unread);
            } else {
                prop_assert_eq!(c.unread_count, list[i].unread_count);
            }
        }
    }

    #[test]
    fn prop_notifications_deduplicated(ids in prop::collection::vec(1u64..15, 0..40)) {
        let list = ids.iter().fold(Arc::new(Vec::new()), |list, id| {
            notification_created(list, &Notification {
                id: NotificationId(*id),
                category: NotificationCategory::System,
                conversation_id: None,
                cast_id: None,
                guest_id: None,
                body: None,
                read: false,
                created_at: Timestamp(0),
            })
        });
        let unique: HashSet<_> = ids.iter().collect();
        prop_assert_eq!(list.len(), unique.len());
    }
}
