//! Notification list reconciliation.

use crate::types::{Notification, NotificationId};
use std::sync::Arc;

/// Prepend unless already present by id.
pub fn notification_created(
    list: Arc<Vec<Notification>>,
    notification: &Notification,
) -> Arc<Vec<Notification>> {
    if list.iter().any(|n| n.id == notification.id) {
        return list;
    }
    let mut next = Vec::with_capacity(list.len() + 1);
    next.push(notification.clone());
    next.extend_from_slice(&list);
    Arc::new(next)
}

/// Mark one notification read.
pub fn notification_read(list: Arc<Vec<Notification>>, id: NotificationId) -> Arc<Vec<Notification>> {
    match list.iter().position(|n| n.id == id && !n.read) {
        Some(index) => {
            let mut next = (*list).clone();
            next[index].read = true;
            Arc::new(next)
        }
        None => list,
    }
}

/// Remove a deleted notification.
pub fn notification_removed(list: Arc<Vec<Notification>>, id: NotificationId) -> Arc<Vec<Notification>> {
    if !list.iter().any(|n| n.id == id) {
        return list;
    }
    Arc::new(list.iter().filter(|n| n.id != id).cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NotificationCategory, Timestamp};

    fn notification(id: u64) -> Notification {
        Notification {
            id: NotificationId(id),
            category: NotificationCategory::Reservation,
            conversation_id: None,
            cast_id: Some(4),
            guest_id: None,
            body: None,
            read: false,
            created_at: Timestamp(id as i64),
        }
    }

    #[test]
    fn test_created_prepends_once() {
        let list = Arc::new(vec![notification(1)]);
        let next = notification_created(list, &notification(2));
        assert_eq!(next[0].id, NotificationId(2));

        let again = notification_created(next.clone(), &notification(2));
        assert!(Arc::ptr_eq(&next, &again));
    }

    #[test]
    fn test_read_and_remove() {
        let list = Arc::new(vec![notification(1), notification(2)]);

        let read = notification_read(list, NotificationId(2));
        assert!(read[1].read);
        let again = notification_read(read.clone(), NotificationId(2));
        assert!(Arc::ptr_eq(&read, &again));

        let removed = notification_removed(read, NotificationId(1));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, NotificationId(2));
    }
}
