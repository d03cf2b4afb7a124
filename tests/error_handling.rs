//! Error handling and edge case tests.

mod common;

use common::{client, noop, MockBackend};
use rendezvous::{
    CacheKey, CacheStore, CacheValue, Channel, ConnectionState, Connector, ConversationId,
    EventKind, LoopbackTransport, MessageBody, NewConversation, PushEvent, SendMessage,
    SubscriptionRegistry, SyncError, UserRef,
};
use serde_json::json;
use std::sync::Arc;

// --- Channel Errors ---

#[test]
fn test_zero_conversation_id_is_rejected() {
    let (client, transport) = client(MockBackend::new());

    let result = client
        .hooks()
        .use_conversation_messages(ConversationId(0), noop());

    assert!(matches!(result, Err(SyncError::InvalidChannel(name)) if name == "private-chat.0"));
    assert!(transport.calls().is_empty());
}

#[test]
fn test_connect_rejects_unset_user() {
    let (client, transport) = client(MockBackend::new());

    let result = client.connect(UserRef::guest(0));

    assert!(matches!(result, Err(SyncError::InvalidChannel(_))));
    assert_eq!(transport.connect_count(), 0);
    assert!(client.session_user().is_none());
}

#[test]
fn test_refused_connection_reports_error_state() {
    let transport = LoopbackTransport::new();
    transport.refuse_connections();
    let connector = Connector::new(Box::new(transport.clone()));

    let result = connector.connect();

    assert!(matches!(result, Err(SyncError::Transport(_))));
    assert_eq!(connector.state(), ConnectionState::Error);

    // The next attempt goes through.
    connector.connect().unwrap();
    assert_eq!(connector.state(), ConnectionState::Connected);
}

// --- Event Decoding ---

#[test]
fn test_unknown_event_name() {
    let result = PushEvent::decode("typing", json!({}));
    assert!(matches!(result, Err(SyncError::UnknownEvent(name)) if name == "typing"));
}

#[test]
fn test_malformed_payload() {
    let result = PushEvent::decode("messages-read", json!({ "conversation_id": "seven" }));
    assert!(matches!(
        result,
        Err(SyncError::MalformedPayload { event, .. }) if event == "messages-read"
    ));
}

#[test]
fn test_malformed_event_does_not_reach_handlers() {
    let transport = LoopbackTransport::new();
    let connector = Connector::new(Box::new(transport.clone()));
    connector.connect().unwrap();
    let registry = SubscriptionRegistry::new(connector);
    let hits = Arc::new(parking_lot::Mutex::new(0));
    let h = hits.clone();
    let _handle = registry
        .acquire(
            Channel::Conversation(ConversationId(5)),
            EventKind::NewMessage,
            Arc::new(move |_| *h.lock() += 1),
        )
        .unwrap();

    transport.emit("private-chat.5", "new-message", json!({ "message": { "id": 1 } }));

    assert_eq!(*hits.lock(), 0);
}

// --- Write Errors ---

#[tokio::test]
async fn test_writes_require_session() {
    let (client, _) = client(MockBackend::new());

    let result = client
        .create_conversation(NewConversation {
            guest_id: 3,
            cast_id: 8,
        })
        .await;

    assert!(matches!(result, Err(SyncError::NotConnected)));
}

#[tokio::test]
async fn test_backend_error_is_surfaced() {
    let (client, _) = client(MockBackend::new().failing());
    client.connect(UserRef::guest(3)).unwrap();

    let result = client.mark_as_read(ConversationId(7)).await;

    assert!(matches!(result, Err(SyncError::Backend { status: 500, .. })));
    // Nothing was patched.
    assert!(client
        .cache()
        .read(&CacheKey::Conversations(UserRef::guest(3)))
        .is_none());
}

#[tokio::test]
async fn test_empty_message_is_rejected_before_write() {
    let (client, _) = client(MockBackend::new());

    let result = client
        .send_message(SendMessage::new(
            ConversationId(5),
            UserRef::guest(3),
            MessageBody::default(),
        ))
        .await;

    assert!(matches!(result, Err(SyncError::InvalidOperation(_))));
    assert!(client.cache().messages(ConversationId(5)).is_none());
}

// --- Cache Errors ---

#[test]
fn test_write_with_mismatched_shape() {
    let cache = CacheStore::default();

    let result = cache.write(
        CacheKey::Messages(ConversationId(1)),
        CacheValue::Conversations(Arc::new(vec![])),
    );

    assert!(matches!(result, Err(SyncError::InvalidOperation(_))));
    assert!(cache.is_empty());
}

#[test]
fn test_invalidate_unknown_key_is_harmless() {
    let cache = CacheStore::default();
    let key = CacheKey::Notifications(UserRef::cast(1));

    cache.invalidate(&key);

    assert!(cache.read(&key).is_none());
    assert!(!cache.is_stale(&key));
}

#[test]
fn test_error_display() {
    let error = SyncError::Backend {
        status: 422,
        message: "body required".into(),
    };
    assert_eq!(error.to_string(), "Backend error (422): body required");
    assert_eq!(SyncError::NotConnected.to_string(), "Not connected");
}
