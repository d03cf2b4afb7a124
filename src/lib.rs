//! # Rendezvous
//!
//! Real-time synchronization core for a guest/cast chat client.
//!
//! ## Core Concepts
//!
//! - **Transport**: one process-wide push connection with typed events
//! - **Registry**: reference-counted channel subscriptions with fan-out
//! - **Cache**: copy-on-write query results with change notification
//! - **Reconcilers**: pure, idempotent event-to-cache merge functions
//! - **Optimistic writes**: placeholders reconciled against server records
//! - **Hooks**: per-entity mount points for presentation code
//!
//! ## Example
//!
//! ```ignore
//! use rendezvous::{SyncClient, SyncConfig, WebSocketTransport, HttpBackend};
//!
//! let config = SyncConfig::from_env();
//! let client = SyncClient::new(
//!     config.clone(),
//!     Box::new(WebSocketTransport::new(&config)),
//!     HttpBackend::new(&config)?,
//! );
//! client.connect(UserRef::guest(3))?;
//!
//! let chat = client.hooks().use_conversation_messages(ConversationId(9), Arc::new(|_| {}))?;
//! client.refetch_stale().await?;
//!
//! client
//!     .send_message(SendMessage::new(ConversationId(9), UserRef::guest(3), MessageBody::text("hello")))
//!     .await?;
//! assert_eq!(chat.messages().unwrap().len(), 1);
//! ```

pub mod backend;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod hooks;
pub mod optimistic;
pub mod reconcile;
pub mod registry;
pub mod transport;
pub mod types;

// Re-exports
#[cfg(feature = "http")]
pub use backend::HttpBackend;
pub use backend::{Backend, NewConversation, NewGroup, SendMessage};
pub use cache::{CacheChange, CacheKey, CacheStore, CacheValue, CacheWatch, WatchId};
pub use client::SyncClient;
pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use events::{EventKind, PushEvent};
pub use hooks::{
    ConversationListHook, ConversationMessagesHook, EventCallback, Hooks, NotificationsHook,
};
pub use optimistic::{OptimisticTracker, PendingSend};
pub use reconcile::apply_event;
pub use registry::{Channel, Handler, HandlerId, Reconciler, SubscriptionHandle, SubscriptionRegistry};
#[cfg(feature = "websocket")]
pub use transport::WebSocketTransport;
pub use transport::{
    ConnectionState, Connector, EventSink, LoopbackCall, LoopbackTransport, PushTransport,
    StateChange,
};
pub use types::*;
