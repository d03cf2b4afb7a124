//! Consumer hooks.
//!
//! Declarative subscription points for presentation code. Mounting a hook
//! acquires the channel subscriptions for one entity and watches its cache
//! key; dropping it releases both. Subscriptions are keyed on the entity
//! only: re-rendering with the same id and a new callback swaps the callback
//! in place, so a surface never re-joins a channel just because it rendered.
//!
//! Any number of hooks may be mounted for the same entity. They share one
//! underlying channel join through the [`SubscriptionRegistry`].
//!
//! # Example
//!
//! ```ignore
//! let hooks = Hooks::new(registry, cache);
//! let mut chat = hooks.use_conversation_messages(ConversationId(5), Arc::new(|event| {
//!     tracing::info!(?event, "chat event");
//! }))?;
//!
//! // Same id: callback replaced, no re-subscribe.
//! chat.rerender(ConversationId(5), Arc::new(|_| {}))?;
//!
//! drop(chat); // channel left if nothing else holds it
//! ```
//!
//! [`SubscriptionRegistry`]: crate::registry::SubscriptionRegistry

mod mount;

pub use mount::{
    ConversationListHook, ConversationMessagesHook, EventCallback, Hooks, NotificationsHook,
};
