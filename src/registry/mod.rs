//! Channel subscription registry.
//!
//! Consumers acquire interest in one event on one channel and get back a
//! [`SubscriptionHandle`]. Any number of handles may exist for the same
//! channel; the channel is joined on the first acquire and left when the
//! last handle is released, so navigation never accumulates subscriptions.
//!
//! Every event for a joined channel is first passed to the registry's
//! reconciler (once, regardless of handler count) and then fanned out to
//! the handlers bound to that event.
//!
//! # Example
//!
//! ```ignore
//! let registry = SubscriptionRegistry::new(connector);
//! let handle = registry.acquire(
//!     Channel::Conversation(ConversationId(5)),
//!     EventKind::NewMessage,
//!     Arc::new(|event| println!("{:?}", event)),
//! )?;
//!
//! // ...
//! handle.release(); // or just drop it
//! ```

mod manager;
mod types;

pub use manager::{Handler, Reconciler, SubscriptionRegistry};
pub use types::{Channel, HandlerId, SubscriptionHandle};
