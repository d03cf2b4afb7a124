//! Optimistic writes.
//!
//! A send shows up in the cache before its round trip: the tracker appends
//! a placeholder carrying a `Pending` id, issues the write, then swaps the
//! placeholder for the server record or removes it if the write failed.
//!
//! A push for the same message can beat the write response. The message
//! reconciler then replaces the oldest placeholder with the same sender and
//! body, and the later response collapses onto that entry.
//!
//! # Example
//!
//! ```ignore
//! let request = SendMessage::new(ConversationId(5), UserRef::guest(3), MessageBody::text("hi"));
//! let message = tracker.send(&cache, &request, backend.send_message(&request)).await?;
//! ```

mod tracker;

pub use tracker::{OptimisticTracker, PendingSend};
