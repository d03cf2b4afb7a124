//! Shared cache of query results.
//!
//! The cache holds one value per [`CacheKey`], each shaped like the read
//! endpoint it mirrors (conversation list, message list, notification list).
//! Values are copy-on-write `Arc<Vec<_>>`: a writer builds a new vector and
//! installs it, readers keep whatever reference they were handed.
//!
//! Consumers watch keys and are told exactly when the installed reference
//! changes, or when the entry turns stale and should be refetched. A watcher
//! that falls behind is never dropped; its overflow collapses into one
//! [`CacheChange::Lagged`] on the next drain.
//!
//! # Example
//!
//! ```ignore
//! let cache = CacheStore::new(256);
//! let watch = cache.watch(CacheKey::Messages(ConversationId(9)));
//!
//! cache.patch_messages(ConversationId(9), |messages| append(messages, msg));
//!
//! for change in watch.drain() {
//!     match change {
//!         CacheChange::Updated { revision, .. } => println!("now at {:?}", revision),
//!         CacheChange::Stale { key } => refetch(key),
//!         CacheChange::Lagged { key } => reread(key),
//!         CacheChange::Cleared => {}
//!     }
//! }
//! ```

mod store;
mod types;

pub use store::CacheStore;
pub use types::{CacheChange, CacheKey, CacheValue, CacheWatch, WatchId};
