//! The records layer: short-link records and usage counters.
//!
//! [`Records`] keeps an [`LruCache`](portkey_cache::LruCache) in front of a
//! [`KeyValueStore`](portkey_core::KeyValueStore) using the cache-aside
//! pattern. Every key it sends to the store is scoped by a [`Namespace`], so
//! several deployments can share one store.

mod counters;
mod namespace;
mod records;

pub use counters::Counters;
pub use namespace::Namespace;
pub use records::Records;
