//! In-process cache that sits in front of the backing store.

pub mod lru;

pub use lru::LruCache;
