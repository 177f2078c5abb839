//! Backing store adapters for [`KeyValueStore`](portkey_core::KeyValueStore).
//!
//! - [`RedisStore`] talks to a Redis server over a multiplexed connection and
//!   bounds every command with a deadline.
//! - [`InMemoryStore`] keeps everything in a sharded map. It is used by tests
//!   and by single-process deployments that can afford to lose their data.

pub mod memory;
pub mod redis;

pub use self::memory::{InMemoryStore, OpCounts};
pub use self::redis::RedisStore;
