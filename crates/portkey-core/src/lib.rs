//! Core types and traits for the Portkey link resolver.
//!
//! This crate provides the pieces shared by every other crate in the
//! workspace: the clock abstraction used for expiration, the key-value
//! store contract, and the storage error taxonomy.

pub mod clock;
pub mod error;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, StorageError};
pub use store::{ttl_secs, KeyValueStore};
