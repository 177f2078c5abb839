//! Minting and resolving short links.
//!
//! [`ShortenerService`] ties the code generators to the records layer: it
//! validates input, picks an unused code, stores the mapping and keeps the
//! usage counters up to date.

pub mod error;
pub mod service;
pub mod validate;

pub use error::{Result, ShortenerError};
pub use service::{ShortenerService, ShortenerSettings, Stats};
