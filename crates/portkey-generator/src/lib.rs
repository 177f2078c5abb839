//! Short code generation.
//!
//! [`NumeralSystem`] maps 32-bit integers onto fixed-width strings over an
//! arbitrary alphabet. [`CodeSpace`] enumerates every code of a given width,
//! and [`CodePool`] hands out the ones not yet issued in shuffled order.
//! [`RandomCodes`] draws candidates uniformly from the same space for callers
//! that check collisions themselves.

pub mod error;
pub mod numeral;
pub mod pool;
pub mod random;

pub use error::{CodeSpaceError, NumeralError};
pub use numeral::NumeralSystem;
pub use pool::{CodePool, CodeSpace, CodeSpaceSettings};
pub use random::RandomCodes;

/// Trait for generating short codes.
///
/// Implementations are pure generators that don't interact with storage.
pub trait Generator: Send + Sync + 'static {
    /// Returns the next candidate code, or `None` once nothing is left.
    fn generate(&self) -> Option<String>;
}
