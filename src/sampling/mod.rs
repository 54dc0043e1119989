//! Typed and bounded views over a bit stream.
//!
//! Everything here works on any `Iterator<Item = bool>`, so the same code
//! serves a live bus subscription and a fixed test vector.

mod assembler;
mod bounded;

pub use assembler::{assemble, FromBits, Values};
pub use bounded::{sample_bounded, sample_from_draws, Bounded, BoundedDomain};
pub(crate) use bounded::check_bound;

use thiserror::Error;

/// Errors from bounded sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SamplingError {
    #[error("bound must be positive, got {0}")]
    InvalidBound(i64),
    #[error("bit source closed before a value was assembled")]
    Closed,
}
