//! Uniform integers in `[0, bound)` without modulo bias.
//!
//! Power-of-two bounds scale a full-width draw by the bound in a widened
//! intermediate and keep the high word. Other bounds take the draw modulo
//! the bound after masking the sign bit, and reject the draw when the
//! partial block it came from would overflow the signed range.

use super::assembler::{assemble, FromBits};
use super::SamplingError;

/// A signed integer domain for bounded draws.
pub trait BoundedDomain: Copy + Sized {
    /// Unsigned draw of the same width.
    type Raw: FromBits + Copy;

    /// Widened value for error reporting.
    fn as_i64(self) -> i64;

    /// Maps `raw` into `[0, bound)`, or `None` if the draw must be rejected.
    ///
    /// `bound` must be positive.
    fn map_raw(bound: Self, raw: Self::Raw) -> Option<Self>;
}

impl BoundedDomain for i32 {
    type Raw = u32;

    fn as_i64(self) -> i64 {
        self as i64
    }

    fn map_raw(bound: i32, raw: u32) -> Option<i32> {
        if (bound as u32).is_power_of_two() {
            return Some(((bound as u64 * raw as u64) >> u32::BITS) as i32);
        }
        let r = (raw & i32::MAX as u32) as i32;
        let x = r % bound;
        (r - x).checked_add(bound - 1).map(|_| x)
    }
}

impl BoundedDomain for i64 {
    type Raw = u64;

    fn as_i64(self) -> i64 {
        self
    }

    fn map_raw(bound: i64, raw: u64) -> Option<i64> {
        if (bound as u64).is_power_of_two() {
            return Some(((bound as u128 * raw as u128) >> u64::BITS) as i64);
        }
        let r = (raw & i64::MAX as u64) as i64;
        let x = r % bound;
        (r - x).checked_add(bound - 1).map(|_| x)
    }
}

pub(crate) fn check_bound<D: BoundedDomain>(bound: D) -> Result<(), SamplingError> {
    if bound.as_i64() <= 0 {
        return Err(SamplingError::InvalidBound(bound.as_i64()));
    }
    Ok(())
}

/// One bounded value from a sequence of raw draws.
///
/// `draw` returns `None` when the source has ended.
pub fn sample_from_draws<D, F>(bound: D, mut draw: F) -> Result<D, SamplingError>
where
    D: BoundedDomain,
    F: FnMut() -> Option<D::Raw>,
{
    check_bound(bound)?;
    loop {
        let raw = draw().ok_or(SamplingError::Closed)?;
        if let Some(value) = D::map_raw(bound, raw) {
            return Ok(value);
        }
    }
}

/// One bounded value assembled from `bits`.
pub fn sample_bounded<D, I>(bound: D, bits: &mut I) -> Result<D, SamplingError>
where
    D: BoundedDomain,
    I: Iterator<Item = bool> + ?Sized,
{
    sample_from_draws(bound, || assemble::<D::Raw, I>(bits))
}

/// Endless stream of bounded values; rejected draws are skipped.
#[derive(Debug)]
pub struct Bounded<D, I> {
    bound: D,
    bits: I,
    rejected: u64,
}

impl<D: BoundedDomain, I: Iterator<Item = bool>> Bounded<D, I> {
    /// Wraps a bit source. Fails for a non-positive bound.
    pub fn new(bound: D, bits: I) -> Result<Self, SamplingError> {
        check_bound(bound)?;
        Ok(Self {
            bound,
            bits,
            rejected: 0,
        })
    }

    /// Draws discarded so far.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

impl<D: BoundedDomain, I: Iterator<Item = bool>> Iterator for Bounded<D, I> {
    type Item = D;

    fn next(&mut self) -> Option<D> {
        loop {
            let raw = assemble::<D::Raw, I>(&mut self.bits)?;
            match D::map_raw(self.bound, raw) {
                Some(value) => return Some(value),
                None => self.rejected += 1,
            }
        }
    }
}
