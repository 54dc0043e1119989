//! Assembly of raw bits into typed values.
//!
//! An N-bit value takes exactly N consecutive bits, first bit most
//! significant. Fractions take a mantissa's worth of bits and scale by
//! `2^-width`, which keeps every representable output equally likely.

use std::marker::PhantomData;

/// A type that can be assembled from a fixed number of bits.
pub trait FromBits: Sized {
    /// Bits consumed per value (at most 64).
    const BITS: u32;

    /// Builds a value from the low `BITS` bits of `word`.
    fn from_bits(word: u64) -> Self;
}

impl FromBits for bool {
    const BITS: u32 = 1;

    fn from_bits(word: u64) -> Self {
        word & 1 == 1
    }
}

macro_rules! from_bits_int {
    ($($t:ty),*) => {
        $(
            impl FromBits for $t {
                const BITS: u32 = <$t>::BITS;

                #[inline]
                fn from_bits(word: u64) -> Self {
                    word as $t
                }
            }
        )*
    };
}

from_bits_int!(u8, u16, u32, u64, i8, i16, i32, i64);

impl FromBits for f32 {
    const BITS: u32 = f32::MANTISSA_DIGITS;

    fn from_bits(word: u64) -> Self {
        word as f32 / (1u64 << f32::MANTISSA_DIGITS) as f32
    }
}

impl FromBits for f64 {
    const BITS: u32 = f64::MANTISSA_DIGITS;

    fn from_bits(word: u64) -> Self {
        word as f64 / (1u64 << f64::MANTISSA_DIGITS) as f64
    }
}

/// Takes exactly `T::BITS` bits from `bits`.
///
/// Returns `None` if the source ends first; the bits already taken are lost.
pub fn assemble<T, I>(bits: &mut I) -> Option<T>
where
    T: FromBits,
    I: Iterator<Item = bool> + ?Sized,
{
    let mut word = 0u64;
    for _ in 0..T::BITS {
        word = (word << 1) | bits.next()? as u64;
    }
    Some(T::from_bits(word))
}

/// Endless stream of assembled values over a bit source.
pub struct Values<T, I> {
    bits: I,
    _marker: PhantomData<fn() -> T>,
}

impl<T, I: std::fmt::Debug> std::fmt::Debug for Values<T, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Values").field("bits", &self.bits).finish()
    }
}

impl<T: FromBits, I: Iterator<Item = bool>> Values<T, I> {
    /// Wraps a bit source.
    pub fn new(bits: I) -> Self {
        Self {
            bits,
            _marker: PhantomData,
        }
    }

    /// Returns the underlying bit source.
    pub fn into_inner(self) -> I {
        self.bits
    }
}

impl<T: FromBits, I: Iterator<Item = bool>> Iterator for Values<T, I> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        assemble(&mut self.bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(s: &str) -> impl Iterator<Item = bool> + '_ {
        s.chars().filter(|c| !c.is_whitespace()).map(|c| c == '1')
    }

    #[test]
    fn test_u8_msb_first() {
        let value: u8 = assemble(&mut bits("10110010")).unwrap();
        assert_eq!(value, 178);
    }

    #[test]
    fn test_widths() {
        let ones = || std::iter::repeat(true);
        assert_eq!(assemble::<u16, _>(&mut ones()), Some(u16::MAX));
        assert_eq!(assemble::<u32, _>(&mut ones()), Some(u32::MAX));
        assert_eq!(assemble::<u64, _>(&mut ones()), Some(u64::MAX));
        assert_eq!(assemble::<i8, _>(&mut ones()), Some(-1));
        assert_eq!(assemble::<bool, _>(&mut ones()), Some(true));
    }

    #[test]
    fn test_consumes_exact_width() {
        let mut source = bits("1111 0000 1010 1010 01");
        assert_eq!(assemble::<u8, _>(&mut source), Some(0xF0));
        assert_eq!(assemble::<u8, _>(&mut source), Some(0xAA));
        assert_eq!(assemble::<u8, _>(&mut source), None);
    }

    #[test]
    fn test_fractions_in_unit_interval() {
        let max32: f32 = assemble(&mut std::iter::repeat(true)).unwrap();
        assert!(max32 < 1.0);
        assert_eq!(max32, 1.0 - f32::EPSILON / 2.0);

        let max64: f64 = assemble(&mut std::iter::repeat(true)).unwrap();
        assert!(max64 < 1.0);

        let zero: f64 = assemble(&mut std::iter::repeat(false)).unwrap();
        assert_eq!(zero, 0.0);

        let half: f32 = assemble(&mut std::iter::once(true).chain(std::iter::repeat(false)))
            .unwrap();
        assert_eq!(half, 0.5);
    }

    #[test]
    fn test_values_stream() {
        let source = bits("00000001 00000010 00000011 0000");
        let values: Vec<u8> = Values::new(source).collect();
        assert_eq!(values, vec![1, 2, 3]);
    }
}
