//! Blum-Blum-Shub quadratic residue generator.
//!
//! The modulus `n = p * q` is built from two distinct primes congruent to
//! 3 mod 4. Each output bit is the least significant bit of the next state
//! `x = x^2 mod n`. The factors are discarded after construction.

use super::prime::blum_prime;
use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::One;
use rand_chacha::ChaCha20Rng;
use rand_core::{impls, RngCore, SeedableRng};
use thiserror::Error;

/// Smallest and largest accepted modulus sizes.
pub const MODULUS_BITS: std::ops::RangeInclusive<u32> = 16..=4096;

/// Errors that can occur while constructing the generator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CsprngError {
    #[error("modulus size must be an even number of bits in 16..=4096, got {0}")]
    InvalidModulusBits(u32),
    #[error("modulus {0} is not usable")]
    InvalidModulus(BigUint),
    #[error("seed is not coprime with the modulus")]
    InvalidSeed,
}

/// Quadratic residue bit generator.
pub struct BlumBlumShub {
    n: BigUint,
    state: BigUint,
    bits_generated: u64,
}

impl BlumBlumShub {
    /// Generates a fresh modulus and seed from the OS entropy source.
    pub fn new(modulus_bits: u32) -> Result<Self, CsprngError> {
        let mut rng = ChaCha20Rng::from_rng(rand_core::OsRng)
            .map_err(|_| CsprngError::InvalidSeed)?;
        Self::from_rng(modulus_bits, &mut rng)
    }

    /// Generates modulus and seed from `rng`.
    pub fn from_rng<R: RngCore + ?Sized>(
        modulus_bits: u32,
        rng: &mut R,
    ) -> Result<Self, CsprngError> {
        if modulus_bits % 2 != 0 || !MODULUS_BITS.contains(&modulus_bits) {
            return Err(CsprngError::InvalidModulusBits(modulus_bits));
        }
        let half = modulus_bits / 2;
        let p = blum_prime(half, rng);
        let mut q = blum_prime(half, rng);
        while q == p {
            q = blum_prime(half, rng);
        }
        let n = p * q;

        // Extra bytes keep the reduced seed close to uniform.
        let mut seed = vec![0u8; modulus_bits as usize / 8 + 8];
        loop {
            rng.fill_bytes(&mut seed);
            match Self::with_modulus(n.clone(), &seed) {
                Ok(bbs) => return Ok(bbs),
                Err(CsprngError::InvalidSeed) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Uses a known modulus and seed. The seed bytes are read big-endian.
    ///
    /// The initial state is `seed^2 mod n`.
    pub fn with_modulus(n: BigUint, seed: &[u8]) -> Result<Self, CsprngError> {
        if n < BigUint::from(15u32) || n.is_even() {
            return Err(CsprngError::InvalidModulus(n));
        }
        let two = BigUint::from(2u32);
        let s = BigUint::from_bytes_be(seed) % &n;
        if s < two || !s.gcd(&n).is_one() {
            return Err(CsprngError::InvalidSeed);
        }
        let state = &s * &s % &n;
        if state < two {
            return Err(CsprngError::InvalidSeed);
        }
        Ok(Self {
            n,
            state,
            bits_generated: 0,
        })
    }

    /// Returns the next bit.
    #[inline]
    pub fn next_bit(&mut self) -> bool {
        self.state = &self.state * &self.state % &self.n;
        self.bits_generated += 1;
        self.state.is_odd()
    }

    /// Returns up to 64 bits, first generated bit most significant.
    pub fn next_bits(&mut self, count: u32) -> u64 {
        (0..count.min(64)).fold(0u64, |acc, _| (acc << 1) | self.next_bit() as u64)
    }

    /// Modulus size in bits.
    pub fn modulus_bits(&self) -> u32 {
        self.n.bits() as u32
    }

    /// Bits produced since construction.
    pub fn bits_generated(&self) -> u64 {
        self.bits_generated
    }
}

impl std::fmt::Debug for BlumBlumShub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlumBlumShub")
            .field("modulus_bits", &self.modulus_bits())
            .field("bits_generated", &self.bits_generated)
            .finish_non_exhaustive()
    }
}

impl RngCore for BlumBlumShub {
    fn next_u32(&mut self) -> u32 {
        self.next_bits(32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.next_bits(64)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        impls::fill_bytes_via_next(self, dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}
