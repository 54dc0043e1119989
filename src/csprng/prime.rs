//! Primality testing and Blum prime generation over arbitrary-size integers.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand_core::RngCore;

/// Trial divisors and Miller-Rabin bases. The base set is deterministic
/// below 3.3 * 10^24; above that a composite survives with probability
/// at most 4^-16.
const SMALL_PRIMES: [u32; 16] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53];

/// Miller-Rabin over the fixed base set.
pub fn is_prime(n: &BigUint) -> bool {
    let one = BigUint::one();
    if *n <= one {
        return false;
    }
    for &p in &SMALL_PRIMES {
        let p = BigUint::from(p);
        if (n % &p).is_zero() {
            return *n == p;
        }
    }

    let n_minus_one = n - &one;
    let s = n_minus_one.trailing_zeros().unwrap_or(0);
    let d = &n_minus_one >> s;

    'witness: for &a in &SMALL_PRIMES {
        let mut x = BigUint::from(a).modpow(&d, n);
        if x == one || x == n_minus_one {
            continue;
        }
        for _ in 1..s {
            x = &x * &x % n;
            if x == n_minus_one {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

/// Draws a random prime `p ≡ 3 (mod 4)` of exactly `bits` bits.
///
/// The two top bits are forced so that the product of two such primes has
/// exactly `2 * bits` bits. `bits` must be at least 8.
pub fn blum_prime<R: RngCore + ?Sized>(bits: u32, rng: &mut R) -> BigUint {
    debug_assert!(bits >= 8);
    let len = bits.div_ceil(8) as usize;
    let excess = len as u32 * 8 - bits;
    let top = BigUint::from(0b11u32) << (bits - 2);
    let low = BigUint::from(0b11u32);
    let mut bytes = vec![0u8; len];
    loop {
        rng.fill_bytes(&mut bytes);
        bytes[0] &= 0xFF >> excess;
        let mut candidate = BigUint::from_bytes_be(&bytes);
        candidate |= &top;
        candidate |= &low;
        if is_prime(&candidate) {
            return candidate;
        }
    }
}
