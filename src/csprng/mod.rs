//! Cryptographic pseudorandom bit generator used for whitening.
//!
//! This module provides a Blum-Blum-Shub generator whose bits are XORed
//! into the sensor-derived stream by the CSPRNG debiasing policy. Its
//! state never depends on sensor data.

mod bbs;
mod prime;

pub use bbs::{BlumBlumShub, CsprngError, MODULUS_BITS};
pub use prime::{blum_prime, is_prime};
