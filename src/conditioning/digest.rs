//! Hash-based entropy tributary.
//!
//! A digest of arbitrary bytes is exposed bit by bit, most significant
//! bit of the first byte first, so it can be folded into an instance's
//! output stream alongside sensor-derived bits.

use blake3::Hasher as Blake3Hasher;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Anything that maps bytes to a fixed-length digest.
pub trait DigestSource: Send + Sync {
    /// Digest length in bytes.
    fn output_len(&self) -> usize;

    /// Digests `bytes`.
    fn digest(&self, bytes: &[u8]) -> Vec<u8>;
}

/// Supported hash algorithms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// BLAKE3 - fast, secure, recommended default.
    #[default]
    Blake3,
    /// SHA-256 - widely deployed, conservative choice.
    Sha256,
}

impl DigestSource for HashAlgorithm {
    fn output_len(&self) -> usize {
        32
    }

    fn digest(&self, bytes: &[u8]) -> Vec<u8> {
        match self {
            HashAlgorithm::Blake3 => {
                let mut hasher = Blake3Hasher::new();
                hasher.update(bytes);
                hasher.finalize().as_bytes().to_vec()
            }
            HashAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(bytes);
                hasher.finalize().to_vec()
            }
        }
    }
}

/// MSB-first bit iterator over a digest.
#[derive(Debug, Clone)]
pub struct DigestBits {
    bytes: Vec<u8>,
    pos: usize,
}

impl DigestBits {
    /// Digests `input` with `source`.
    pub fn new<D: DigestSource + ?Sized>(source: &D, input: &[u8]) -> Self {
        Self::from_digest(source.digest(input))
    }

    /// Iterates an already computed digest.
    pub fn from_digest(bytes: Vec<u8>) -> Self {
        Self { bytes, pos: 0 }
    }
}

impl Iterator for DigestBits {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        let byte = *self.bytes.get(self.pos / 8)?;
        let bit = byte & (0x80 >> (self.pos % 8)) != 0;
        self.pos += 1;
        Some(bit)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.bytes.len() * 8 - self.pos;
        (left, Some(left))
    }
}

impl ExactSizeIterator for DigestBits {}
