//! Digest-based entropy tributary.
//!
//! Whole-image hashing is not part of the noise pipeline, but a digest of
//! caller-supplied bytes may be folded into an instance's stream. This
//! module provides the digest source and its bit-level view.

mod digest;

pub use digest::{DigestBits, DigestSource, HashAlgorithm};
