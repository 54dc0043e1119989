//! Debiasing engine configuration.

use super::{Comparison, DebiasMethod};
use crate::conditioning::HashAlgorithm;
use crate::config::ConfigError;
use crate::csprng::MODULUS_BITS;
use serde::{Deserialize, Serialize};

/// Configuration of the per-instance debiasing engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Initial debiasing policy for new instances.
    pub method: DebiasMethod,
    /// Reference sample selection.
    pub comparison: Comparison,
    /// Samples retained per pixel; also the comparison window length.
    pub window_size: usize,
    /// Pixels XORed together by the interpixel policy.
    pub interpixel_group: usize,
    /// Ticks with at least one comparison before an instance reports ready.
    pub warmup_ticks: u32,
    /// Blum-Blum-Shub modulus size for the CSPRNG policy.
    pub csprng_modulus_bits: u32,
    /// Hash used when folding caller bytes into the stream.
    pub digest_algorithm: HashAlgorithm,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            method: DebiasMethod::VonNeumann,
            comparison: Comparison::Consecutive,
            window_size: 8,
            interpixel_group: 2,
            warmup_ticks: 10,
            csprng_modulus_bits: 512,
            digest_algorithm: HashAlgorithm::Blake3,
        }
    }
}

impl ExtractionConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size < 2 {
            return Err(ConfigError::invalid("extraction.window_size", "must be at least 2"));
        }
        if self.interpixel_group < 2 {
            return Err(ConfigError::invalid(
                "extraction.interpixel_group",
                "must be at least 2",
            ));
        }
        let bits = self.csprng_modulus_bits;
        if bits % 2 != 0 || !MODULUS_BITS.contains(&bits) {
            return Err(ConfigError::invalid(
                "extraction.csprng_modulus_bits",
                "must be even and within 16..=4096",
            ));
        }
        Ok(())
    }
}
