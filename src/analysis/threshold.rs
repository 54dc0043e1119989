//! Quality thresholds for fail-closed health checks.

use super::statistics::BitStatistics;
use serde::{Deserialize, Serialize};

/// Quality thresholds for output monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Minimum bits per sample.
    pub min_sample_bits: usize,
    /// Maximum acceptable bit bias (absolute value).
    pub max_bit_bias: f64,
    /// Maximum acceptable autocorrelation (absolute value).
    pub max_autocorrelation: f64,
    /// Allowed excess of the longest run over `log2(n)`.
    pub max_run_excess: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_sample_bits: 1024,
            max_bit_bias: 0.05,
            max_autocorrelation: 0.1,
            max_run_excess: 10.0,
        }
    }
}

impl QualityThresholds {
    /// Creates more conservative thresholds.
    pub fn conservative() -> Self {
        Self {
            min_sample_bits: 4096,
            max_bit_bias: 0.02,
            max_autocorrelation: 0.05,
            max_run_excess: 8.0,
        }
    }

    /// Creates more permissive thresholds (for testing).
    pub fn permissive() -> Self {
        Self {
            min_sample_bits: 64,
            max_bit_bias: 0.2,
            max_autocorrelation: 0.5,
            max_run_excess: 16.0,
        }
    }

    /// Checks statistics against thresholds.
    pub fn check(&self, stats: &BitStatistics) -> Result<(), ThresholdViolation> {
        if stats.sample_size < self.min_sample_bits {
            return Err(ThresholdViolation::InsufficientData {
                observed: stats.sample_size,
                required: self.min_sample_bits,
            });
        }

        if stats.bit_bias.abs() > self.max_bit_bias {
            return Err(ThresholdViolation::BitBias {
                observed: stats.bit_bias,
                threshold: self.max_bit_bias,
            });
        }

        if stats.autocorrelation.abs() > self.max_autocorrelation {
            return Err(ThresholdViolation::HighAutocorrelation {
                observed: stats.autocorrelation,
                threshold: self.max_autocorrelation,
            });
        }

        let max_run = stats.expected_longest_run() + self.max_run_excess;
        if stats.longest_run as f64 > max_run {
            return Err(ThresholdViolation::LongRun {
                observed: stats.longest_run,
                threshold: max_run,
            });
        }

        Ok(())
    }
}

/// Threshold violation types.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ThresholdViolation {
    #[error("only {observed} bits analyzed, need {required}")]
    InsufficientData { observed: usize, required: usize },

    #[error("bit bias {observed:.4} exceeds threshold {threshold:.4}")]
    BitBias { observed: f64, threshold: f64 },

    #[error("autocorrelation {observed:.4} exceeds threshold {threshold:.4}")]
    HighAutocorrelation { observed: f64, threshold: f64 },

    #[error("run of {observed} identical bits exceeds {threshold:.1}")]
    LongRun { observed: usize, threshold: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::BitBlock;

    fn stats_of(bytes: Vec<u8>) -> BitStatistics {
        BitStatistics::analyze(&BitBlock::from_bytes(bytes))
    }

    #[test]
    fn test_good_data_passes() {
        use rand_chacha::ChaCha20Rng;
        use rand_core::{RngCore, SeedableRng};

        let mut data = vec![0u8; 512];
        ChaCha20Rng::seed_from_u64(8).fill_bytes(&mut data);

        assert!(QualityThresholds::permissive().check(&stats_of(data)).is_ok());
    }

    #[test]
    fn test_biased_data_fails() {
        assert!(matches!(
            QualityThresholds::default().check(&stats_of(vec![0xFF; 1000])),
            Err(ThresholdViolation::BitBias { .. })
        ));
    }

    #[test]
    fn test_alternating_data_fails_autocorrelation() {
        assert!(matches!(
            QualityThresholds::default().check(&stats_of(vec![0x55; 1000])),
            Err(ThresholdViolation::HighAutocorrelation { .. })
        ));
    }

    #[test]
    fn test_short_sample_rejected() {
        assert!(matches!(
            QualityThresholds::default().check(&stats_of(vec![0x5A; 4])),
            Err(ThresholdViolation::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_long_run_fails() {
        use rand_chacha::ChaCha20Rng;
        use rand_core::{RngCore, SeedableRng};

        // Random bits framed by one 80-bit run of ones and one of zeros.
        let mut middle = vec![0u8; 1000];
        ChaCha20Rng::seed_from_u64(4).fill_bytes(&mut middle);
        let mut data = vec![0xFF; 10];
        data.extend(middle);
        data.extend(vec![0x00; 10]);

        assert!(matches!(
            QualityThresholds::default().check(&stats_of(data)),
            Err(ThresholdViolation::LongRun { observed, .. }) if observed >= 80
        ));
    }
}
