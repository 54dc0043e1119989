//! Statistical checks on the output bit stream.
//!
//! These tests are sanity checks to detect obvious problems,
//! not proofs of entropy quality. Passing these tests is necessary
//! but not sufficient for good output.

use crate::extraction::BitBlock;

/// Statistical test results.
#[derive(Debug, Clone)]
pub struct BitStatistics {
    /// Bit bias (deviation from 0.5).
    pub bit_bias: f64,
    /// Lag-1 autocorrelation of consecutive bits.
    pub autocorrelation: f64,
    /// Longest run of identical bits.
    pub longest_run: usize,
    /// Number of bits analyzed.
    pub sample_size: usize,
}

impl BitStatistics {
    /// Runs all statistical tests on `bits`.
    pub fn analyze(bits: &BitBlock) -> Self {
        Self {
            bit_bias: bits.bit_bias(),
            autocorrelation: Self::compute_autocorrelation(bits),
            longest_run: Self::compute_longest_run(bits),
            sample_size: bits.len(),
        }
    }

    /// Computes lag-1 autocorrelation.
    ///
    /// Constant input counts as perfectly correlated.
    fn compute_autocorrelation(bits: &BitBlock) -> f64 {
        if bits.len() < 2 {
            return 0.0;
        }

        let n = bits.len() as f64;
        let mean = bits.popcount() as f64 / n;
        let variance: f64 = bits.iter().map(|b| (b as u8 as f64 - mean).powi(2)).sum();

        if variance == 0.0 {
            return 1.0;
        }

        let covariance: f64 = bits
            .iter()
            .zip(bits.iter().skip(1))
            .map(|(a, b)| (a as u8 as f64 - mean) * (b as u8 as f64 - mean))
            .sum();

        covariance / variance
    }

    fn compute_longest_run(bits: &BitBlock) -> usize {
        let mut longest = 0;
        let mut run = 0;
        let mut prev = None;
        for bit in bits.iter() {
            run = if prev == Some(bit) { run + 1 } else { 1 };
            prev = Some(bit);
            longest = longest.max(run);
        }
        longest
    }

    /// Longest run expected for uniform bits of this length, `log2(n)`.
    pub fn expected_longest_run(&self) -> f64 {
        (self.sample_size.max(1) as f64).log2()
    }
}
