//! Output health monitoring.
//!
//! Watches the debiased bit stream a consumer actually draws. The monitor
//! is fail-closed: it reports unhealthy until a streak of good samples has
//! been seen, and drops back on the first bad one.
//!
//! Nothing here gates the stream. A failing verdict is a diagnostic for
//! the caller (the CLI logs it, the metrics exporter publishes it); bits
//! keep flowing regardless. Samples too short to judge are counted but do
//! not move the verdict, since draws of a few values are normal.

use super::{
    statistics::BitStatistics,
    threshold::{QualityThresholds, ThresholdViolation},
};
use crate::extraction::BitBlock;

/// Current health status of a generator's output.
#[derive(Debug, Clone)]
pub struct HealthMetrics {
    /// Most recent statistical test results.
    pub latest_stats: Option<BitStatistics>,
    /// Whether the output is currently healthy.
    pub is_healthy: bool,
    /// Most recent violation, if any.
    pub last_violation: Option<ThresholdViolation>,
    /// Consecutive healthy samples.
    pub consecutive_healthy: u64,
    /// Consecutive unhealthy samples.
    pub consecutive_unhealthy: u64,
    /// Total samples analyzed, including skipped ones.
    pub total_samples: u64,
    /// Samples below the minimum size, which leave the verdict unchanged.
    pub skipped_samples: u64,
    /// Bits across all analyzed samples.
    pub bits_analyzed: u64,
}

impl Default for HealthMetrics {
    fn default() -> Self {
        Self {
            latest_stats: None,
            is_healthy: false,
            last_violation: None,
            consecutive_healthy: 0,
            consecutive_unhealthy: 0,
            total_samples: 0,
            skipped_samples: 0,
            bits_analyzed: 0,
        }
    }
}

/// Monitors the health of one output stream over time.
pub struct HealthMonitor {
    thresholds: QualityThresholds,
    metrics: HealthMetrics,
    required_healthy_streak: u64,
}

impl HealthMonitor {
    /// Creates a monitor requiring three good samples.
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self::with_streak_requirement(thresholds, 3)
    }

    /// Creates a monitor with a custom healthy streak requirement.
    pub fn with_streak_requirement(thresholds: QualityThresholds, streak: u64) -> Self {
        Self {
            thresholds,
            metrics: HealthMetrics::default(),
            required_healthy_streak: streak.max(1),
        }
    }

    /// Analyzes a sample of drawn bits and updates health status.
    pub fn analyze(&mut self, bits: &BitBlock) -> &HealthMetrics {
        let stats = BitStatistics::analyze(bits);
        self.metrics.total_samples += 1;
        self.metrics.bits_analyzed += bits.len() as u64;

        match self.thresholds.check(&stats) {
            Err(ThresholdViolation::InsufficientData { observed, required }) => {
                self.metrics.skipped_samples += 1;
                tracing::debug!(observed, required, "Sample too short to judge");
            }
            Ok(()) => {
                self.metrics.consecutive_healthy += 1;
                self.metrics.consecutive_unhealthy = 0;
                self.metrics.last_violation = None;

                if self.metrics.consecutive_healthy >= self.required_healthy_streak {
                    if !self.metrics.is_healthy {
                        tracing::info!(
                            streak = self.metrics.consecutive_healthy,
                            "Output became healthy"
                        );
                    }
                    self.metrics.is_healthy = true;
                }

                tracing::trace!(
                    bias = stats.bit_bias,
                    autocorr = stats.autocorrelation,
                    longest_run = stats.longest_run,
                    "Health check passed"
                );
            }
            Err(violation) => {
                self.metrics.consecutive_unhealthy += 1;
                self.metrics.consecutive_healthy = 0;
                self.metrics.last_violation = Some(violation.clone());

                if self.metrics.is_healthy {
                    tracing::warn!(violation = %violation, "Output became unhealthy");
                }
                self.metrics.is_healthy = false;
            }
        }

        self.metrics.latest_stats = Some(stats);
        &self.metrics
    }

    /// Returns current health metrics.
    pub fn metrics(&self) -> &HealthMetrics {
        &self.metrics
    }

    /// Whether the last samples passed.
    pub fn is_healthy(&self) -> bool {
        self.metrics.is_healthy
    }

    /// Resets the monitor to initial state.
    pub fn reset(&mut self) {
        self.metrics = HealthMetrics::default();
        tracing::debug!("Health monitor reset");
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(QualityThresholds::default())
    }
}
