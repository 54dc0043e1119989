//! Output health diagnostics.
//!
//! Statistical tests and a fail-closed health monitor for the debiased
//! bit stream. These are sanity checks, not cryptographic proofs; they
//! report on the output and never gate it.

mod health;
mod statistics;
mod threshold;

pub use health::{HealthMetrics, HealthMonitor};
pub use statistics::BitStatistics;
pub use threshold::{QualityThresholds, ThresholdViolation};
