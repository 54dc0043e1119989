//! Exposure controller configuration.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

/// Which exposure path the controller drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlPath {
    /// Gain, then exposure time. Falls back to compensation when the
    /// sensor has no manual ranges.
    #[default]
    Manual,
    /// Exposure compensation only.
    Compensation,
}

/// Exposure feedback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureConfig {
    /// Run the controller at all.
    pub enabled: bool,
    /// Controlled path.
    pub path: ControlPath,
    /// Lower edge of the target band (fraction of full scale).
    pub target_low: f64,
    /// Upper edge of the target band.
    pub target_high: f64,
    /// Minimum time between adjustments.
    pub cooldown_ms: u64,
    /// EV step applied to compensation per adjustment.
    pub compensation_step: f64,
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: ControlPath::Manual,
            target_low: 0.25,
            target_high: 0.75,
            cooldown_ms: 3_000,
            compensation_step: 1.0,
        }
    }
}

impl ExposureConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let band_ok = (0.0..=1.0).contains(&self.target_low)
            && (0.0..=1.0).contains(&self.target_high)
            && self.target_low < self.target_high;
        if !band_ok {
            return Err(ConfigError::invalid(
                "exposure.target_low/target_high",
                "need 0 <= low < high <= 1",
            ));
        }
        if !(self.compensation_step > 0.0) {
            return Err(ConfigError::invalid(
                "exposure.compensation_step",
                "must be positive",
            ));
        }
        Ok(())
    }
}
