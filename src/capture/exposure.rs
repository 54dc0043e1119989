//! Sensor exposure parameters and their hardware-reported ranges.

use serde::{Deserialize, Serialize};

/// A closed numeric range reported by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    /// Lowest accepted value.
    pub min: f64,
    /// Highest accepted value.
    pub max: f64,
}

impl ParamRange {
    /// Creates a range, swapping the ends if given in reverse.
    pub fn new(min: f64, max: f64) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// Clamps `value` into the range.
    #[inline]
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    /// Returns true if `value` lies inside the range.
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// The three exposure parameters the controller may drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExposureParam {
    /// Analog/digital sensor gain (ISO-like units).
    Gain,
    /// Exposure time in microseconds.
    ExposureTime,
    /// Exposure compensation in EV steps.
    Compensation,
}

impl std::fmt::Display for ExposureParam {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Gain => "gain",
            Self::ExposureTime => "exposure_time",
            Self::Compensation => "compensation",
        };
        f.write_str(name)
    }
}

/// Current exposure configuration of the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureState {
    /// Sensor gain.
    pub gain: f64,
    /// Exposure time in microseconds.
    pub exposure_us: f64,
    /// Exposure compensation in EV steps.
    pub compensation: f64,
}

impl Default for ExposureState {
    fn default() -> Self {
        Self {
            gain: 1.0,
            exposure_us: 10_000.0,
            compensation: 0.0,
        }
    }
}

impl ExposureState {
    /// Reads one parameter.
    pub fn get(&self, param: ExposureParam) -> f64 {
        match param {
            ExposureParam::Gain => self.gain,
            ExposureParam::ExposureTime => self.exposure_us,
            ExposureParam::Compensation => self.compensation,
        }
    }

    /// Writes one parameter.
    pub fn set(&mut self, param: ExposureParam, value: f64) {
        match param {
            ExposureParam::Gain => self.gain = value,
            ExposureParam::ExposureTime => self.exposure_us = value,
            ExposureParam::Compensation => self.compensation = value,
        }
    }

    /// Returns a copy with every bounded parameter clamped into its range.
    pub fn clamped(mut self, bounds: &ExposureBounds) -> Self {
        for param in ExposureParam::ALL {
            if let Some(range) = bounds.range(param) {
                self.set(param, range.clamp(self.get(param)));
            }
        }
        self
    }
}

impl ExposureParam {
    /// All parameters in controller priority order.
    pub const ALL: [ExposureParam; 3] = [Self::Gain, Self::ExposureTime, Self::Compensation];
}

/// Hardware ranges for each exposure parameter.
///
/// `None` means the sensor does not expose manual control of that parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExposureBounds {
    /// Gain range.
    pub gain: Option<ParamRange>,
    /// Exposure time range in microseconds.
    pub exposure_us: Option<ParamRange>,
    /// Compensation range in EV steps.
    pub compensation: Option<ParamRange>,
}

impl ExposureBounds {
    /// Returns the range for one parameter, if controllable.
    pub fn range(&self, param: ExposureParam) -> Option<ParamRange> {
        match param {
            ExposureParam::Gain => self.gain,
            ExposureParam::ExposureTime => self.exposure_us,
            ExposureParam::Compensation => self.compensation,
        }
    }

    /// Returns true if gain or exposure time can be set manually.
    pub fn has_manual_control(&self) -> bool {
        self.gain.is_some() || self.exposure_us.is_some()
    }

    /// Returns true if `state` lies within every reported range.
    pub fn admits(&self, state: &ExposureState) -> bool {
        ExposureParam::ALL.iter().all(|&p| {
            self.range(p)
                .map(|r| r.contains(state.get(p)))
                .unwrap_or(true)
        })
    }
}
