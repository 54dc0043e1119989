//! Exposure feedback control.
//!
//! Sensor noise only yields useful comparisons when pixels are neither
//! crushed to black nor clipped to white. This module nudges gain,
//! exposure time or compensation to keep calibration pixels in band.

mod config;
mod controller;

pub use config::{ControlPath, ExposureConfig};
pub use controller::{Direction, ExposureAdjustment, ExposureController};
