//! Ordered, lossless fan-out of the output bit stream.
//!
//! Each generator instance owns one [`Bus`]. Every typed or bounded stream
//! is a [`Subscription`] to that bus wrapped by an assembler, so all views
//! consume the same total order of bits.

mod channel;

pub use channel::{Bus, RecvError, Subscription};

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

/// Bus sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Queue slots per subscriber for each tracked pixel of the instance.
    ///
    /// A tick emits at most one bit per pixel, so this is the number of
    /// ticks a subscriber may fall behind before the producer blocks.
    pub capacity_per_pixel: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity_per_pixel: 256,
        }
    }
}

impl BusConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity_per_pixel == 0 {
            return Err(ConfigError::invalid(
                "bus.capacity_per_pixel",
                "must be positive",
            ));
        }
        Ok(())
    }

    /// Queue bound for an instance tracking `pixels` pixels.
    pub fn capacity_for(&self, pixels: usize) -> usize {
        self.capacity_per_pixel.saturating_mul(pixels.max(1))
    }
}
