//! Pixel coordinate allocation.
//!
//! Every coordinate tracked by any instance of a session, plus the
//! calibration pixels, is recorded here. New coordinates must keep a
//! minimum Euclidean distance from all recorded ones so that neighbouring
//! pixels do not share correlated noise.

use crate::capture::{PixelCoord, SensorInfo};
use crate::config::ConfigError;
use crate::error::{Error, Result};
use rand_chacha::ChaCha20Rng;
use rand_core::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

/// Pixel placement settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PixelConfig {
    /// Minimum distance between any two tracked pixels.
    pub min_distance: u32,
    /// Random placements tried per requested pixel.
    pub allocation_attempts: u32,
    /// Pixels reserved for exposure metering.
    pub calibration_pixels: usize,
    /// Fixed seed for reproducible placement.
    pub seed: Option<u64>,
}

impl Default for PixelConfig {
    fn default() -> Self {
        Self {
            min_distance: 20,
            allocation_attempts: 1_000,
            calibration_pixels: 9,
            seed: None,
        }
    }
}

impl PixelConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.min_distance == 0 {
            return Err(ConfigError::invalid("pixels.min_distance", "must be positive"));
        }
        if self.allocation_attempts == 0 {
            return Err(ConfigError::invalid(
                "pixels.allocation_attempts",
                "must be positive",
            ));
        }
        if self.calibration_pixels == 0 {
            return Err(ConfigError::invalid(
                "pixels.calibration_pixels",
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// How many pixels an instance asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelCount {
    /// Exactly this many, or fail.
    Exact(usize),
    /// Every free grid position at minimum spacing.
    All,
}

/// Who holds a coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Owner {
    Calibration,
    Instance(u64),
}

/// Coordinates in use across a session.
pub(crate) struct PixelRegistry {
    info: SensorInfo,
    min_distance: u32,
    attempts: u32,
    rng: ChaCha20Rng,
    used: Vec<(PixelCoord, Owner)>,
}

impl PixelRegistry {
    pub(crate) fn new(info: SensorInfo, config: &PixelConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::seed_from_u64(rand_core::OsRng.next_u64()),
        };
        Self {
            info,
            min_distance: config.min_distance,
            attempts: config.allocation_attempts,
            rng,
            used: Vec::new(),
        }
    }

    fn is_clear(&self, coord: PixelCoord) -> bool {
        let min_sq = self.min_distance as u64 * self.min_distance as u64;
        self.used.iter().all(|(c, _)| c.distance_sq(&coord) >= min_sq)
    }

    fn random_coord(&mut self) -> PixelCoord {
        let x = (self.rng.next_u64() % self.info.width as u64) as u32;
        let y = (self.rng.next_u64() % self.info.height as u64) as u32;
        PixelCoord::new(x, y)
    }

    /// Reserves coordinates for `owner`. Nothing is reserved on failure.
    pub(crate) fn allocate(&mut self, owner: Owner, count: PixelCount) -> Result<Vec<PixelCoord>> {
        let allocated = match count {
            PixelCount::Exact(0) => {
                return Err(Error::InvalidArgument(
                    "pixel count must be positive".into(),
                ))
            }
            PixelCount::Exact(n) => self.allocate_random(owner, n)?,
            PixelCount::All => self.allocate_grid(owner)?,
        };
        tracing::debug!(
            owner = ?owner,
            pixels = allocated.len(),
            total = self.used.len(),
            "Pixels allocated"
        );
        Ok(allocated)
    }

    fn allocate_random(&mut self, owner: Owner, n: usize) -> Result<Vec<PixelCoord>> {
        let mut coords = Vec::with_capacity(n);
        for _ in 0..n {
            let mut found = None;
            for _ in 0..self.attempts {
                let c = self.random_coord();
                if self.is_clear(c) {
                    found = Some(c);
                    break;
                }
            }
            match found {
                Some(c) => {
                    self.used.push((c, owner));
                    coords.push(c);
                }
                None => {
                    let allocated = coords.len();
                    self.used.retain(|(c, _)| !coords.contains(c));
                    return Err(Error::ResourceExhausted {
                        requested: n,
                        allocated,
                    });
                }
            }
        }
        Ok(coords)
    }

    fn allocate_grid(&mut self, owner: Owner) -> Result<Vec<PixelCoord>> {
        let step = self.min_distance as usize;
        let mut coords = Vec::new();
        for y in (0..self.info.height).step_by(step) {
            for x in (0..self.info.width).step_by(step) {
                let c = PixelCoord::new(x, y);
                if self.is_clear(c) {
                    self.used.push((c, owner));
                    coords.push(c);
                }
            }
        }
        if coords.is_empty() {
            return Err(Error::ResourceExhausted {
                requested: 1,
                allocated: 0,
            });
        }
        Ok(coords)
    }

    /// Frees every coordinate held by `owner`.
    pub(crate) fn release(&mut self, owner: Owner) -> usize {
        let before = self.used.len();
        self.used.retain(|(_, o)| *o != owner);
        before - self.used.len()
    }

    /// Total coordinates in use.
    pub(crate) fn len(&self) -> usize {
        self.used.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn registry(width: u32, height: u32, min_distance: u32) -> PixelRegistry {
        let config = PixelConfig {
            min_distance,
            allocation_attempts: 500,
            calibration_pixels: 1,
            seed: Some(7),
        };
        PixelRegistry::new(SensorInfo { width, height }, &config)
    }

    #[test]
    fn test_allocated_pixels_keep_distance() {
        let mut reg = registry(200, 200, 15);
        let a = reg.allocate(Owner::Instance(1), PixelCount::Exact(10)).unwrap();
        let b = reg.allocate(Owner::Instance(2), PixelCount::Exact(10)).unwrap();

        let all: Vec<_> = a.iter().chain(&b).collect();
        for (i, p) in all.iter().enumerate() {
            for q in &all[i + 1..] {
                assert!(p.distance_sq(q) >= 15 * 15, "{} too close to {}", p, q);
            }
        }
        assert_eq!(reg.len(), 20);
    }

    #[test]
    fn test_exhaustion_reserves_nothing() {
        let mut reg = registry(10, 10, 8);
        let err = reg.allocate(Owner::Instance(1), PixelCount::Exact(50)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
        match err {
            Error::ResourceExhausted { requested, allocated } => {
                assert_eq!(requested, 50);
                assert!(allocated < 50);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn test_zero_pixels_invalid() {
        let mut reg = registry(10, 10, 2);
        let err = reg.allocate(Owner::Instance(1), PixelCount::Exact(0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_all_fills_grid_around_existing() {
        let mut reg = registry(40, 40, 10);
        let calib = reg.allocate(Owner::Calibration, PixelCount::Exact(1)).unwrap();
        let grid = reg.allocate(Owner::Instance(1), PixelCount::All).unwrap();

        assert!(!grid.is_empty());
        assert!(grid.len() <= 16);
        assert!(!grid.contains(&calib[0]) || calib[0].x % 10 != 0);

        // Nothing left for a second "all" request.
        let err = reg.allocate(Owner::Instance(2), PixelCount::All).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
    }

    #[test]
    fn test_release_frees_only_owner() {
        let mut reg = registry(300, 300, 5);
        reg.allocate(Owner::Calibration, PixelCount::Exact(3)).unwrap();
        reg.allocate(Owner::Instance(4), PixelCount::Exact(5)).unwrap();

        assert_eq!(reg.release(Owner::Instance(4)), 5);
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.release(Owner::Instance(4)), 0);
    }
}
