//! Bit extraction and debiasing.
//!
//! This module turns per-pixel brightness samples into whitened bits.
//! Each tracked pixel compares its newest sample against a reference to
//! produce a raw bit, and the instance's debiasing policy decides what
//! reaches the output stream.

mod bitstream;
mod config;
mod debias;
mod history;

pub use bitstream::BitBlock;
pub use config::ExtractionConfig;
pub use debias::{DebiasMethod, DebiasStats, Debiaser};
pub use history::{Comparison, PixelHistory, SampleOutcome};

use crate::capture::{PixelCoord, PixelTick};
use crate::csprng::CsprngError;

/// A raw comparison bit before debiasing, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawBit {
    /// Pixel that produced the bit.
    pub coord: PixelCoord,
    /// `true` if the pixel got brighter.
    pub bit: bool,
}

/// Everything one tick produced for one instance.
#[derive(Debug, Clone, Default)]
pub struct TickBits {
    /// Raw bits in pixel order.
    pub raw: Vec<RawBit>,
    /// Debiased output bits in emission order.
    pub output: Vec<bool>,
    /// Samples equal to their reference.
    pub ties: u64,
}

/// Tracked pixels of one instance plus its debiaser.
pub struct Extractor {
    pixels: Vec<(PixelCoord, PixelHistory)>,
    debiaser: Debiaser,
    config: ExtractionConfig,
}

impl Extractor {
    /// Creates an extractor tracking `coords` with the configured policy.
    pub fn new(coords: &[PixelCoord], config: &ExtractionConfig) -> Result<Self, CsprngError> {
        let debiaser = Debiaser::new(
            config.method,
            config.interpixel_group,
            config.csprng_modulus_bits,
        )?;
        Ok(Self::with_debiaser(coords, config, debiaser))
    }

    /// Creates an extractor around an existing debiaser.
    pub fn with_debiaser(
        coords: &[PixelCoord],
        config: &ExtractionConfig,
        debiaser: Debiaser,
    ) -> Self {
        let pixels = coords
            .iter()
            .map(|&c| (c, PixelHistory::new(config.comparison, config.window_size)))
            .collect();
        Self {
            pixels,
            debiaser,
            config: config.clone(),
        }
    }

    /// Processes one tick. Pixels are visited in their tracking order.
    pub fn process(&mut self, tick: &PixelTick) -> TickBits {
        let mut bits = TickBits::default();

        for (index, (coord, history)) in self.pixels.iter_mut().enumerate() {
            let Some(sample) = tick.get(coord) else {
                continue;
            };
            match history.push(sample) {
                SampleOutcome::Bit(bit) => {
                    bits.raw.push(RawBit { coord: *coord, bit });
                    self.debiaser.feed(index, bit, &mut bits.output);
                }
                SampleOutcome::Tie => bits.ties += 1,
                SampleOutcome::Primed => {}
            }
        }
        self.debiaser.end_tick();

        tracing::trace!(
            tick = tick.sequence,
            raw = bits.raw.len(),
            emitted = bits.output.len(),
            ties = bits.ties,
            "Extracted tick"
        );
        bits
    }

    /// Drops all sample histories and any raw bits the debiaser is still
    /// holding, e.g. after an exposure change.
    ///
    /// Returns the number of buffered raw bits dropped.
    pub fn clear_histories(&mut self) -> u64 {
        self.pixels.iter_mut().for_each(|(_, h)| h.clear());
        self.debiaser.clear_pending()
    }

    /// Switches the debiasing policy, discarding any buffered raw bits.
    pub fn set_method(&mut self, method: DebiasMethod) -> Result<(), CsprngError> {
        if method != self.debiaser.method() {
            self.debiaser = Debiaser::new(
                method,
                self.config.interpixel_group,
                self.config.csprng_modulus_bits,
            )?;
        }
        Ok(())
    }

    /// Active policy.
    pub fn method(&self) -> DebiasMethod {
        self.debiaser.method()
    }

    /// Debiaser counters.
    pub fn debias_stats(&self) -> DebiasStats {
        self.debiaser.stats()
    }

    /// Tracked coordinates in order.
    pub fn coords(&self) -> impl Iterator<Item = PixelCoord> + '_ {
        self.pixels.iter().map(|(c, _)| *c)
    }

    /// Number of tracked pixels.
    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }

    /// History of the pixel at `coord`.
    pub fn history(&self, coord: &PixelCoord) -> Option<&PixelHistory> {
        self.pixels.iter().find(|(c, _)| c == coord).map(|(_, h)| h)
    }
}
