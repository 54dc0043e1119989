//! Per-pixel sample history and raw bit comparison.
//!
//! Each tracked pixel compares its newest brightness sample against a
//! reference sample: the previous one, or the first sample of the current
//! window. Brighter yields `true`, darker yields `false`, equal yields
//! nothing.

use crate::capture::Brightness;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::VecDeque;

/// Which sample a new sample is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Compare against the immediately preceding sample.
    #[default]
    Consecutive,
    /// Compare against the first sample of the current window.
    Windowed,
}

/// Result of pushing one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    /// No reference yet; the sample became the reference.
    Primed,
    /// A raw bit was produced.
    Bit(bool),
    /// The sample equalled the reference. Nothing is produced.
    Tie,
}

/// Bounded temporal history of one pixel.
#[derive(Debug, Clone)]
pub struct PixelHistory {
    samples: VecDeque<Brightness>,
    window: usize,
    mode: Comparison,
}

impl PixelHistory {
    /// Creates an empty history holding at most `window` samples (minimum 2).
    pub fn new(mode: Comparison, window: usize) -> Self {
        let window = window.max(2);
        Self {
            samples: VecDeque::with_capacity(window),
            window,
            mode,
        }
    }

    /// Appends a sample in arrival order and compares it.
    pub fn push(&mut self, sample: Brightness) -> SampleOutcome {
        let reference = match self.mode {
            Comparison::Consecutive => self.samples.back().copied(),
            Comparison::Windowed => {
                if self.samples.len() >= self.window {
                    // Window closed: this sample opens the next one.
                    self.samples.clear();
                }
                self.samples.front().copied()
            }
        };

        self.samples.push_back(sample);
        while self.samples.len() > self.window {
            self.samples.pop_front();
        }

        match reference {
            None => SampleOutcome::Primed,
            Some(r) => compare(sample, r),
        }
    }

    /// Drops every stored sample.
    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Number of stored samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Stored samples, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = Brightness> + '_ {
        self.samples.iter().copied()
    }
}

fn compare(sample: Brightness, reference: Brightness) -> SampleOutcome {
    match sample.partial_cmp(&reference) {
        Some(Ordering::Greater) => SampleOutcome::Bit(true),
        Some(Ordering::Less) => SampleOutcome::Bit(false),
        _ => SampleOutcome::Tie,
    }
}
