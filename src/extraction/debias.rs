//! Whitening policies applied to raw comparison bits.
//!
//! Raw bits are fed in tick order, tagged with the index of the pixel
//! that produced them. Each policy decides whether and what to emit.

use crate::csprng::{BlumBlumShub, CsprngError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Selectable debiasing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebiasMethod {
    /// Pair consecutive raw bits; emit the first of a differing pair.
    #[default]
    VonNeumann,
    /// Pair each pixel's bit with the same pixel's bit from the previous tick.
    InterframeVonNeumann,
    /// XOR bits from distinct pixels of the same tick.
    InterpixelXor,
    /// XOR each raw bit with a Blum-Blum-Shub bit.
    CsprngXor,
    /// Pass raw bits through. Diagnostics only.
    None,
}

impl DebiasMethod {
    /// All methods, for iteration in tests and help output.
    pub const ALL: [DebiasMethod; 5] = [
        Self::VonNeumann,
        Self::InterframeVonNeumann,
        Self::InterpixelXor,
        Self::CsprngXor,
        Self::None,
    ];

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VonNeumann => "von-neumann",
            Self::InterframeVonNeumann => "interframe-von-neumann",
            Self::InterpixelXor => "interpixel-xor",
            Self::CsprngXor => "csprng-xor",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for DebiasMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DebiasMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| format!("unknown debias method: {}", s))
    }
}

/// Counters kept by a [`Debiaser`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebiasStats {
    /// Raw bits fed in.
    pub input_bits: u64,
    /// Bits emitted.
    pub output_bits: u64,
    /// Raw bits discarded (equal pairs, incomplete groups).
    pub discarded_bits: u64,
}

enum Policy {
    VonNeumann { pending: Option<bool> },
    Interframe { previous: HashMap<usize, bool> },
    InterpixelXor { group: usize, buffer: Vec<bool> },
    CsprngXor { bbs: BlumBlumShub },
    Passthrough,
}

/// Stateful debiasing engine for one generator instance.
pub struct Debiaser {
    method: DebiasMethod,
    policy: Policy,
    stats: DebiasStats,
}

impl Debiaser {
    /// Creates a debiaser. `interpixel_group` is the number of pixels XORed
    /// together; `modulus_bits` sizes the Blum-Blum-Shub modulus.
    pub fn new(
        method: DebiasMethod,
        interpixel_group: usize,
        modulus_bits: u32,
    ) -> Result<Self, CsprngError> {
        let policy = match method {
            DebiasMethod::VonNeumann => Policy::VonNeumann { pending: None },
            DebiasMethod::InterframeVonNeumann => Policy::Interframe {
                previous: HashMap::new(),
            },
            DebiasMethod::InterpixelXor => Policy::InterpixelXor {
                group: interpixel_group.max(2),
                buffer: Vec::with_capacity(interpixel_group.max(2)),
            },
            DebiasMethod::CsprngXor => Policy::CsprngXor {
                bbs: BlumBlumShub::new(modulus_bits)?,
            },
            DebiasMethod::None => Policy::Passthrough,
        };
        Ok(Self {
            method,
            policy,
            stats: DebiasStats::default(),
        })
    }

    /// CSPRNG policy with a caller-supplied generator.
    pub fn with_csprng(bbs: BlumBlumShub) -> Self {
        Self {
            method: DebiasMethod::CsprngXor,
            policy: Policy::CsprngXor { bbs },
            stats: DebiasStats::default(),
        }
    }

    /// Active method.
    pub fn method(&self) -> DebiasMethod {
        self.method
    }

    /// Counters since construction.
    pub fn stats(&self) -> DebiasStats {
        self.stats
    }

    /// Feeds one raw bit from pixel `pixel`, appending any output to `out`.
    pub fn feed(&mut self, pixel: usize, bit: bool, out: &mut Vec<bool>) {
        self.stats.input_bits += 1;
        let before = out.len();

        match &mut self.policy {
            Policy::VonNeumann { pending } => match pending.take() {
                None => *pending = Some(bit),
                Some(first) if first != bit => out.push(first),
                Some(_) => self.stats.discarded_bits += 2,
            },
            Policy::Interframe { previous } => match previous.remove(&pixel) {
                None => {
                    previous.insert(pixel, bit);
                }
                Some(first) if first != bit => out.push(first),
                Some(_) => self.stats.discarded_bits += 2,
            },
            Policy::InterpixelXor { group, buffer } => {
                buffer.push(bit);
                if buffer.len() == *group {
                    out.push(buffer.drain(..).fold(false, |acc, b| acc ^ b));
                }
            }
            Policy::CsprngXor { bbs } => out.push(bit ^ bbs.next_bit()),
            Policy::Passthrough => out.push(bit),
        }

        self.stats.output_bits += (out.len() - before) as u64;
    }

    /// Marks the end of a tick.
    ///
    /// Interpixel groups never span ticks, so a partial group is dropped.
    pub fn end_tick(&mut self) {
        if let Policy::InterpixelXor { buffer, .. } = &mut self.policy {
            self.stats.discarded_bits += buffer.len() as u64;
            buffer.clear();
        }
    }

    /// Drops buffered raw bits so nothing pairs across an exposure change.
    ///
    /// Returns the number of bits dropped.
    pub fn clear_pending(&mut self) -> u64 {
        let dropped = match &mut self.policy {
            Policy::VonNeumann { pending } => pending.take().map_or(0, |_| 1),
            Policy::Interframe { previous } => {
                let n = previous.len();
                previous.clear();
                n
            }
            Policy::InterpixelXor { buffer, .. } => {
                let n = buffer.len();
                buffer.clear();
                n
            }
            Policy::CsprngXor { .. } | Policy::Passthrough => 0,
        } as u64;
        self.stats.discarded_bits += dropped;
        dropped
    }
}

impl std::fmt::Debug for Debiaser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debiaser")
            .field("method", &self.method)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
