//! Camera Noise Random Number Generation Library
//!
//! Turns the temporal noise of tracked image sensor pixels into an
//! unbiased bit stream and exposes it as typed and bounded random values
//! to any number of independent consumers.
//!
//! # Architecture
//!
//! ```text
//! capture → extraction (compare + debias) → bus → sampling
//!    ↑            ↓
//! exposure ← calibration pixels        analysis (health diagnostics)
//! ```
//!
//! A [`Session`] owns the frame source and runs one producer. Each
//! [`Generator`] acquired from it tracks its own pixels, debiases them with
//! its own policy and publishes to its own ordered, lossless bus.
//!
//! # Design Principles
//!
//! - **One producer per session**: every bit flows through a single tick loop
//! - **No silent drops**: slow consumers throttle the producer
//! - **Bias-free sampling**: power-of-two scaling or rejection, never plain modulo
//! - **No cryptographic claims**: statistical tests are sanity checks, not proofs
//!
//! # Example
//!
//! ```no_run
//! use camrng::{Config, MockFrameSource, PixelCount, Session};
//! use std::time::Duration;
//!
//! let session = Session::new(Config::default()).unwrap();
//! session.start(Box::new(MockFrameSource::new())).unwrap();
//!
//! let gen = session.acquire(PixelCount::Exact(64)).unwrap();
//! gen.wait_ready(Duration::from_secs(5)).unwrap();
//!
//! let die = gen.next_bounded_i32(6).unwrap() + 1;
//! let fraction = gen.next_f64().unwrap();
//! println!("{die} {fraction}");
//!
//! session.reset();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod analysis;
pub mod bus;
pub mod capture;
pub mod conditioning;
pub mod config;
pub mod csprng;
pub mod error;
pub mod exposure;
pub mod extraction;
pub mod metrics;
pub mod sampling;
pub mod session;

// Re-export commonly used types at crate root
pub use analysis::{BitStatistics, HealthMonitor, QualityThresholds};
pub use capture::{CaptureConfig, ExposureState, FrameSource, MockFrameSource, PixelCoord};
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use extraction::{BitBlock, DebiasMethod};
pub use sampling::FromBits;
pub use session::{Generator, PixelCount, Session, SessionStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
