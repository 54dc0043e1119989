//! Prometheus metrics for a running session.
//!
//! # Metrics Exposed
//!
//! ## Tick flow
//! - `camrng_ticks_total`, `camrng_skipped_ticks_total`
//! - `camrng_raw_bits_total`, `camrng_emitted_bits_total`
//! - `camrng_tied_samples_total`, `camrng_discarded_bits_total`
//!
//! ## Exposure
//! - `camrng_exposure_adjustments_total`
//! - `camrng_average_brightness`
//!
//! ## Instances
//! - `camrng_active_instances`, `camrng_tracked_pixels`
//!
//! ## Output health
//! - `camrng_health_status` (1=healthy, 0=unhealthy)
//! - `camrng_bit_bias`, `camrng_autocorrelation`, `camrng_longest_run`
//!
//! # Example
//!
//! ```no_run
//! use camrng::metrics::{MetricsRegistry, MetricsSnapshot};
//! use camrng::session::SessionStats;
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//! registry.update(&MetricsSnapshot::new(SessionStats::default(), None));
//! println!("{}", registry.encode().unwrap());
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, MetricsState, ServerError};
