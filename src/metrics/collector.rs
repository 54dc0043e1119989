//! Metrics collection and registry.

use crate::analysis::HealthMetrics;
use crate::session::SessionStats;
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of session and health state for a metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Session counters.
    pub session: SessionStats,
    /// Whether the monitored output is healthy.
    pub is_healthy: bool,
    /// Bit bias from the latest health check.
    pub bit_bias: Option<f64>,
    /// Autocorrelation from the latest health check.
    pub autocorrelation: Option<f64>,
    /// Longest run from the latest health check.
    pub longest_run: Option<usize>,
}

impl MetricsSnapshot {
    /// Builds a snapshot from session counters and optional health metrics.
    pub fn new(session: SessionStats, health: Option<&HealthMetrics>) -> Self {
        let latest = health.and_then(|h| h.latest_stats.as_ref());
        Self {
            session,
            is_healthy: health.map_or(false, |h| h.is_healthy),
            bit_bias: latest.map(|s| s.bit_bias),
            autocorrelation: latest.map(|s| s.autocorrelation),
            longest_run: latest.map(|s| s.longest_run),
        }
    }
}

/// Prometheus metrics registry for a session.
pub struct MetricsRegistry {
    registry: Registry,

    // Tick flow
    ticks_total: IntCounter,
    skipped_ticks_total: IntCounter,
    raw_bits_total: IntCounter,
    emitted_bits_total: IntCounter,
    tied_samples_total: IntCounter,
    discarded_bits_total: IntCounter,

    // Exposure
    exposure_adjustments_total: IntCounter,
    average_brightness: Gauge,

    // Instances
    active_instances: IntGauge,
    tracked_pixels: IntGauge,

    // Health
    health_status: IntGauge,
    bit_bias: Gauge,
    autocorrelation: Gauge,
    longest_run: IntGauge,
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, MetricsError> {
    let c = IntCounter::new(name, help)?;
    registry.register(Box::new(c.clone()))?;
    Ok(c)
}

fn int_gauge(registry: &Registry, name: &str, help: &str) -> Result<IntGauge, MetricsError> {
    let g = IntGauge::new(name, help)?;
    registry.register(Box::new(g.clone()))?;
    Ok(g)
}

fn gauge(registry: &Registry, name: &str, help: &str) -> Result<Gauge, MetricsError> {
    let g = Gauge::new(name, help)?;
    registry.register(Box::new(g.clone()))?;
    Ok(g)
}

/// Advances a counter to `target`; counters never go backwards.
fn advance(c: &IntCounter, target: u64) {
    let current = c.get();
    if target > current {
        c.inc_by(target - current);
    }
}

impl MetricsRegistry {
    /// Creates a registry with all session metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();
        let r = &registry;

        Ok(Self {
            ticks_total: counter(r, "camrng_ticks_total", "Ticks processed")?,
            skipped_ticks_total: counter(
                r,
                "camrng_skipped_ticks_total",
                "Ticks skipped after a capture failure",
            )?,
            raw_bits_total: counter(r, "camrng_raw_bits_total", "Raw comparison bits")?,
            emitted_bits_total: counter(
                r,
                "camrng_emitted_bits_total",
                "Bits published to generator streams",
            )?,
            tied_samples_total: counter(
                r,
                "camrng_tied_samples_total",
                "Samples equal to their reference",
            )?,
            discarded_bits_total: counter(
                r,
                "camrng_discarded_bits_total",
                "Raw bits discarded by debiasing",
            )?,
            exposure_adjustments_total: counter(
                r,
                "camrng_exposure_adjustments_total",
                "Exposure steps applied",
            )?,
            average_brightness: gauge(
                r,
                "camrng_average_brightness",
                "Calibration pixel mean brightness (0-1)",
            )?,
            active_instances: int_gauge(r, "camrng_active_instances", "Attached generators")?,
            tracked_pixels: int_gauge(
                r,
                "camrng_tracked_pixels",
                "Pixels tracked by generators",
            )?,
            health_status: int_gauge(
                r,
                "camrng_health_status",
                "Output health status (1=healthy, 0=unhealthy)",
            )?,
            bit_bias: gauge(r, "camrng_bit_bias", "Output bit bias (deviation from 0.5)")?,
            autocorrelation: gauge(
                r,
                "camrng_autocorrelation",
                "Lag-1 autocorrelation of output bits",
            )?,
            longest_run: int_gauge(
                r,
                "camrng_longest_run",
                "Longest run of identical output bits",
            )?,
            registry,
        })
    }

    /// Updates all metrics from a snapshot.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        self.update_session(&snapshot.session);

        self.health_status.set(i64::from(snapshot.is_healthy));
        if let Some(bias) = snapshot.bit_bias {
            self.bit_bias.set(bias);
        }
        if let Some(autocorr) = snapshot.autocorrelation {
            self.autocorrelation.set(autocorr);
        }
        if let Some(run) = snapshot.longest_run {
            self.longest_run.set(run as i64);
        }
    }

    /// Updates the session metrics only, leaving health untouched.
    pub fn update_session(&self, s: &SessionStats) {
        advance(&self.ticks_total, s.ticks);
        advance(&self.skipped_ticks_total, s.skipped_ticks);
        advance(&self.raw_bits_total, s.raw_bits);
        advance(&self.emitted_bits_total, s.emitted_bits);
        advance(&self.tied_samples_total, s.tied_samples);
        advance(&self.discarded_bits_total, s.discarded_bits);
        advance(&self.exposure_adjustments_total, s.exposure_adjustments);

        if let Some(level) = s.last_average_brightness {
            self.average_brightness.set(level);
        }
        self.active_instances.set(s.active_instances as i64);
        self.tracked_pixels.set(s.tracked_pixels as i64);
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
