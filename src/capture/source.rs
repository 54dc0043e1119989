//! Frame source abstraction.
//!
//! A frame source is the only thing that talks to sensor hardware. It
//! delivers brightness for the requested coordinates once per tick and
//! reports and accepts exposure settings. A synthetic implementation is
//! provided for tests and demos.

use super::{
    Brightness, CaptureConfig, ExposureBounds, ExposureState, Frame, ParamRange, PixelCoord,
    PixelTick,
};
use rand_chacha::ChaCha20Rng;
use rand_core::{RngCore, SeedableRng};
use thiserror::Error;

/// Errors that can occur during frame source operations.
#[derive(Debug, Error)]
pub enum FrameSourceError {
    #[error("camera device not found: {0}")]
    DeviceNotFound(String),
    #[error("failed to open camera: {0}")]
    OpenFailed(String),
    #[error("failed to configure camera: {0}")]
    ConfigFailed(String),
    #[error("failed to capture frame: {0}")]
    CaptureFailed(String),
    #[error("camera not initialized")]
    NotInitialized,
}

/// Sensor geometry reported when a source is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorInfo {
    /// Active width in pixels.
    pub width: u32,
    /// Active height in pixels.
    pub height: u32,
}

/// Trait for frame source implementations.
///
/// Implementations are driven from a single producer thread.
pub trait FrameSource: Send {
    /// Opens and configures the sensor.
    fn open(&mut self, config: &CaptureConfig) -> Result<SensorInfo, FrameSourceError>;

    /// Captures one tick and returns brightness for `coords`.
    fn capture(&mut self, coords: &[PixelCoord]) -> Result<PixelTick, FrameSourceError>;

    /// Exposure currently programmed into the sensor.
    fn current_exposure(&self) -> ExposureState;

    /// Reprograms the sensor exposure.
    fn apply_exposure(&mut self, state: &ExposureState) -> Result<(), FrameSourceError>;

    /// Hardware ranges of the exposure parameters.
    fn hardware_bounds(&self) -> ExposureBounds;

    /// Checks if the source is currently open.
    fn is_open(&self) -> bool;

    /// Closes the source and releases resources.
    fn close(&mut self);
}

/// Synthetic sensor producing quantized noise around an exposure-dependent level.
///
/// The mean brightness scales with gain and exposure time relative to the
/// initial settings and with `2^compensation`, so exposure adjustments have
/// a visible effect. NOT an entropy source: output is ChaCha-seeded.
#[derive(Debug)]
pub struct MockFrameSource {
    rng: ChaCha20Rng,
    scene_level: f64,
    noise_amplitude: f64,
    exposure: ExposureState,
    reference: ExposureState,
    bounds: ExposureBounds,
    info: Option<SensorInfo>,
    sequence: u64,
}

impl MockFrameSource {
    /// Creates a mock sensor seeded from the OS.
    pub fn new() -> Self {
        Self::with_seed(rand_core::OsRng.next_u64())
    }

    /// Creates a mock sensor with a fixed seed.
    pub fn with_seed(seed: u64) -> Self {
        let exposure = ExposureState::default();
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            scene_level: 0.5,
            noise_amplitude: 0.08,
            exposure,
            reference: exposure,
            bounds: ExposureBounds {
                gain: Some(ParamRange::new(1.0, 16.0)),
                exposure_us: Some(ParamRange::new(100.0, 33_000.0)),
                compensation: Some(ParamRange::new(-2.0, 2.0)),
            },
            info: None,
            sequence: 0,
        }
    }

    /// Sets the scene brightness at the initial exposure (0..1).
    pub fn with_scene_level(mut self, level: f64) -> Self {
        self.scene_level = level.clamp(0.0, 1.0);
        self
    }

    /// Sets the noise amplitude as a fraction of full scale.
    pub fn with_noise_amplitude(mut self, amplitude: f64) -> Self {
        self.noise_amplitude = amplitude.clamp(0.0, 1.0);
        self
    }

    /// Replaces the reported hardware bounds.
    pub fn with_bounds(mut self, bounds: ExposureBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Replaces the initial exposure (also used as the brightness reference).
    pub fn with_exposure(mut self, exposure: ExposureState) -> Self {
        self.exposure = exposure;
        self.reference = exposure;
        self
    }

    /// Mean brightness the current exposure produces.
    pub fn expected_level(&self) -> f64 {
        let gain = ratio(self.exposure.gain, self.reference.gain);
        let time = ratio(self.exposure.exposure_us, self.reference.exposure_us);
        let comp = 2f64.powf(self.exposure.compensation - self.reference.compensation);
        (self.scene_level * gain * time * comp).clamp(0.0, 1.0)
    }

    fn render(&mut self, info: SensorInfo) -> Frame {
        let count = info.width as usize * info.height as usize;
        let mut noise = vec![0u8; count];
        self.rng.fill_bytes(&mut noise);

        let level = self.expected_level() * 255.0;
        let amplitude = self.noise_amplitude * 255.0;
        let pixels = noise
            .into_iter()
            .map(|n| {
                let offset = (n as f64 - 127.5) / 127.5 * amplitude;
                (level + offset).round().clamp(0.0, 255.0) as u8
            })
            .collect();

        self.sequence += 1;
        Frame::new(pixels, info.width, info.height, self.sequence)
    }
}

impl Default for MockFrameSource {
    fn default() -> Self {
        Self::new()
    }
}

fn ratio(value: f64, reference: f64) -> f64 {
    if reference > 0.0 {
        value / reference
    } else {
        1.0
    }
}

impl FrameSource for MockFrameSource {
    fn open(&mut self, config: &CaptureConfig) -> Result<SensorInfo, FrameSourceError> {
        config
            .validate()
            .map_err(|e| FrameSourceError::ConfigFailed(e.to_string()))?;
        let info = SensorInfo {
            width: config.width,
            height: config.height,
        };
        self.info = Some(info);
        self.sequence = 0;
        tracing::info!(
            width = info.width,
            height = info.height,
            facing = ?config.facing,
            "MockFrameSource opened"
        );
        Ok(info)
    }

    fn capture(&mut self, coords: &[PixelCoord]) -> Result<PixelTick, FrameSourceError> {
        let info = self.info.ok_or(FrameSourceError::NotInitialized)?;
        let frame = self.render(info);
        Ok(frame.sample(coords))
    }

    fn current_exposure(&self) -> ExposureState {
        self.exposure
    }

    fn apply_exposure(&mut self, state: &ExposureState) -> Result<(), FrameSourceError> {
        if self.info.is_none() {
            return Err(FrameSourceError::NotInitialized);
        }
        if !self.bounds.admits(state) {
            return Err(FrameSourceError::ConfigFailed(format!(
                "exposure out of range: {:?}",
                state
            )));
        }
        self.exposure = *state;
        Ok(())
    }

    fn hardware_bounds(&self) -> ExposureBounds {
        self.bounds
    }

    fn is_open(&self) -> bool {
        self.info.is_some()
    }

    fn close(&mut self) {
        self.info = None;
        tracing::info!("MockFrameSource closed");
    }
}

/// Brightness produced by a [`MockFrameSource`] is quantized to this step.
pub const MOCK_QUANTUM: Brightness = 1.0 / 255.0;
