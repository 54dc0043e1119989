//! Camera input and per-tick brightness samples.
//!
//! This module provides the frame source abstraction the session pulls
//! ticks from, together with the exposure types the sensor reports. The
//! camera is treated as a source of raw brightness, not of bits.

mod config;
mod exposure;
mod frame;
mod source;

pub use config::{CaptureConfig, Facing};
pub use exposure::{ExposureBounds, ExposureParam, ExposureState, ParamRange};
pub use frame::{Brightness, Frame, PixelCoord, PixelTick};
pub use source::{FrameSource, FrameSourceError, MockFrameSource, SensorInfo, MOCK_QUANTUM};
