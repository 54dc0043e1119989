//! Frame and per-tick sample types.

use std::collections::HashMap;
use std::time::Instant;

/// Normalized brightness in `[0, 1]`.
pub type Brightness = f32;

/// A sensor pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PixelCoord {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
}

impl PixelCoord {
    /// Creates a coordinate.
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to `other`.
    #[inline]
    pub fn distance_sq(&self, other: &PixelCoord) -> u64 {
        let dx = self.x.abs_diff(other.x) as u64;
        let dy = self.y.abs_diff(other.y) as u64;
        dx * dx + dy * dy
    }
}

impl std::fmt::Display for PixelCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A single captured grayscale frame.
///
/// Sources that decode whole images build one of these and sample
/// the requested coordinates from it.
#[derive(Clone)]
pub struct Frame {
    /// 8-bit luma, row-major.
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    timestamp: Instant,
    sequence: u64,
}

impl Frame {
    /// Creates a new frame with the given parameters.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            pixels,
            width,
            height,
            timestamp: Instant::now(),
            sequence,
        }
    }

    /// Returns a reference to the raw pixel data.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the total number of pixels (width * height).
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Validates that the pixel buffer size matches dimensions.
    pub fn is_valid(&self) -> bool {
        self.pixels.len() == self.pixel_count()
    }

    /// Normalized brightness at `coord`, or `None` outside the frame.
    pub fn brightness_at(&self, coord: PixelCoord) -> Option<Brightness> {
        if coord.x >= self.width || coord.y >= self.height {
            return None;
        }
        let idx = coord.y as usize * self.width as usize + coord.x as usize;
        self.pixels.get(idx).map(|&v| v as Brightness / 255.0)
    }

    /// Samples the requested coordinates into a tick.
    pub fn sample(&self, coords: &[PixelCoord]) -> PixelTick {
        let samples = coords
            .iter()
            .filter_map(|&c| self.brightness_at(c).map(|b| (c, b)))
            .collect();
        PixelTick {
            sequence: self.sequence,
            timestamp: self.timestamp,
            samples,
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}

/// Brightness samples delivered for one tick, keyed by coordinate.
#[derive(Debug, Clone)]
pub struct PixelTick {
    /// Monotonic tick number from the source.
    pub sequence: u64,
    /// Capture instant.
    pub timestamp: Instant,
    /// Brightness per requested coordinate. Missing coordinates contribute nothing.
    pub samples: HashMap<PixelCoord, Brightness>,
}

impl PixelTick {
    /// Creates a tick from explicit samples.
    pub fn new(sequence: u64, samples: HashMap<PixelCoord, Brightness>) -> Self {
        Self {
            sequence,
            timestamp: Instant::now(),
            samples,
        }
    }

    /// Brightness at `coord` in this tick.
    #[inline]
    pub fn get(&self, coord: &PixelCoord) -> Option<Brightness> {
        self.samples.get(coord).copied()
    }

    /// Mean brightness over `coords`, ignoring absent ones.
    pub fn mean_over(&self, coords: &[PixelCoord]) -> Option<f64> {
        let (sum, n) = coords
            .iter()
            .filter_map(|c| self.get(c))
            .fold((0.0f64, 0usize), |(s, n), b| (s + b as f64, n + 1));
        (n > 0).then(|| sum / n as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let pixels = vec![0u8; 640 * 480];
        let frame = Frame::new(pixels, 640, 480, 1);

        assert_eq!(frame.width(), 640);
        assert_eq!(frame.height(), 480);
        assert_eq!(frame.sequence(), 1);
        assert!(frame.is_valid());
    }

    #[test]
    fn test_frame_invalid_size() {
        let pixels = vec![0u8; 100];
        let frame = Frame::new(pixels, 640, 480, 1);

        assert!(!frame.is_valid());
    }

    #[test]
    fn test_sample_skips_out_of_frame() {
        let mut pixels = vec![0u8; 16];
        pixels[4 + 1] = 255;
        let frame = Frame::new(pixels, 4, 4, 7);

        let tick = frame.sample(&[PixelCoord::new(1, 1), PixelCoord::new(9, 9)]);
        assert_eq!(tick.sequence, 7);
        assert_eq!(tick.samples.len(), 1);
        assert_eq!(tick.get(&PixelCoord::new(1, 1)), Some(1.0));
    }

    #[test]
    fn test_mean_over() {
        let mut samples = HashMap::new();
        samples.insert(PixelCoord::new(0, 0), 0.2);
        samples.insert(PixelCoord::new(1, 0), 0.4);
        let tick = PixelTick::new(1, samples);

        let mean = tick
            .mean_over(&[PixelCoord::new(0, 0), PixelCoord::new(1, 0), PixelCoord::new(5, 5)])
            .unwrap();
        assert!((mean - 0.3).abs() < 1e-6);
        assert!(tick.mean_over(&[PixelCoord::new(5, 5)]).is_none());
    }
}
