//! Generator instance handle.

use super::Session;
use crate::bus::{Bus, Subscription};
use crate::capture::PixelCoord;
use crate::error::{Error, Result};
use crate::extraction::{DebiasMethod, RawBit};
use crate::sampling::{
    assemble, check_bound, sample_bounded, Bounded, BoundedDomain, FromBits, Values,
};
use std::time::Duration;

/// Stream of booleans from one generator.
pub type BoolStream = Subscription<bool>;

/// Stream of typed values from one generator.
pub type ValueStream<T> = Values<T, Subscription<bool>>;

/// Stream of bounded integers from one generator.
pub type BoundedStream<D> = Bounded<D, Subscription<bool>>;

/// A random generator attached to a [`Session`].
///
/// All streams and draws of one generator read the same bit sequence;
/// each call subscribes afresh and sees only bits produced after it.
/// Dropping the generator releases its pixels.
pub struct Generator {
    session: Session,
    id: u64,
    pixels: Vec<PixelCoord>,
    bus: Bus<bool>,
    raw_bus: Bus<RawBit>,
}

impl Generator {
    pub(super) fn new(
        session: Session,
        id: u64,
        pixels: Vec<PixelCoord>,
        bus: Bus<bool>,
        raw_bus: Bus<RawBit>,
    ) -> Self {
        Self {
            session,
            id,
            pixels,
            bus,
            raw_bus,
        }
    }

    /// Instance id, unique within the session.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Coordinates tracked by this instance.
    pub fn pixels(&self) -> &[PixelCoord] {
        &self.pixels
    }

    /// Whether the instance has warmed up.
    pub fn is_ready(&self) -> bool {
        self.session.instance_ready(self.id)
    }

    /// Blocks until warmed up or `timeout` elapses. Returns the readiness.
    pub fn wait_ready(&self, timeout: Duration) -> Result<bool> {
        self.session.wait_ready(self.id, timeout)
    }

    /// Switches the debiasing policy.
    pub fn set_debias_method(&self, method: DebiasMethod) -> Result<()> {
        self.session.set_method(self.id, method)
    }

    /// Current debiasing policy, `None` once released.
    pub fn debias_method(&self) -> Option<DebiasMethod> {
        self.session.method(self.id)
    }

    /// Digests `bytes` and queues the digest bits for emission on the next tick.
    ///
    /// Returns the number of bits queued.
    pub fn fold_digest(&self, bytes: &[u8]) -> Result<usize> {
        self.session.fold_digest(self.id, bytes)
    }

    fn subscribe(&self) -> Result<Subscription<bool>> {
        self.session.ensure_blocking_allowed()?;
        if self.bus.is_closed() {
            return Err(Error::state("generator is no longer active"));
        }
        Ok(self.bus.subscribe())
    }

    /// Continuous boolean stream.
    pub fn bools(&self) -> Result<BoolStream> {
        self.subscribe()
    }

    /// Continuous stream of `T` values.
    pub fn values<T: FromBits>(&self) -> Result<ValueStream<T>> {
        Ok(Values::new(self.subscribe()?))
    }

    /// Continuous stream of uniform `i32` in `[0, bound)`.
    pub fn bounded_i32s(&self, bound: i32) -> Result<BoundedStream<i32>> {
        self.bounded(bound)
    }

    /// Continuous stream of uniform `i64` in `[0, bound)`.
    pub fn bounded_i64s(&self, bound: i64) -> Result<BoundedStream<i64>> {
        self.bounded(bound)
    }

    fn bounded<D: BoundedDomain>(&self, bound: D) -> Result<BoundedStream<D>> {
        check_bound(bound)?;
        Ok(Bounded::new(bound, self.subscribe()?)?)
    }

    /// Per-pixel raw comparison bits, before debiasing.
    pub fn raw_bits(&self) -> Result<Subscription<RawBit>> {
        self.session.ensure_blocking_allowed()?;
        if self.raw_bus.is_closed() {
            return Err(Error::state("generator is no longer active"));
        }
        Ok(self.raw_bus.subscribe())
    }

    /// Blocks until one `T` is assembled.
    pub fn next_value<T: FromBits>(&self) -> Result<T> {
        let mut bits = self.subscribe()?;
        assemble(&mut bits).ok_or_else(|| Error::state("generator is no longer active"))
    }

    /// Blocks for one boolean.
    pub fn next_bool(&self) -> Result<bool> {
        self.next_value()
    }

    /// Blocks for one `u8`.
    pub fn next_u8(&self) -> Result<u8> {
        self.next_value()
    }

    /// Blocks for one `u16`.
    pub fn next_u16(&self) -> Result<u16> {
        self.next_value()
    }

    /// Blocks for one `u32`.
    pub fn next_u32(&self) -> Result<u32> {
        self.next_value()
    }

    /// Blocks for one `u64`.
    pub fn next_u64(&self) -> Result<u64> {
        self.next_value()
    }

    /// Blocks for one `i32`.
    pub fn next_i32(&self) -> Result<i32> {
        self.next_value()
    }

    /// Blocks for one `i64`.
    pub fn next_i64(&self) -> Result<i64> {
        self.next_value()
    }

    /// Blocks for one `f32` in `[0, 1)`.
    pub fn next_f32(&self) -> Result<f32> {
        self.next_value()
    }

    /// Blocks for one `f64` in `[0, 1)`.
    pub fn next_f64(&self) -> Result<f64> {
        self.next_value()
    }

    /// Blocks for one uniform `i32` in `[0, bound)`.
    pub fn next_bounded_i32(&self, bound: i32) -> Result<i32> {
        self.next_bounded(bound)
    }

    /// Blocks for one uniform `i64` in `[0, bound)`.
    pub fn next_bounded_i64(&self, bound: i64) -> Result<i64> {
        self.next_bounded(bound)
    }

    fn next_bounded<D: BoundedDomain>(&self, bound: D) -> Result<D> {
        check_bound(bound)?;
        let mut bits = self.subscribe()?;
        Ok(sample_bounded(bound, &mut bits)?)
    }

    /// Detaches from the session and frees the pixels.
    pub fn release(self) {}
}

impl Drop for Generator {
    fn drop(&mut self) {
        self.session.release(self.id);
    }
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("id", &self.id)
            .field("pixels", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::capture::MockFrameSource;
    use crate::config::Config;
    use crate::error::ErrorKind;
    use crate::session::{PixelCount, Session};
    use std::time::Duration;

    fn started_session() -> Session {
        let mut config = Config::default();
        config.capture.width = 200;
        config.capture.height = 200;
        config.capture.fps = 120;
        config.pixels.min_distance = 5;
        config.extraction.warmup_ticks = 1;
        config.exposure.enabled = false;
        let session = Session::new(config).unwrap();
        session
            .start(Box::new(MockFrameSource::with_seed(21)))
            .unwrap();
        session
    }

    #[test]
    fn test_single_draws_block_until_produced() {
        let session = started_session();
        let gen = session.acquire(PixelCount::Exact(64)).unwrap();

        assert!(gen.wait_ready(Duration::from_secs(5)).unwrap());
        let x = gen.next_f64().unwrap();
        assert!((0.0..1.0).contains(&x));
        let b = gen.next_bounded_i32(10).unwrap();
        assert!((0..10).contains(&b));
        gen.next_u64().unwrap();

        session.reset();
    }

    #[test]
    fn test_invalid_bound_rejected() {
        let session = started_session();
        let gen = session.acquire(PixelCount::Exact(4)).unwrap();

        assert_eq!(
            gen.next_bounded_i64(0).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(
            gen.bounded_i32s(-3).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
        session.reset();
    }

    #[test]
    fn test_streams_after_release_fail() {
        let session = started_session();
        let gen = session.acquire(PixelCount::Exact(4)).unwrap();
        let mut stream = gen.bools().unwrap();
        session.reset();

        // Drains what was queued, then ends.
        while stream.recv().is_some() {}
        assert_eq!(gen.bools().unwrap_err().kind(), ErrorKind::InvalidState);
        assert!(gen.debias_method().is_none());
    }

    #[test]
    fn test_bounded_stream_in_range() {
        let session = started_session();
        let gen = session.acquire(PixelCount::Exact(64)).unwrap();

        let values: Vec<i64> = gen.bounded_i64s(6).unwrap().take(50).collect();
        assert_eq!(values.len(), 50);
        assert!(values.iter().all(|v| (0..6).contains(v)));
        session.reset();
    }
}
