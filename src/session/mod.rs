//! Shared camera session.
//!
//! One [`Session`] owns the frame source, the pixel registry, the exposure
//! state and every attached generator instance. All of that mutable state
//! sits behind a single lock; the frame source has its own lock so a slow
//! capture never blocks readers of session state.
//!
//! ```text
//! FrameSource ──capture──► step() ──┬─► Extractor (per instance) ──► Bus<bool>
//!                                   └─► ExposureController ──► apply_exposure
//! ```

mod generator;
mod registry;

pub use generator::Generator;
pub use registry::{PixelConfig, PixelCount};

use crate::bus::Bus;
use crate::capture::{
    ExposureState, Facing, FrameSource, FrameSourceError, PixelCoord, PixelTick, SensorInfo,
};
use crate::conditioning::DigestBits;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::exposure::{ExposureAdjustment, ExposureController};
use crate::extraction::{DebiasMethod, Extractor, RawBit};
use parking_lot::{Condvar, Mutex};
use registry::{Owner, PixelRegistry};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

/// Cumulative session counters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    /// Ticks processed.
    pub ticks: u64,
    /// Ticks skipped after a capture failure.
    pub skipped_ticks: u64,
    /// Raw comparison bits across all instances.
    pub raw_bits: u64,
    /// Bits published to instance buses, digest bits included.
    pub emitted_bits: u64,
    /// Samples equal to their reference.
    pub tied_samples: u64,
    /// Raw bits discarded by debiasing.
    pub discarded_bits: u64,
    /// Exposure steps applied.
    pub exposure_adjustments: u64,
    /// Attached generator instances.
    pub active_instances: usize,
    /// Coordinates tracked by instances.
    pub tracked_pixels: usize,
    /// Calibration brightness of the last tick.
    pub last_average_brightness: Option<f64>,
}

/// Outcome of one tick.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Sequence number reported by the source.
    pub sequence: u64,
    /// Raw comparison bits this tick.
    pub raw_bits: usize,
    /// Bits published this tick.
    pub emitted_bits: usize,
    /// Ties this tick.
    pub ties: u64,
    /// Calibration brightness.
    pub average_brightness: Option<f64>,
    /// Exposure step applied after this tick, if any.
    pub adjustment: Option<ExposureAdjustment>,
}

struct InstanceState {
    extractor: Extractor,
    bus: Bus<bool>,
    raw_bus: Bus<RawBit>,
    pending_digest: VecDeque<bool>,
    ticks_with_bits: u32,
    ready: bool,
}

impl InstanceState {
    fn close(&self) {
        self.bus.close();
        self.raw_bus.close();
    }
}

struct ActiveSession {
    info: SensorInfo,
    registry: PixelRegistry,
    calibration: Vec<PixelCoord>,
    exposure: ExposureState,
    controller: ExposureController,
    instances: BTreeMap<u64, InstanceState>,
}

impl ActiveSession {
    /// Pixels held by generator instances.
    fn tracked_pixels(&self) -> usize {
        self.registry.len() - self.calibration.len()
    }
}

struct SessionState {
    config: Config,
    active: Option<ActiveSession>,
    stats: SessionStats,
}

struct Producer {
    handle: JoinHandle<()>,
    stop: Arc<AtomicBool>,
}

struct Shared {
    state: Mutex<SessionState>,
    ready: Condvar,
    source: Mutex<Option<Box<dyn FrameSource>>>,
    producer: Mutex<Option<Producer>>,
    producer_thread: Mutex<Option<ThreadId>>,
    driver_thread: Mutex<Option<ThreadId>>,
    next_id: AtomicU64,
}

struct Publication {
    bus: Bus<bool>,
    bits: Vec<bool>,
    raw_bus: Bus<RawBit>,
    raw: Vec<RawBit>,
}

/// Handle to a shared camera session. Clones refer to the same session.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

impl Session {
    /// Creates an inactive session.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SessionState {
                    config,
                    active: None,
                    stats: SessionStats::default(),
                }),
                ready: Condvar::new(),
                source: Mutex::new(None),
                producer: Mutex::new(None),
                producer_thread: Mutex::new(None),
                driver_thread: Mutex::new(None),
                next_id: AtomicU64::new(1),
            }),
        })
    }

    /// Opens `source` and configures the session around it.
    ///
    /// No producer is started; drive the session with [`Session::step`] or
    /// use [`Session::start`].
    pub fn open(&self, mut source: Box<dyn FrameSource>) -> Result<()> {
        let mut slot = self.shared.source.lock();
        let mut state = self.shared.state.lock();
        if state.active.is_some() || slot.is_some() {
            return Err(Error::state("session is already active"));
        }

        let config = state.config.clone();
        let info = source
            .open(&config.capture)
            .map_err(|e| Error::init("opening frame source", e))?;

        let bounds = source.hardware_bounds();
        let reported = source.current_exposure();
        let exposure = reported.clamped(&bounds);
        if exposure != reported {
            if let Err(e) = source.apply_exposure(&exposure) {
                source.close();
                return Err(Error::init("applying initial exposure", e));
            }
        }

        let mut registry = PixelRegistry::new(info, &config.pixels);
        let calibration = match registry.allocate(
            Owner::Calibration,
            PixelCount::Exact(config.pixels.calibration_pixels),
        ) {
            Ok(coords) => coords,
            Err(e) => {
                source.close();
                return Err(e);
            }
        };

        tracing::info!(
            width = info.width,
            height = info.height,
            facing = ?config.capture.facing,
            calibration = calibration.len(),
            "Session opened"
        );

        state.active = Some(ActiveSession {
            info,
            registry,
            calibration,
            exposure,
            controller: ExposureController::new(config.exposure.clone(), bounds),
            instances: BTreeMap::new(),
        });
        *slot = Some(source);
        Ok(())
    }

    /// Opens `source` and spawns the producer thread.
    pub fn start(&self, source: Box<dyn FrameSource>) -> Result<()> {
        self.open(source)?;
        let interval = self.shared.state.lock().config.capture.frame_interval();
        let stop = Arc::new(AtomicBool::new(false));
        let weak = Arc::downgrade(&self.shared);

        let spawned = thread::Builder::new()
            .name("camrng-producer".into())
            .spawn({
                let stop = Arc::clone(&stop);
                move || producer_loop(weak, stop, interval)
            });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.reset();
                return Err(Error::init(
                    "spawning producer thread",
                    FrameSourceError::OpenFailed(e.to_string()),
                ));
            }
        };

        *self.shared.producer_thread.lock() = Some(handle.thread().id());
        *self.shared.producer.lock() = Some(Producer { handle, stop });
        tracing::debug!(interval_ms = interval.as_millis() as u64, "Producer started");
        Ok(())
    }

    /// Runs one tick: capture, debias, exposure control, publish.
    ///
    /// Publishing blocks while any subscriber queue is full. The calling
    /// thread becomes the session's driver: blocking draws on it fail with
    /// `InvalidState` until another thread steps or the session resets.
    pub fn step(&self) -> std::result::Result<TickReport, FrameSourceError> {
        let mut slot = self.shared.source.lock();
        let source = slot.as_mut().ok_or(FrameSourceError::NotInitialized)?;
        *self.shared.driver_thread.lock() = Some(thread::current().id());

        let coords = self.tracked_coords();
        let tick = match source.capture(&coords) {
            Ok(tick) => tick,
            Err(e) => {
                self.shared.state.lock().stats.skipped_ticks += 1;
                return Err(e);
            }
        };

        let (report, publications, exposure) = self.process_tick(&tick);

        if let Some(exposure) = exposure {
            if let Err(e) = source.apply_exposure(&exposure) {
                tracing::warn!(error = %e, "Exposure write rejected");
                let actual = source.current_exposure();
                let mut state = self.shared.state.lock();
                if let Some(active) = state.active.as_mut() {
                    active.exposure = actual.clamped(active.controller.bounds());
                }
            }
        }

        for p in publications {
            p.raw_bus.publish_all(p.raw);
            p.bus.publish_all(p.bits);
        }
        Ok(report)
    }

    fn tracked_coords(&self) -> Vec<PixelCoord> {
        let state = self.shared.state.lock();
        let Some(active) = state.active.as_ref() else {
            return Vec::new();
        };
        let mut coords = active.calibration.clone();
        for inst in active.instances.values() {
            coords.extend(inst.extractor.coords());
        }
        coords
    }

    fn process_tick(
        &self,
        tick: &PixelTick,
    ) -> (TickReport, Vec<Publication>, Option<ExposureState>) {
        let mut report = TickReport {
            sequence: tick.sequence,
            ..Default::default()
        };
        let mut publications = Vec::new();

        let mut guard = self.shared.state.lock();
        let SessionState {
            config,
            active,
            stats,
        } = &mut *guard;
        let Some(active) = active.as_mut() else {
            return (report, publications, None);
        };
        stats.ticks += 1;

        let warmup = config.extraction.warmup_ticks;
        let mut became_ready = false;
        for (id, inst) in active.instances.iter_mut() {
            let discarded_before = inst.extractor.debias_stats().discarded_bits;
            let bits = inst.extractor.process(tick);
            stats.discarded_bits +=
                inst.extractor.debias_stats().discarded_bits - discarded_before;

            if !bits.raw.is_empty() {
                inst.ticks_with_bits = inst.ticks_with_bits.saturating_add(1);
                if !inst.ready && inst.ticks_with_bits >= warmup {
                    inst.ready = true;
                    became_ready = true;
                    tracing::info!(instance = id, "Generator warmed up");
                }
            }

            let mut output = bits.output;
            output.extend(inst.pending_digest.drain(..));

            report.raw_bits += bits.raw.len();
            report.emitted_bits += output.len();
            report.ties += bits.ties;
            publications.push(Publication {
                bus: inst.bus.clone(),
                bits: output,
                raw_bus: inst.raw_bus.clone(),
                raw: bits.raw,
            });
        }
        stats.raw_bits += report.raw_bits as u64;
        stats.emitted_bits += report.emitted_bits as u64;
        stats.tied_samples += report.ties;

        let mut exposure = None;
        report.average_brightness = tick.mean_over(&active.calibration);
        if let Some(average) = report.average_brightness {
            stats.last_average_brightness = Some(average);
            report.adjustment =
                active
                    .controller
                    .evaluate(average, &mut active.exposure, Instant::now());
            if report.adjustment.is_some() {
                stats.exposure_adjustments += 1;
                stats.discarded_bits += active
                    .instances
                    .values_mut()
                    .map(|inst| inst.extractor.clear_histories())
                    .sum::<u64>();
                exposure = Some(active.exposure);
            }
        }
        drop(guard);

        if became_ready {
            self.shared.ready.notify_all();
        }
        tracing::debug!(
            tick = report.sequence,
            raw = report.raw_bits,
            emitted = report.emitted_bits,
            ties = report.ties,
            "Tick processed"
        );
        (report, publications, exposure)
    }

    /// Attaches a new generator instance tracking `count` fresh pixels.
    pub fn acquire(&self, count: PixelCount) -> Result<Generator> {
        let mut guard = self.shared.state.lock();
        let SessionState {
            config,
            active,
            stats,
        } = &mut *guard;
        let active = active
            .as_mut()
            .ok_or_else(|| Error::state("session is not open"))?;

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let owner = Owner::Instance(id);
        let coords = active.registry.allocate(owner, count)?;
        let extractor = match Extractor::new(&coords, &config.extraction) {
            Ok(extractor) => extractor,
            Err(e) => {
                active.registry.release(owner);
                return Err(e.into());
            }
        };

        let capacity = config.bus.capacity_for(coords.len());
        let bus = Bus::new(capacity);
        let raw_bus = Bus::new(capacity);
        active.instances.insert(
            id,
            InstanceState {
                extractor,
                bus: bus.clone(),
                raw_bus: raw_bus.clone(),
                pending_digest: VecDeque::new(),
                ticks_with_bits: 0,
                ready: config.extraction.warmup_ticks == 0,
            },
        );
        stats.active_instances = active.instances.len();
        stats.tracked_pixels = active.tracked_pixels();

        tracing::info!(
            instance = id,
            pixels = coords.len(),
            method = %config.extraction.method,
            "Generator acquired"
        );
        Ok(Generator::new(self.clone(), id, coords, bus, raw_bus))
    }

    /// Detaches an instance. Unknown or already released ids are ignored.
    pub(crate) fn release(&self, id: u64) {
        let mut guard = self.shared.state.lock();
        let SessionState { active, stats, .. } = &mut *guard;
        let Some(active) = active.as_mut() else {
            return;
        };
        let Some(inst) = active.instances.remove(&id) else {
            return;
        };
        inst.close();
        let freed = active.registry.release(Owner::Instance(id));
        stats.active_instances = active.instances.len();
        stats.tracked_pixels = active.tracked_pixels();
        tracing::info!(instance = id, pixels = freed, "Generator released");
    }

    /// Stops the producer, invalidates every instance and closes the source.
    ///
    /// Safe to call at any time, including when nothing is active.
    pub fn reset(&self) {
        let producer = self.shared.producer.lock().take();
        if let Some(p) = &producer {
            p.stop.store(true, Ordering::Release);
        }

        let active = {
            let mut state = self.shared.state.lock();
            state.stats.active_instances = 0;
            state.stats.tracked_pixels = 0;
            state.active.take()
        };
        if let Some(active) = &active {
            active.instances.values().for_each(InstanceState::close);
        }
        self.shared.ready.notify_all();

        if let Some(p) = producer {
            if p.handle.thread().id() != thread::current().id() && p.handle.join().is_err() {
                tracing::warn!("Producer thread panicked");
            }
        }
        *self.shared.producer_thread.lock() = None;
        *self.shared.driver_thread.lock() = None;

        if let Some(mut source) = self.shared.source.lock().take() {
            source.close();
        }
        if let Some(active) = active {
            tracing::info!(instances = active.instances.len(), "Session reset");
        }
    }

    /// Whether a frame source is open.
    pub fn is_active(&self) -> bool {
        self.shared.state.lock().active.is_some()
    }

    /// Snapshot of the session counters.
    pub fn stats(&self) -> SessionStats {
        self.shared.state.lock().stats.clone()
    }

    /// Exposure the session last programmed.
    pub fn exposure(&self) -> Option<ExposureState> {
        self.shared.state.lock().active.as_ref().map(|a| a.exposure)
    }

    /// Sensor geometry of the open source.
    pub fn sensor_info(&self) -> Option<SensorInfo> {
        self.shared.state.lock().active.as_ref().map(|a| a.info)
    }

    /// Calibration pixel coordinates of the open session.
    pub fn calibration_pixels(&self) -> Vec<PixelCoord> {
        self.shared
            .state
            .lock()
            .active
            .as_ref()
            .map(|a| a.calibration.clone())
            .unwrap_or_default()
    }

    /// Copy of the session configuration.
    pub fn config(&self) -> Config {
        self.shared.state.lock().config.clone()
    }

    /// Changes the minimum pixel spacing for the next session.
    pub fn set_min_pixel_distance(&self, distance: u32) -> Result<()> {
        if distance == 0 {
            return Err(Error::InvalidArgument(
                "minimum pixel distance must be positive".into(),
            ));
        }
        let mut state = self.shared.state.lock();
        if state.active.is_some() {
            return Err(Error::state(
                "cannot change pixel distance while the session is active",
            ));
        }
        state.config.pixels.min_distance = distance;
        Ok(())
    }

    /// Selects the camera used by the next session.
    pub fn set_facing(&self, facing: Facing) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.active.is_some() {
            return Err(Error::state(
                "cannot change camera facing while the session is active",
            ));
        }
        state.config.capture.facing = facing;
        Ok(())
    }

    /// Fails when called on the producer thread or on the thread that last
    /// ran [`Session::step`].
    pub(crate) fn ensure_blocking_allowed(&self) -> Result<()> {
        let current = Some(thread::current().id());
        if *self.shared.producer_thread.lock() == current
            || *self.shared.driver_thread.lock() == current
        {
            return Err(Error::state(
                "blocking draw on the producer thread would deadlock",
            ));
        }
        Ok(())
    }

    pub(crate) fn instance_ready(&self, id: u64) -> bool {
        self.with_instance(id, |inst| inst.ready).unwrap_or(false)
    }

    pub(crate) fn wait_ready(&self, id: u64, timeout: Duration) -> Result<bool> {
        self.ensure_blocking_allowed()?;
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        loop {
            let ready = state
                .active
                .as_ref()
                .and_then(|a| a.instances.get(&id))
                .map(|inst| inst.ready)
                .ok_or_else(|| Error::state("generator is no longer active"))?;
            if ready {
                return Ok(true);
            }
            if self
                .shared
                .ready
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return Ok(false);
            }
        }
    }

    pub(crate) fn set_method(&self, id: u64, method: DebiasMethod) -> Result<()> {
        self.with_instance(id, |inst| inst.extractor.set_method(method))
            .ok_or_else(|| Error::state("generator is no longer active"))??;
        tracing::debug!(instance = id, method = %method, "Debias method changed");
        Ok(())
    }

    pub(crate) fn method(&self, id: u64) -> Option<DebiasMethod> {
        self.with_instance(id, |inst| inst.extractor.method())
    }

    pub(crate) fn fold_digest(&self, id: u64, bytes: &[u8]) -> Result<usize> {
        let algorithm = self.shared.state.lock().config.extraction.digest_algorithm;
        let bits = DigestBits::new(&algorithm, bytes);
        let count = bits.len();
        self.with_instance(id, |inst| inst.pending_digest.extend(bits))
            .ok_or_else(|| Error::state("generator is no longer active"))?;
        tracing::debug!(instance = id, bits = count, "Digest queued");
        Ok(count)
    }

    fn with_instance<R>(&self, id: u64, f: impl FnOnce(&mut InstanceState) -> R) -> Option<R> {
        let mut state = self.shared.state.lock();
        state
            .active
            .as_mut()
            .and_then(|a| a.instances.get_mut(&id))
            .map(f)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("active", &self.is_active())
            .field("stats", &self.stats())
            .finish()
    }
}

fn producer_loop(shared: Weak<Shared>, stop: Arc<AtomicBool>, interval: Duration) {
    while !stop.load(Ordering::Acquire) {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        let session = Session { shared };
        let started = Instant::now();

        match session.step() {
            Ok(_) => {}
            Err(FrameSourceError::NotInitialized) => break,
            Err(e) => tracing::warn!(error = %e, "Tick skipped"),
        }
        drop(session);

        if let Some(rest) = interval.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }
    tracing::debug!("Producer stopped");
}
