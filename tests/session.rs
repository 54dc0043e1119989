//! End-to-end session tests driven by a scripted frame source.

use camrng::capture::{
    Brightness, CaptureConfig, ExposureBounds, ExposureState, FrameSource, FrameSourceError,
    MockFrameSource, ParamRange, PixelCoord, PixelTick, SensorInfo,
};
use camrng::error::ErrorKind;
use camrng::extraction::DebiasMethod;
use camrng::{Config, Generator, PixelCount, Session};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

type Script = Box<dyn FnMut(u64, PixelCoord) -> Brightness + Send>;
type Hook = Box<dyn FnMut() + Send>;

struct ScriptedSource {
    script: Script,
    sequence: u64,
    exposure: ExposureState,
    bounds: ExposureBounds,
    applied: Arc<Mutex<Vec<ExposureState>>>,
    fail_on: Vec<u64>,
    fail_open: bool,
    on_capture: Option<Hook>,
    open: bool,
}

impl ScriptedSource {
    fn new(script: impl FnMut(u64, PixelCoord) -> Brightness + Send + 'static) -> Self {
        Self {
            script: Box::new(script),
            sequence: 0,
            exposure: ExposureState::default(),
            bounds: ExposureBounds {
                gain: Some(ParamRange::new(1.0, 16.0)),
                exposure_us: Some(ParamRange::new(100.0, 33_000.0)),
                compensation: None,
            },
            applied: Arc::new(Mutex::new(Vec::new())),
            fail_on: Vec::new(),
            fail_open: false,
            on_capture: None,
            open: false,
        }
    }
}

impl FrameSource for ScriptedSource {
    fn open(&mut self, config: &CaptureConfig) -> Result<SensorInfo, FrameSourceError> {
        if self.fail_open {
            return Err(FrameSourceError::DeviceNotFound("scripted".into()));
        }
        self.open = true;
        Ok(SensorInfo {
            width: config.width,
            height: config.height,
        })
    }

    fn capture(&mut self, coords: &[PixelCoord]) -> Result<PixelTick, FrameSourceError> {
        self.sequence += 1;
        if let Some(hook) = self.on_capture.as_mut() {
            hook();
        }
        if self.fail_on.contains(&self.sequence) {
            return Err(FrameSourceError::CaptureFailed("scripted failure".into()));
        }
        let seq = self.sequence;
        let samples: HashMap<_, _> = coords.iter().map(|&c| (c, (self.script)(seq, c))).collect();
        Ok(PixelTick::new(seq, samples))
    }

    fn current_exposure(&self) -> ExposureState {
        self.exposure
    }

    fn apply_exposure(&mut self, state: &ExposureState) -> Result<(), FrameSourceError> {
        self.exposure = *state;
        self.applied.lock().push(*state);
        Ok(())
    }

    fn hardware_bounds(&self) -> ExposureBounds {
        self.bounds
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        self.open = false;
    }
}

fn base_config() -> Config {
    let mut config = Config::default();
    config.capture.width = 64;
    config.capture.height = 64;
    config.pixels.min_distance = 3;
    config.pixels.calibration_pixels = 1;
    config.pixels.seed = Some(1);
    config.extraction.warmup_ticks = 1;
    config.exposure.enabled = false;
    config
}

/// Every pixel alternates between two levels from tick to tick.
fn alternating(seq: u64, _: PixelCoord) -> Brightness {
    if seq % 2 == 0 {
        0.4
    } else {
        0.6
    }
}

#[test]
fn test_subscribers_see_identical_stream() {
    let mut config = base_config();
    config.extraction.method = DebiasMethod::None;
    let session = Session::new(config).unwrap();
    session.open(Box::new(ScriptedSource::new(alternating))).unwrap();

    let gen = session.acquire(PixelCount::Exact(8)).unwrap();
    let mut a = gen.bools().unwrap();
    let mut b = gen.bools().unwrap();

    for _ in 0..10 {
        session.step().unwrap();
    }

    let a: Vec<bool> = std::iter::from_fn(|| a.try_recv()).collect();
    let b: Vec<bool> = std::iter::from_fn(|| b.try_recv()).collect();
    assert_eq!(a.len(), 72);
    assert_eq!(a, b);

    // Odd ticks are bright, so tick 2 falls and tick 3 rises.
    assert!(a[..8].iter().all(|&bit| !bit));
    assert!(a[8..16].iter().all(|&bit| bit));
}

#[test]
fn test_von_neumann_pairing_modes() {
    let session = Session::new(base_config()).unwrap();
    session.open(Box::new(ScriptedSource::new(alternating))).unwrap();
    let intra = session.acquire(PixelCount::Exact(4)).unwrap();
    let inter = session.acquire(PixelCount::Exact(4)).unwrap();
    inter
        .set_debias_method(DebiasMethod::InterframeVonNeumann)
        .unwrap();
    let mut intra_bits = intra.bools().unwrap();
    let mut inter_bits = inter.bools().unwrap();

    // Raw bits per pixel: F, T, F, T. Within a tick all pixels agree, so
    // intra-stream pairs are always equal; pairs across ticks never are.
    for _ in 0..5 {
        session.step().unwrap();
    }
    assert!(intra_bits.try_recv().is_none());
    let out: Vec<bool> = std::iter::from_fn(|| inter_bits.try_recv()).collect();
    assert_eq!(out, vec![false; 8]);

    let stats = session.stats();
    assert_eq!(stats.raw_bits, 32);
    assert_eq!(stats.emitted_bits, 8);
    assert_eq!(stats.discarded_bits, 16);
}

#[test]
fn test_ties_are_dropped_and_do_not_warm_up() {
    let mut config = base_config();
    config.extraction.warmup_ticks = 2;
    let session = Session::new(config).unwrap();
    session.open(Box::new(ScriptedSource::new(|_, _| 0.5))).unwrap();
    let gen = session.acquire(PixelCount::Exact(4)).unwrap();

    for _ in 0..6 {
        let report = session.step().unwrap();
        assert_eq!(report.raw_bits, 0);
        assert_eq!(report.emitted_bits, 0);
    }
    assert!(!gen.is_ready());
    assert_eq!(session.stats().tied_samples, 20);
}

#[test]
fn test_dark_scene_raises_gain_then_cools_down() {
    let mut config = base_config();
    config.exposure.enabled = true;
    let session = Session::new(config).unwrap();

    let mut source = ScriptedSource::new(|_, _| 0.1);
    source.exposure = ExposureState {
        gain: 8.0,
        exposure_us: 33_000.0,
        compensation: 0.0,
    };
    let applied = Arc::clone(&source.applied);
    session.open(Box::new(source)).unwrap();

    let report = session.step().unwrap();
    let adjustment = report.adjustment.expect("gain should be raised");
    assert_eq!(adjustment.to, 16.0);
    assert_eq!(session.exposure().unwrap().gain, 16.0);
    assert_eq!(session.exposure().unwrap().exposure_us, 33_000.0);
    assert_eq!(applied.lock().len(), 1);

    assert!(session.step().unwrap().adjustment.is_none());
    assert_eq!(applied.lock().len(), 1);
    assert_eq!(session.stats().exposure_adjustments, 1);
}

#[test]
fn test_adjustment_clears_histories() {
    let mut config = base_config();
    config.exposure.enabled = true;
    config.extraction.method = DebiasMethod::None;
    let session = Session::new(config).unwrap();
    session
        .open(Box::new(ScriptedSource::new(|seq, _| {
            0.1 + 0.01 * (seq % 2) as f32
        })))
        .unwrap();
    let _gen = session.acquire(PixelCount::Exact(4)).unwrap();

    assert!(session.step().unwrap().adjustment.is_some());
    // Histories were cleared, so this tick only primes them again.
    assert_eq!(session.step().unwrap().raw_bits, 0);
    assert_eq!(session.step().unwrap().raw_bits, 4);
}

#[test]
fn test_capture_failure_skips_tick() {
    let mut config = base_config();
    config.extraction.method = DebiasMethod::None;
    let session = Session::new(config).unwrap();
    let mut source = ScriptedSource::new(|seq, _| seq as f32 / 100.0);
    source.fail_on = vec![2];
    session.open(Box::new(source)).unwrap();
    let _gen = session.acquire(PixelCount::Exact(2)).unwrap();

    session.step().unwrap();
    assert!(matches!(
        session.step(),
        Err(FrameSourceError::CaptureFailed(_))
    ));
    let report = session.step().unwrap();
    assert_eq!(report.raw_bits, 2);

    let stats = session.stats();
    assert_eq!(stats.skipped_ticks, 1);
    assert_eq!(stats.ticks, 2);
}

#[test]
fn test_open_failure_is_initialization_error() {
    let session = Session::new(base_config()).unwrap();
    let mut source = ScriptedSource::new(alternating);
    source.fail_open = true;

    let err = session.open(Box::new(source)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InitializationFailed);
    assert!(!session.is_active());
    assert_eq!(
        session.acquire(PixelCount::Exact(1)).unwrap_err().kind(),
        ErrorKind::InvalidState
    );
}

#[test]
fn test_draw_on_producer_thread_fails_fast() {
    let session = Session::new(base_config()).unwrap();
    let slot: Arc<Mutex<Option<Generator>>> = Arc::new(Mutex::new(None));
    let observed: Arc<Mutex<Option<ErrorKind>>> = Arc::new(Mutex::new(None));

    let mut source = ScriptedSource::new(alternating);
    source.on_capture = Some(Box::new({
        let slot = Arc::clone(&slot);
        let observed = Arc::clone(&observed);
        move || {
            if let Some(gen) = slot.lock().as_ref() {
                if let Err(e) = gen.next_bool() {
                    *observed.lock() = Some(e.kind());
                }
            }
        }
    }));
    session.start(Box::new(source)).unwrap();
    *slot.lock() = Some(session.acquire(PixelCount::Exact(2)).unwrap());

    let deadline = Instant::now() + Duration::from_secs(5);
    while observed.lock().is_none() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(*observed.lock(), Some(ErrorKind::InvalidState));
    session.reset();
}

#[test]
fn test_draw_on_stepping_thread_fails_fast() {
    let session = Session::new(base_config()).unwrap();
    session.open(Box::new(ScriptedSource::new(alternating))).unwrap();
    let gen = session.acquire(PixelCount::Exact(8)).unwrap();

    session.step().unwrap();
    assert_eq!(gen.next_u32().unwrap_err().kind(), ErrorKind::InvalidState);
    assert_eq!(
        gen.wait_ready(Duration::from_secs(1)).unwrap_err().kind(),
        ErrorKind::InvalidState
    );

    // Once another thread drives the session, this one may block again.
    let driver = session.clone();
    thread::spawn(move || driver.step().unwrap()).join().unwrap();
    assert!(gen.bools().is_ok());
    session.reset();
}

#[test]
fn test_concurrent_consumers_with_producer() {
    let mut config = Config::default();
    config.capture.width = 160;
    config.capture.height = 120;
    config.capture.fps = 120;
    config.pixels.min_distance = 6;
    config.extraction.warmup_ticks = 1;
    config.exposure.enabled = false;
    let session = Session::new(config).unwrap();
    session
        .start(Box::new(MockFrameSource::with_seed(77)))
        .unwrap();

    let ints = session.acquire(PixelCount::Exact(64)).unwrap();
    let dice = session.acquire(PixelCount::Exact(64)).unwrap();

    let a = thread::spawn(move || -> Vec<u32> { ints.values::<u32>().unwrap().take(50).collect() });
    let b = thread::spawn(move || -> Vec<i32> {
        dice.bounded_i32s(6).unwrap().take(200).collect()
    });

    let ints = a.join().unwrap();
    let dice = b.join().unwrap();
    assert_eq!(ints.len(), 50);
    assert_eq!(dice.len(), 200);
    assert!(dice.iter().all(|v| (0..6).contains(v)));

    session.reset();
    session.reset();
    assert_eq!(session.stats().active_instances, 0);
}

#[test]
fn test_reset_unblocks_waiting_consumer() {
    let session = Session::new(base_config()).unwrap();
    session.open(Box::new(ScriptedSource::new(|_, _| 0.5))).unwrap();
    let gen = session.acquire(PixelCount::Exact(2)).unwrap();

    let waiter = thread::spawn(move || gen.next_u64().map_err(|e| e.kind()));
    thread::sleep(Duration::from_millis(50));
    session.reset();

    assert_eq!(waiter.join().unwrap(), Err(ErrorKind::InvalidState));
}
