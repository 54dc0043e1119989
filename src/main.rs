//! Camera Noise RNG CLI
//!
//! Command-line interface for drawing random values from a session. The
//! binary drives the synthetic sensor; real cameras plug in through the
//! `FrameSource` trait.

use camrng::{
    analysis::HealthMonitor,
    capture::MockFrameSource,
    extraction::{BitBlock, DebiasMethod},
    sampling::FromBits,
    Config, Generator, PixelCount, Session,
};
use clap::{Parser, ValueEnum};
use std::fmt::Display;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Output type of the drawn values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Kind {
    Bool,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Bounded,
}

#[derive(Parser, Debug)]
#[command(name = "camrng", version, about = "Random values from image sensor noise")]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pixels to track (all free grid positions if omitted)
    #[arg(long)]
    pixels: Option<usize>,

    /// Debiasing method (von-neumann, interframe-von-neumann, interpixel-xor, csprng-xor, none)
    #[arg(long)]
    method: Option<DebiasMethod>,

    /// Type of value to print
    #[arg(long, value_enum, default_value_t = Kind::U32)]
    kind: Kind,

    /// Exclusive upper bound for `--kind bounded`
    #[arg(long, default_value_t = 100)]
    bound: i64,

    /// Number of values to print
    #[arg(long, default_value_t = 10)]
    count: usize,

    /// Print until interrupted
    #[arg(long)]
    continuous: bool,

    /// Scene brightness of the synthetic sensor (0-1)
    #[arg(long, default_value_t = 0.5)]
    scene_level: f64,

    /// Serve Prometheus metrics on this port
    #[cfg(feature = "metrics")]
    #[arg(long)]
    metrics_port: Option<u16>,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> camrng::Result<()> {
    info!("Camera noise RNG v{}", camrng::VERSION);

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(method) = args.method {
        config.extraction.method = method;
    }

    let session = Session::new(config)?;
    let source = MockFrameSource::new().with_scene_level(args.scene_level);
    session.start(Box::new(source))?;

    #[cfg(feature = "metrics")]
    if let Some(port) = args.metrics_port {
        spawn_metrics_server(&session, port);
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        let session = session.clone();
        let handler = ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
            session.reset();
        });
        if let Err(e) = handler {
            warn!("Failed to install Ctrl-C handler: {}", e);
        }
    }

    let count = match args.pixels {
        Some(n) => PixelCount::Exact(n),
        None => PixelCount::All,
    };
    let gen = session.acquire(count)?;
    info!(pixels = gen.pixels().len(), "Waiting for warm-up...");
    if !gen.wait_ready(Duration::from_secs(30))? {
        warn!("Generator not warmed up after 30s, continuing anyway");
    }

    let limit = (!args.continuous).then_some(args.count);
    let printed = match args.kind {
        Kind::Bool => print_values::<bool>(&gen, limit, &running)?,
        Kind::U8 => print_values::<u8>(&gen, limit, &running)?,
        Kind::U16 => print_values::<u16>(&gen, limit, &running)?,
        Kind::U32 => print_values::<u32>(&gen, limit, &running)?,
        Kind::U64 => print_values::<u64>(&gen, limit, &running)?,
        Kind::F32 => print_values::<f32>(&gen, limit, &running)?,
        Kind::F64 => print_values::<f64>(&gen, limit, &running)?,
        Kind::Bounded => {
            let stream = gen.bounded_i64s(args.bound)?;
            print_stream(stream, limit, &running)
        }
    };
    info!(values = printed, "Output finished");

    if running.load(Ordering::SeqCst) {
        report_health(&gen)?;
    }

    let stats = session.stats();
    info!(
        ticks = stats.ticks,
        raw_bits = stats.raw_bits,
        emitted_bits = stats.emitted_bits,
        ties = stats.tied_samples,
        discarded = stats.discarded_bits,
        exposure_adjustments = stats.exposure_adjustments,
        skipped = stats.skipped_ticks,
        "Session stats"
    );

    drop(gen);
    session.reset();
    Ok(())
}

fn print_values<T: FromBits + Display>(
    gen: &Generator,
    limit: Option<usize>,
    running: &AtomicBool,
) -> camrng::Result<usize> {
    Ok(print_stream(gen.values::<T>()?, limit, running))
}

fn print_stream<T: Display>(
    stream: impl Iterator<Item = T>,
    limit: Option<usize>,
    running: &AtomicBool,
) -> usize {
    let mut printed = 0;
    for value in stream {
        println!("{}", value);
        printed += 1;
        if limit.is_some_and(|n| printed >= n) || !running.load(Ordering::SeqCst) {
            break;
        }
    }
    printed
}

fn report_health(gen: &Generator) -> camrng::Result<()> {
    let mut health = HealthMonitor::default();
    for _ in 0..3 {
        let sample: BitBlock = gen.bools()?.take(4096).collect();
        health.analyze(&sample);
    }

    let metrics = health.metrics();
    if let Some(stats) = &metrics.latest_stats {
        info!(
            bias = stats.bit_bias,
            autocorrelation = stats.autocorrelation,
            longest_run = stats.longest_run,
            "Output statistics"
        );
    }
    match &metrics.last_violation {
        None if metrics.is_healthy => info!("Output health: OK"),
        None => info!("Output health: not enough samples"),
        Some(violation) => warn!("Output health: {}", violation),
    }
    Ok(())
}

#[cfg(feature = "metrics")]
fn spawn_metrics_server(session: &Session, port: u16) {
    use camrng::metrics::{MetricsRegistry, MetricsServer, MetricsServerConfig};

    let registry = match MetricsRegistry::new() {
        Ok(r) => r,
        Err(e) => {
            warn!("Metrics disabled: {}", e);
            return;
        }
    };
    let server = MetricsServer::new(MetricsServerConfig::with_port(port), registry)
        .with_session(session.clone());

    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                warn!("Metrics runtime failed: {}", e);
                return;
            }
        };
        if let Err(e) = runtime.block_on(server.run()) {
            warn!("Metrics server stopped: {}", e);
        }
    });
}
