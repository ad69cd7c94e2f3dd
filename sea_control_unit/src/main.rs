//! # SEA Control Unit
//!
//! Fixed-rate controller for the series-elastic-actuator test rig.
//!
//! Loads the session TOML, builds the configured topology (single-loop
//! position PDF or double-loop position/torque cascade), and runs the
//! tick loop against the simulation backend. Ctrl-C requests an orderly
//! stop: the actuator is zeroed and the run record is exported as JSON.

use std::path::PathBuf;
use std::process;
use std::sync::atomic::Ordering;

use clap::Parser;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use sea_common::config::load_config;
use sea_control_unit::recorder::JsonRecorder;
use sea_control_unit::rt::rt_setup;
use sea_control_unit::session::Session;
use sea_control_unit::sim::{SimRig, SimTimer};

/// SEA Control Unit — fixed-rate SEA test rig control loop
#[derive(Parser, Debug)]
#[command(name = "sea_control_unit")]
#[command(version)]
#[command(about = "Fixed-rate control loop for the SEA test rig")]
struct Args {
    /// Path to the session configuration TOML.
    #[arg(default_value = "config/sea.toml")]
    config: PathBuf,

    /// Run record output path (JSON).
    #[arg(long, default_value = "run.json")]
    out: PathBuf,

    /// Stop automatically after this many ticks (default: run until Ctrl-C).
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Run the loop at full speed instead of pacing it to the sample period.
    #[arg(long)]
    unpaced: bool,

    /// CPU core to pin the RT thread to (default: 1).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority (default: 80).
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("SEA Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("SEA Control Unit shutdown complete");
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&args.config)?;
    info!(
        "Config OK: sample_period={}µs, {} profile segments, {} topology",
        config.session.sample_period_us,
        config.profile.len(),
        if config.topology.cascades().len() == 1 {
            "single-loop"
        } else {
            "double-loop"
        },
    );

    rt_setup(args.cpu_core, args.rt_priority)?;

    let period_s = config.session.sample_period_s();
    let rig = SimRig::new(&config.mechanics, period_s);

    let mut timer = SimTimer::new(config.session.sample_period_us);
    if args.unpaced {
        timer = timer.unpaced();
    }
    if let Some(n) = args.max_ticks {
        timer = timer.with_budget(n);
    }

    // Ctrl-C flips the run flag; the loop observes it at the next wake.
    let stop = timer.stop_handle();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        stop.store(false, Ordering::SeqCst);
    })?;

    let recorder = JsonRecorder::new(&args.out);
    let mut session = Session::new(&config, rig, timer, recorder)?;
    info!("Session initialized, entering control loop");

    let summary = session.run()?;

    info!(
        "Run complete: {} ticks, {} samples exported to {}",
        summary.ticks,
        summary.exported_samples,
        args.out.display(),
    );
    if let Some(done) = summary.completion_ticks {
        info!("Profile completed at tick {done}");
    }
    info!(
        "Tick timing: avg={}ns max={}ns",
        summary.stats.avg_ns(),
        summary.stats.max_ns,
    );

    Ok(())
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
