// SPDX-License-Identifier: MIT OR Apache-2.0
//! `fullbody` - event-driven full-body effect timelines
//!
//! A host process that runs the timeline scheduler against an in-memory
//! world:
//! - Loads `fullbody.ron` and its script files into a config snapshot
//! - Pumps real frame deltas into the scheduler at a fixed rate
//! - Replays a demo event feed from a producer thread
//! - Re-asserts sustained offsets after each simulated pose update
//! - Optionally hot-reloads the configuration on file changes
//!
//! ## Architecture
//!
//! The scheduler and the world live on the main thread. The update pump and
//! the demo feed are background producers that only talk to it through a
//! channel and the shared event queue.

mod demo;
mod file_watcher;
mod hot_reload;
mod pump;

use clap::Parser;
use demo::DemoFeeder;
use fullbody_config::FileSnapshotBuilder;
use fullbody_timeline::sim::SimWorld;
use fullbody_timeline::{ConfigStore, EventQueue, Host, PoseExecutor, Scheduler, SustainPhase};
use hot_reload::ConfigReloader;
use pump::UpdatePump;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_LOG_FILTER: &str = "fullbody=info,fullbody_timeline=info,fullbody_config=info";

/// Command-line options
#[derive(Debug, Parser)]
#[command(
    name = "fullbody",
    version,
    about = "Run full-body effect timelines against a simulated scene"
)]
struct Cli {
    /// Path to the manifest
    #[arg(long, default_value = fullbody_config::MANIFEST_FILE_NAME)]
    config: PathBuf,

    /// Scheduler tick rate in Hz
    #[arg(long, default_value_t = pump::DEFAULT_RATE_HZ)]
    hz: f32,

    /// How long to run, in seconds
    #[arg(long, default_value_t = 10.0)]
    seconds: f32,

    /// Reload the configuration when its files change
    #[arg(long)]
    watch: bool,

    /// Quiet period after a file change before reloading, in milliseconds
    #[arg(long, default_value_t = 100)]
    debounce_ms: u64,
}

/// Errors that abort the host
#[derive(Debug, Error)]
enum HostError {
    /// The configuration directory could not be watched
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// A background thread could not be spawned
    #[error("Thread spawn error: {0}")]
    Spawn(#[from] std::io::Error),
}

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting fullbody v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        tracing::error!("fullbody failed: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), HostError> {
    let builder = FileSnapshotBuilder::new(&cli.config);
    let config_dir = builder.manifest_dir().to_path_buf();
    let store = Arc::new(ConfigStore::new(builder));
    if let Err(e) = store.load_initial() {
        tracing::warn!("Continuing with an empty configuration: {e}");
    }

    let queue = Arc::new(EventQueue::new());
    let mut scheduler = Scheduler::new(store.clone(), queue.clone());

    let world = SimWorld::new();
    demo::populate(&world);
    let executor = PoseExecutor::new(&world, &world);
    let host = Host::new(&world, &executor, &world, &world);

    let mut reloader = ConfigReloader::new();
    reloader.set_enabled(cli.watch);
    reloader.set_debounce_duration(Duration::from_millis(cli.debounce_ms));
    if reloader.is_enabled() {
        reloader.watch_directory(&config_dir)?;
        tracing::info!(
            dir = %config_dir.display(),
            watching = reloader.is_watching(&config_dir),
            debounce_ms = cli.debounce_ms,
            "Config: hot reload enabled"
        );
    }

    let running = Arc::new(AtomicBool::new(true));
    let feeder = store
        .snapshot()
        .map(|snapshot| DemoFeeder::from_snapshot(&snapshot, demo::CASTER))
        .unwrap_or_default();
    if feeder.is_empty() {
        tracing::warn!("Demo feed has no events; timelines will stay idle");
    } else {
        tracing::info!(steps = feeder.len(), "Demo feed ready");
    }
    let feed = feeder.spawn(queue.clone(), running.clone())?;

    let (tx, rx) = mpsc::channel();
    let mut pump = UpdatePump::new(cli.hz);
    pump.start(tx)?;

    let deadline = Duration::from_secs_f32(cli.seconds.max(0.0));
    let started = Instant::now();
    let mut ticks = 0u64;
    let mut fired = 0usize;

    while started.elapsed() < deadline {
        let Ok(dt) = rx.recv_timeout(Duration::from_millis(250)) else {
            if !pump.is_running() {
                tracing::warn!("Pump stopped unexpectedly");
                break;
            }
            continue;
        };

        if let Some(Ok(generation)) = reloader.poll(store.as_ref()) {
            tracing::info!(generation, "Config: hot reload applied");
        }

        let report = scheduler.tick(dt, &host);
        ticks += 1;
        fired += report.commands_fired;
        if report.guard_tripped {
            tracing::warn!("Tick aborted by iteration guard");
        }

        world.advance_frame();
        for entity in world.entities() {
            for phase in SustainPhase::ALL {
                scheduler.sustain_after_external_update(entity, phase, &host);
            }
        }
    }

    pump.stop();
    running.store(false, Ordering::SeqCst);
    let pushed = feed.join().unwrap_or_else(|_| {
        tracing::warn!("Demo feed thread panicked");
        0
    });

    if reloader.has_pending() {
        tracing::warn!("Config changes arrived too late to be applied");
    }

    let restored = scheduler.teardown(&host);
    let stats = reloader.stats();
    tracing::info!(
        ticks,
        fired,
        pushed,
        restored,
        reloads = stats.total_reloaded,
        failed_reloads = stats.failed,
        generation = store.generation(),
        "fullbody finished"
    );
    Ok(())
}
