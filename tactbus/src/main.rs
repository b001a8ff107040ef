/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, ensure, Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};

use tactbus::bus::loopback::LoopbackBus;
use tactbus::config::StackConfig;
use tactbus::periodic::{BackendPreference, PeriodicLoopTimer};
use tactbus::protocol::DeviceId;
use tactbus::safety::{AtomicSafetySignal, SafetyMode, SafetyMonitor};
use tactbus::tactile::sim::SimTactilePuck;
use tactbus::tactile::{PressureVector, TactFormat, TactilePuck, TactileError, NUM_SENSORS};

// ── CLI argument definition ───────────────────────────────────────────────────

/// Periodic tactile polling loop over the in-process loopback bus.
///
/// Example:
///   tactbus --config tactbus.yaml --format top10 --iterations 1000
#[derive(Debug, Parser)]
#[command(
    name = "tactbus",
    about = "Periodic tactile sensor polling on a simulated arm bus",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML stack configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Loop period in seconds (overrides scheduler.period_s).
    #[arg(short = 'p', long = "period")]
    period: Option<f64>,

    /// Timing backend: auto, hard_realtime or timer_fd.
    #[arg(short = 'b', long = "backend")]
    backend: Option<BackendPreference>,

    /// Tactile format: full or top10.
    #[arg(short = 'f', long = "format")]
    format: Option<TactFormat>,

    /// Stop after this many control cycles (default: run until Ctrl-C).
    #[arg(short = 'n', long = "iterations")]
    iterations: Option<u64>,

    /// Use the bounded real-time receive path for tactile reads.
    #[arg(short = 'r', long = "realtime", default_value_t = false)]
    realtime: bool,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_thread_names(true)
        .init();

    let cli = Cli::parse();
    info!(
        config     = ?cli.config,
        period     = ?cli.period,
        backend    = ?cli.backend,
        format     = ?cli.format,
        iterations = ?cli.iterations,
        realtime   = cli.realtime,
        "tactbus starting up"
    );

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cfg = load_config(&cli)?;

    // ── Bus and simulated devices ─────────────────────────────────────────────
    let bus = Arc::new(cfg.bus.loopback());
    for &device in &cfg.tactile.devices {
        bus.attach_device(device.get(), SimTactilePuck::new(device, cfg.tactile.properties));
    }

    // ── Safety supervision ────────────────────────────────────────────────────
    let signal = Arc::new(AtomicSafetySignal::new(SafetyMode::Active));
    let monitor = SafetyMonitor::spawn(Arc::clone(&signal), cfg.safety.poll_period)
        .context("Failed to start safety monitor")?;

    // ── Control loop ──────────────────────────────────────────────────────────
    let stop = Arc::new(AtomicBool::new(false));
    let control = {
        let stop = Arc::clone(&stop);
        let iterations = cli.iterations;
        let realtime = cli.realtime;
        thread::Builder::new()
            .name("control-loop".into())
            .spawn(move || control_loop(&cfg, bus, &monitor, &stop, iterations, realtime))
            .context("Failed to spawn control loop thread")?
    };

    {
        let stop = Arc::clone(&stop);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received, stopping control loop");
                stop.store(true, Ordering::Release);
            }
        });
    }

    let stats = tokio::task::spawn_blocking(move || control.join())
        .await
        .context("Failed to wait for control loop")?
        .map_err(|_| anyhow!("control loop thread panicked"))??;

    info!(
        cycles = stats.cycles,
        samples = stats.samples,
        missed = stats.missed,
        "tactbus shut down"
    );
    Ok(())
}

/// Load the configuration file (or defaults) and apply CLI overrides.
fn load_config(cli: &Cli) -> Result<StackConfig> {
    let mut cfg = match &cli.config {
        Some(path) => StackConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration: {}", path.display()))?,
        None => {
            warn!("No configuration file provided, using default settings");
            StackConfig::default()
        }
    };

    if let Some(period) = cli.period {
        ensure!(period.is_finite() && period > 0.0, "--period must be > 0 (got {period})");
        cfg.scheduler.period_s = period;
    }
    if let Some(backend) = cli.backend {
        cfg.scheduler.backend = backend;
    }
    if let Some(format) = cli.format {
        cfg.tactile.format = format;
    }
    Ok(cfg)
}

// ── Control loop ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct LoopStats {
    cycles: u64,
    samples: u64,
    missed: u64,
}

fn control_loop(
    cfg: &StackConfig,
    bus: Arc<LoopbackBus>,
    monitor: &SafetyMonitor,
    stop: &AtomicBool,
    iterations: Option<u64>,
    realtime: bool,
) -> Result<LoopStats> {
    // The hard-RT backend promotes the calling thread, so build the timer here.
    let kind = cfg.scheduler.backend.resolve();
    let mut timer = PeriodicLoopTimer::with_backend(kind, cfg.scheduler.period_s, cfg.scheduler.priority)
        .context("Failed to create periodic loop timer")?;
    info!(
        backend = timer.backend_kind().as_str(),
        period_s = timer.period(),
        "periodic loop timer ready"
    );

    let mut pucks = Vec::with_capacity(cfg.tactile.devices.len());
    for &device in &cfg.tactile.devices {
        match TactilePuck::attach(Arc::clone(&bus), device, cfg.tactile.properties) {
            Ok(puck) => pucks.push(puck),
            Err(e @ TactileError::InitFailed { .. }) => warn!("skipping device: {}", e),
            Err(e) => return Err(e).with_context(|| format!("Failed to attach tactile sensor {device}")),
        }
    }
    ensure!(!pucks.is_empty(), "no tactile sensor could be attached");

    let cycles_per_report = (1.0 / timer.period()).ceil().max(1.0) as u64;
    let mut stats = LoopStats::default();

    while !stop.load(Ordering::Acquire) && iterations.map_or(true, |n| stats.cycles < n) {
        let missed = timer.wait()?;
        if missed > 0 {
            warn!(cycle = stats.cycles, missed, "control loop overran");
            stats.missed += missed;
        }

        if monitor.should_stop() {
            let snapshot = monitor.snapshot();
            warn!(mode = ?snapshot.mode, faults = snapshot.has_faults, "safety stop, leaving control loop");
            break;
        }

        let t = stats.cycles as f64 * timer.period();
        for (idx, puck) in pucks.iter_mut().enumerate() {
            let device = puck.device();
            feed_simulated_contact(&bus, device, t, idx);

            let data = puck.update(cfg.tactile.format, realtime)?;
            let total: f64 = data.iter().sum();
            debug!(device = device.get(), total, "tactile sample");
            stats.samples += 1;

            if stats.cycles % cycles_per_report == 0 {
                let peak = data.iter().copied().fold(0.0, f64::max);
                info!(cycle = stats.cycles, device = device.get(), total, peak, "tactile pressure");
            }
        }
        stats.cycles += 1;
    }

    info!(cycles = stats.cycles, missed = stats.missed, "control loop finished");
    Ok(stats)
}

/// Drive the simulated sensor with a slowly moving contact patch.
fn feed_simulated_contact(bus: &LoopbackBus, device: DeviceId, t: f64, idx: usize) {
    let centre = (t * 0.5 + idx as f64 * 0.25).fract() * NUM_SENSORS as f64;
    let mut sample: PressureVector = [0.0; NUM_SENSORS];
    for (cell, value) in sample.iter_mut().enumerate() {
        let d = cell as f64 - centre;
        *value = 12.0 * (-d * d / 8.0).exp();
    }
    bus.with_device(device.get(), |sim: &mut SimTactilePuck| sim.set_sample(sample));
}
