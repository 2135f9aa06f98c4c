// src/main.rs
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use thermoled::{
    config::{CliArgs, Settings, load_config_file},
    controller::CpufreqSet,
    indicator::{Indicator, LedBank},
    monitor::Monitor,
};

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli_args = CliArgs::parse();
    init_tracing(cli_args.verbose);

    // Setup termination flag and Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Error setting Ctrl-C handler")?;

    // Merge configurations (CLI > File > Default)
    let file_config = load_config_file(cli_args.config.as_deref())?;
    let settings = Settings::resolve(&cli_args, file_config)?;

    // sysfs LED and cpufreq writes need root
    if unsafe { libc::geteuid() } != 0 {
        warn!("Not running as root; LED and frequency changes will likely fail.");
    }

    let indicator = if settings.indicator_enabled() {
        Indicator::spawn(LedBank::new(settings.leds.clone()), settings.blink)
            .context("Failed to start LED indicator thread")?
    } else {
        info!("LED output disabled.");
        Indicator::disabled()
    };

    info!(
        "Thresholds: cool <= {}°C, hot >= {}°C; governor '{}'; interval {}s; log {}",
        settings.thresholds.low,
        settings.thresholds.high,
        settings.governor,
        settings.interval.as_secs(),
        settings.log_file.display()
    );

    let freq = CpufreqSet::new(settings.freq_command.clone());
    let mut monitor = Monitor::new(settings, freq, indicator, Local::now());
    if let Err(e) = monitor.sampler().check_paths() {
        warn!("{}", e);
    }

    monitor.run(&running);

    if !running.load(Ordering::SeqCst) {
        info!("Exited due to signal.");
    }
    Ok(())
}
