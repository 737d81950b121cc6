//! c51flash self-test.
//!
//! Runs byte write, page erase, bulk write, clear, update, copy and fill
//! against a simulated flash controller configured for the selected device
//! and exits with a non-zero status if any step fails.

use anyhow::{bail, Result};
use c51flash_core::Flash;
use c51flash_hal::DeviceConfig;
use c51flash_hal_sim::{SimController, NOMINAL_SUPPLY_MV};
use clap::Parser;
use log::{info, warn, LevelFilter};
use std::{path::PathBuf, process::ExitCode};

mod config;
mod scenario;

/// Flash utility self-test.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Opts {
    /// Built-in device profile.
    #[arg(short, long, conflicts_with = "config", default_value = "EFM8SB1")]
    device: String,
    /// TOML device profile.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Start of the 24-byte test area (hex with 0x prefix or decimal).
    #[arg(short, long, default_value = "0x1000", value_parser = config::parse_addr)]
    start: u32,
    /// Simulated supply voltage in millivolts.
    #[arg(long, default_value_t = NOMINAL_SUPPLY_MV)]
    supply_mv: u16,
    /// Print the test area after the run.
    #[arg(long)]
    dump: bool,
    /// Increase log verbosity (repeat for more).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn device_config(opts: &Opts) -> Result<DeviceConfig> {
    match &opts.config {
        Some(path) => config::load_profile(path),
        None => config::builtin(&opts.device),
    }
}

fn run(opts: &Opts) -> Result<()> {
    let device = device_config(opts)?;
    config::check_start(&device, opts.start)?;

    let mut sim = SimController::new(device);
    sim.set_supply_mv(opts.supply_mv);
    let mut flash = Flash::new(sim);

    let report = scenario::run(&mut flash, opts.start);
    let stats = flash.controller().stats();
    info!(
        "{} byte writes, {} page erases, {} rejected stores",
        stats.byte_writes, stats.page_erases, stats.rejected
    );
    if stats.unguarded > 0 {
        warn!("{} flash stores ran with interrupts enabled", stats.unguarded);
    }

    if opts.dump {
        print!("{}", scenario::dump(&mut flash, opts.start)?);
    }

    for step in &report.steps {
        let status = match &step.outcome {
            scenario::Outcome::Passed => "ok".to_string(),
            scenario::Outcome::Skipped => "skipped".to_string(),
            scenario::Outcome::Failed(reason) => format!("FAILED: {reason}"),
        };
        println!("{:<12} {status}", step.name);
    }

    if !report.passed() {
        let failed = report.failures().count();
        bail!("{failed} of {} steps failed", report.steps.len());
    }
    Ok(())
}

fn main() -> ExitCode {
    let opts = Opts::parse();
    env_logger::Builder::new()
        .filter_level(log_level(opts.verbose))
        .parse_default_env()
        .init();

    match run(&opts) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
