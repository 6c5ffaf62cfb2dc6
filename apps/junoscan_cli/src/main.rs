mod report;

use anyhow::{bail, Context, Result};
use clap::Parser;
use junoscan_drivers::config;
use junoscan_drivers::drivers::{JunosNetconfDriver, MockDriver};
use junoscan_drivers::DynDeviceDriver;
use junoscan_engine::{scan, SessionRunner};
use junoscan_model::{FailurePolicy, Variant, JUNOS_STATIC_PARAMETERS};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "junoscan", about = "Read version and hostname from Junos devices over NETCONF")]
struct Cli {
    /// Source inventory *.yml file
    #[arg(short = 's', long = "src_inventory_file", default_value = "inventory.yml")]
    src_inventory_file: PathBuf,

    /// Destination result file; only .csv and .json are written
    #[arg(short = 'd', long = "dst_result_file", default_value = "result.xlsx")]
    dst_result_file: PathBuf,

    /// What to read from each device: software-info or running-config
    #[arg(long, default_value = "software-info")]
    variant: Variant,

    /// Per-host timeout in seconds (default: JUNOSCAN_SESSION_TIMEOUT_SECS or 30)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Report running-config failures and move on instead of stopping
    #[arg(long, default_value_t = false)]
    continue_on_error: bool,

    /// Exit non-zero when any host failed
    #[arg(long, default_value_t = false)]
    strict: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let started = Instant::now();

    let mut runner = SessionRunner::new(device_driver());
    if let Some(secs) = cli.timeout_secs.filter(|secs| *secs > 0) {
        runner = runner.with_timeout(Duration::from_secs(secs));
    }
    if cli.continue_on_error {
        runner = runner.with_policy(FailurePolicy::Continue);
    }

    info!(
        "Scanning {} ({})",
        cli.src_inventory_file.display(),
        cli.variant
    );
    let mut stdout = io::stdout().lock();
    let summary = scan(
        &cli.src_inventory_file,
        &JUNOS_STATIC_PARAMETERS,
        &runner,
        cli.variant,
        &mut stdout,
    )
    .await
    .context("scan aborted")?;
    drop(stdout);

    report::write(&cli.dst_result_file, &summary)?;
    println!("Elapsed time: {:.2}s", started.elapsed().as_secs_f64());

    if cli.strict && summary.failure_count() > 0 {
        bail!(
            "{} of {} hosts failed",
            summary.failure_count(),
            summary.outcomes.len()
        );
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn device_driver() -> DynDeviceDriver {
    if config::use_mock_driver() {
        Arc::new(MockDriver::new())
    } else {
        Arc::new(JunosNetconfDriver)
    }
}
