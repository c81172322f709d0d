//! rp-conform CLI
//!
//! Runs the conformance checks against one Alpaca device or a simulator.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rp_conform::{load_config, Config, DeviceType, Outcome};
use tokio_util::sync::CancellationToken;
use tracing::Level;

#[derive(Parser)]
#[command(name = "rp-conform")]
#[command(about = "ASCOM Alpaca conformance checker")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Kind of device to test (overrides config file)
    #[arg(long, value_enum)]
    device_type: Option<DeviceType>,

    /// Alpaca host (overrides config file)
    #[arg(long)]
    host: Option<String>,

    /// Alpaca port (overrides config file)
    #[arg(long)]
    port: Option<u16>,

    /// Alpaca device number (overrides config file)
    #[arg(long)]
    device_number: Option<u32>,

    /// Test the built-in simulator instead of a network device
    #[arg(long)]
    simulate: bool,

    /// Write the JSON report to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(device_type) = self.device_type {
            config.device.device_type = device_type;
        }
        if let Some(host) = &self.host {
            config.device.host = host.clone();
        }
        if let Some(port) = self.port {
            config.device.port = port;
        }
        if let Some(device_number) = self.device_number {
            config.device.device_number = device_number;
        }
        if self.simulate {
            config.device.simulate = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };
    args.apply(&mut config);

    let mode = if config.device.simulate {
        " (simulated)"
    } else {
        ""
    };
    tracing::info!(
        "Checking {} {} at {}:{}{}",
        config.device.device_type,
        config.device.device_number,
        config.device.host,
        config.device.port,
        mode
    );

    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping after the current check");
            cancel_for_signal.cancel();
        }
    });

    let report = rp_conform::run(&config, cancel).await?;

    println!("{}", report.summary());
    for issue in report.issues() {
        println!("  {}", issue);
    }

    if let Some(path) = &args.report {
        report.save(path)?;
        tracing::info!("Report written to {:?}", path);
    }

    if report.count(Outcome::Issue) > 0 || report.cancelled {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
