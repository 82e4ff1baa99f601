//! OBD Monitor - Main Entry Point

use anyhow::Context;
use clap::Parser;
use obd_monitor::{init_logging, log_reading, to_json_line, Monitor, MonitorConfig};
use std::path::PathBuf;
use tracing::info;

/// Poll live OBD-II values from an ELM327 adapter
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial device, overrides the configuration
    #[arg(short, long)]
    device: Option<String>,

    /// Use the built-in simulated adapter
    #[arg(long)]
    mock: bool,

    /// Print readings as JSON lines on stdout
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = MonitorConfig::load(cli.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(device) = cli.device {
        config.serial.device = device;
    }
    config.mock |= cli.mock;

    init_logging(&config.log)?;

    info!("=== OBD Monitor v{} ===", env!("CARGO_PKG_VERSION"));

    let mut monitor = Monitor::spawn(config)
        .await
        .context("failed to start OBD monitor")?;

    loop {
        tokio::select! {
            reading = monitor.next_reading() => match reading {
                Some(reading) if cli.json => println!("{}", to_json_line(&reading)?),
                Some(reading) => log_reading(&reading),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    monitor.stop();
    tokio::task::spawn_blocking(move || monitor.join()).await?;

    Ok(())
}
