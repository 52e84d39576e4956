use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use co2_bridge::Config;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(name = "co2-bridge")]
#[command(about = "Serves the latest reading of a serial CO2 sensor over HTTP")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "co2-bridge.toml")]
    config: PathBuf,

    /// Serial device the sensor is attached to (overrides serial.device)
    #[arg(short, long)]
    device: Option<String>,

    /// Address for the HTTP server to listen on (overrides server.http_addr)
    #[arg(long)]
    http_addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "co2_bridge=info,co2_link=info".to_owned());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
        .init();

    let cli = Cli::parse();

    let mut config = if cli.config.exists() {
        info!(path = ?cli.config, "Loading configuration");
        Config::load(&cli.config)?
    } else {
        info!("No configuration file found, using defaults");
        Config::default()
    };

    if let Some(device) = cli.device {
        config.serial.device = Some(device);
    }
    if let Some(http_addr) = cli.http_addr {
        config.server.http_addr = http_addr;
    }

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    co2_bridge::run(config, cancel).await?;

    info!("co2-bridge shut down complete");
    Ok(())
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                return;
            }
            info!("Received Ctrl+C, shutting down...");
            cancel.cancel();
        }
        _ = cancel.cancelled() => {}
    }
}
