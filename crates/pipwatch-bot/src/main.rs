//! pipwatch entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Multi-timeframe FX bot with hybrid tick/candle exit management.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via PIPWATCH_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Log filter directives used when RUST_LOG is unset
    #[arg(long, default_value = "info,pipwatch=debug")]
    log: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    pipwatch_telemetry::init_logging(&args.log, pipwatch_telemetry::LogFormat::from_env())?;

    info!("Starting pipwatch v{}", env!("CARGO_PKG_VERSION"));

    // Config path: CLI arg > PIPWATCH_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("PIPWATCH_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = pipwatch_bot::AppConfig::load(&config_path)?;
    info!(symbols = config.engine.symbols.len(), "Configuration loaded");

    let mut app = pipwatch_bot::Application::new(config)?;
    app.run().await?;

    Ok(())
}
