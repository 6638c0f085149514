//! edgescope dashboard client - Entry Point

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

/// Live mirror of edgescope edges, trades, strategies and swarm health
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via EDGESCOPE_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, Default)]
enum Command {
    /// Load everything, follow the push stream and log changes until Ctrl-C
    #[default]
    Watch,
    /// Print the composite summary as JSON and exit
    Summary,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    edgescope_stream::init_crypto();

    let args = Args::parse();

    edgescope_telemetry::init_logging()?;

    info!("Starting edgescope v{}", env!("CARGO_PKG_VERSION"));

    let config_path = edgescope_app::AppConfig::resolve_path(args.config);
    info!(config_path = %config_path, "Loading configuration");

    let config = edgescope_app::AppConfig::from_file(&config_path)?;
    info!(
        api = %config.api.base_url,
        stream = %config.stream.url,
        "Configuration loaded"
    );

    let app = edgescope_app::Application::new(config)?;

    match args.command.unwrap_or_default() {
        Command::Watch => app.run().await?,
        Command::Summary => println!("{}", app.summary_json().await?),
    }

    Ok(())
}
