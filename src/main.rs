use anyhow::{Context, Result as AnyhowResult};
use clap::Parser;
use tracing::{info, warn};

use sensorium::cli::{
    handle_generate_config, handle_simulate, handle_validate, handle_version, load_config, Cli, Commands,
};
use sensorium::constants::{ENGINE_FULL_NAME, ENGINE_VERSION};
use sensorium::logging::init_logging;
use sensorium::server::Server;

#[tokio::main]
async fn main() -> AnyhowResult<()> {
    let cli = Cli::parse();

    // Subcommands that don't need the store or logging config
    match &cli.command {
        Some(Commands::Version) => {
            handle_version();
            return Ok(());
        }
        Some(Commands::GenerateConfig { output }) => {
            handle_generate_config(output.as_deref())?;
            return Ok(());
        }
        Some(Commands::Validate { verbose }) => {
            handle_validate(&cli.config, *verbose)?;
            return Ok(());
        }
        _ => {}
    }

    let (config, from_file) = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    init_logging(&cli.logging_overrides(&config.logging))?;

    if !from_file {
        warn!("Config file not found at {}, using defaults", cli.config.display());
    }

    match cli.command {
        Some(Commands::Simulate { url, interval_ms, count, seed }) => {
            handle_simulate(url, interval_ms, count, seed).await?;
        }
        _ => {
            info!("{} v{}", ENGINE_FULL_NAME, ENGINE_VERSION);
            let server = Server::new(config).context("Failed to build server")?;
            server.run().await.context("Server terminated with an error")?;
        }
    }

    Ok(())
}
