use anyhow::{Context, Result};
use clap::Parser;

use papergraph_cli::{commands, logging, Cli, PipelineConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        PipelineConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if cli.json_logs {
        config.logging.json = true;
    }

    logging::init_logging(&config.logging).context("Failed to initialize logging")?;

    commands::run(cli.command, &config).await
}
