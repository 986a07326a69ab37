pub mod cluster;
pub mod load;

use anyhow::Result;

use crate::cli::Commands;
use crate::config::PipelineConfig;

pub async fn run(command: Commands, config: &PipelineConfig) -> Result<()> {
    match command {
        Commands::Load(args) => load::execute(args, config).await,
        Commands::Cluster(args) => cluster::execute(args, config).await,
    }
}

/// Writes a serializable result to stdout as pretty JSON.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
