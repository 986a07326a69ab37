use anyhow::{Context, Result};
use std::path::PathBuf;

use papergraph_cluster::{create_embedding_service, ClusterPipeline, ClusteringConfig};

use crate::cli::ClusterArgs;
use crate::config::{ConfigError, PipelineConfig};

use super::print_json;

/// Clustering settings with `--min-k`/`--max-k` applied.
pub fn clustering_config(
    args: &ClusterArgs,
    config: &PipelineConfig,
) -> Result<ClusteringConfig, ConfigError> {
    let mut clustering = config.clustering.clone();
    if let Some(min_k) = args.min_k {
        clustering.min_k = min_k;
    }
    if let Some(max_k) = args.max_k {
        clustering.max_k = max_k;
    }
    if clustering.min_k < 2 || clustering.max_k < clustering.min_k {
        return Err(ConfigError::Invalid(format!(
            "cluster range {}..={} is invalid; need 2 <= min_k <= max_k",
            clustering.min_k, clustering.max_k
        )));
    }
    Ok(clustering)
}

/// Plot destination after `--plot`/`--no-plot`, or `None` to skip plotting.
pub fn plot_path(args: &ClusterArgs, config: &PipelineConfig) -> Option<PathBuf> {
    if args.no_plot {
        return None;
    }
    args.plot.clone().or_else(|| config.paths.plot_png.clone())
}

pub async fn execute(args: ClusterArgs, config: &PipelineConfig) -> Result<()> {
    let input = args.input.clone().unwrap_or_else(|| config.paths.abstracts_csv.clone());
    let output = args.output.clone().unwrap_or_else(|| config.paths.clustered_csv.clone());

    let mut embedding = config.embedding.clone();
    if let Some(provider) = args.provider {
        embedding.provider = provider.into();
    }
    let embedder = create_embedding_service(&embedding.service_config()?)?;

    let mut pipeline = ClusterPipeline::new(embedder, clustering_config(&args, config)?);
    if let Some(plot) = plot_path(&args, config) {
        pipeline = pipeline.with_plot(plot);
    }
    let report = pipeline
        .run(&input, &output)
        .await
        .with_context(|| format!("Failed to cluster {}", input.display()))?;

    print_json(&report)
}
