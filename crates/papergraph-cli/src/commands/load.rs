use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use papergraph_kb::{
    GraphLoader, GraphStore, LoadPipeline, LoaderOptions, MemoryGraphStore, MissingEndpointPolicy,
    Neo4jGraphStore,
};

use crate::cli::{LoadArgs, StoreKind};
use crate::config::PipelineConfig;

use super::print_json;

/// Loader options from configuration with command line overrides applied.
pub fn loader_options(args: &LoadArgs, config: &PipelineConfig) -> LoaderOptions {
    let mut options = config.loader.options();
    if let Some(mode) = args.property_mode {
        options.property_mode = mode.into();
    }
    if let Some(matching) = args.endpoint_match {
        options.endpoint_match = matching.into();
    }
    if args.strict_endpoints {
        options.missing_endpoint = MissingEndpointPolicy::Fail;
    }
    options
}

pub async fn execute(args: LoadArgs, config: &PipelineConfig) -> Result<()> {
    let path = args.path.clone().unwrap_or_else(|| config.paths.batch_dir.clone());
    let options = loader_options(&args, config);

    match args.store {
        StoreKind::Neo4j => {
            let neo4j = config.require_neo4j()?;
            let store = Neo4jGraphStore::new(neo4j.clone())
                .await
                .context("Failed to connect to Neo4j")?;
            let pipeline = LoadPipeline::new(GraphLoader::new(Arc::new(store), options));
            let summary = pipeline.run_path(&path).await?;
            print_json(&summary)
        },
        StoreKind::Memory => {
            let store = Arc::new(MemoryGraphStore::new());
            let loader = GraphLoader::new(Arc::clone(&store) as Arc<dyn GraphStore>, options);
            let summary = LoadPipeline::new(loader).run_path(&path).await?;
            info!(
                nodes = store.node_count(),
                relationships = store.relationship_count(),
                "Dry run finished; in-memory graph discarded"
            );
            print_json(&summary)
        },
    }
}
