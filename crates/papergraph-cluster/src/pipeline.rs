//! Abstracts CSV in, clustered CSV out, optionally with a cluster plot.

use ndarray::Array2;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::abstracts::AbstractsTable;
use crate::embedding::EmbeddingService;
use crate::error::ClusterError;
use crate::kmeans::{self, KMeansConfig};
use crate::projection::project_2d;
use crate::report::ClusterReport;
use crate::selection::select_k;
use crate::visualization::{projection_path, save_scatter, write_projection_to_path};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    pub min_k: usize,
    pub max_k: usize,
    pub n_init: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub seed: u64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        let kmeans = KMeansConfig::default();
        Self {
            min_k: 2,
            max_k: 10,
            n_init: kmeans.n_init,
            max_iterations: kmeans.max_iterations,
            tolerance: kmeans.tolerance,
            seed: kmeans.seed,
        }
    }
}

impl ClusteringConfig {
    pub fn kmeans(&self) -> KMeansConfig {
        KMeansConfig {
            n_init: self.n_init,
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            seed: self.seed,
        }
    }
}

/// Stacks embeddings into a matrix, rejecting ragged input.
pub fn to_matrix(embeddings: &[Vec<f32>]) -> Result<Array2<f64>, ClusterError> {
    let dims = embeddings.first().map_or(0, Vec::len);
    let mut data = Array2::zeros((embeddings.len(), dims));
    for (i, embedding) in embeddings.iter().enumerate() {
        if embedding.len() != dims {
            return Err(ClusterError::DimensionMismatch {
                expected: dims,
                found: embedding.len(),
            });
        }
        for (j, v) in embedding.iter().enumerate() {
            data[[i, j]] = *v as f64;
        }
    }
    Ok(data)
}

pub struct ClusterPipeline {
    embedder: Arc<dyn EmbeddingService>,
    config: ClusteringConfig,
    plot: Option<PathBuf>,
}

impl ClusterPipeline {
    pub fn new(embedder: Arc<dyn EmbeddingService>, config: ClusteringConfig) -> Self {
        Self { embedder, config, plot: None }
    }

    /// Also render a scatter plot to `path` on [`run`](Self::run), with the
    /// projected coordinates written beside the clustered table.
    pub fn with_plot(mut self, path: impl Into<PathBuf>) -> Self {
        self.plot = Some(path.into());
        self
    }

    /// Embeds and clusters the table, returning one label per row.
    pub async fn cluster_table(
        &self,
        table: &AbstractsTable,
    ) -> Result<(Vec<usize>, ClusterReport), ClusterError> {
        let (_, labels, report) = self.cluster_embeddings(table).await?;
        Ok((labels, report))
    }

    async fn cluster_embeddings(
        &self,
        table: &AbstractsTable,
    ) -> Result<(Array2<f64>, Vec<usize>, ClusterReport), ClusterError> {
        if table.is_empty() {
            return Err(ClusterError::NoAbstracts);
        }

        let texts = table.texts();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != texts.len() {
            return Err(ClusterError::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        let data = to_matrix(&embeddings)?;
        info!("Embedded {} abstracts into {} dimensions", data.nrows(), data.ncols());

        let kmeans_config = self.config.kmeans();
        let selection =
            select_k(data.view(), self.config.min_k, self.config.max_k, &kmeans_config)?;

        let labels = if selection.k <= 1 {
            warn!("Only {} abstracts; assigning all to cluster 0", data.nrows());
            vec![0; data.nrows()]
        } else {
            kmeans::fit(data.view(), selection.k, &kmeans_config)?.labels
        };

        let report = ClusterReport::build(table, &labels, selection.k, selection.scores);
        Ok((data, labels, report))
    }

    #[instrument(skip(self), fields(input = %input.display(), output = %output.display()))]
    pub async fn run(&self, input: &Path, output: &Path) -> Result<ClusterReport, ClusterError> {
        let table = AbstractsTable::from_path(input)?;
        let (data, labels, report) = self.cluster_embeddings(&table).await?;
        table.write_clustered_to_path(output, &labels)?;

        if let Some(plot) = &self.plot {
            let coords = project_2d(data.view(), self.config.seed);
            write_projection_to_path(&projection_path(output), &table, coords.view(), &labels)?;
            save_scatter(plot, coords.view(), &labels)?;
        }
        report.log();
        Ok(report)
    }
}
