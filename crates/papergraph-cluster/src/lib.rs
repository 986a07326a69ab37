//! Papergraph abstract clustering
//!
//! Embeds paper abstracts, picks a cluster count by silhouette score and labels
//! every abstract with its k-means cluster. A PCA projection of the embeddings
//! can be plotted as a scatter coloured by cluster.

pub mod abstracts;
pub mod embedding;
pub mod error;
pub mod kmeans;
pub mod pipeline;
pub mod projection;
pub mod report;
pub mod selection;
pub mod silhouette;
pub mod visualization;

pub use abstracts::{AbstractsTable, CLUSTER_COLUMN};
pub use embedding::{
    create_embedding_service, EmbeddingProvider, EmbeddingService, EmbeddingServiceConfig,
    MockEmbeddingService,
};
#[cfg(feature = "openai")]
pub use embedding::OpenAIEmbeddingService;
pub use error::ClusterError;
pub use kmeans::{KMeansConfig, KMeansModel};
pub use pipeline::{ClusterPipeline, ClusteringConfig};
pub use projection::project_2d;
pub use report::{ClusterReport, ClusterSummary, Preview};
pub use selection::{select_k, KScore, KSelection};
pub use silhouette::silhouette_score;
pub use visualization::{projection_path, render_scatter, save_scatter};
