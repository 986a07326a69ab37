//! Text embedding services

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::ClusterError;

#[cfg(feature = "openai")]
pub use openai::OpenAIEmbeddingService;

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, ClusterError>;

    /// Embeds every text, preserving order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ClusterError>;
}

/// Deterministic bag-of-words embeddings for tests and offline runs.
///
/// Every lowercase word is hashed into one of `dimensions` buckets and the
/// resulting count vector is L2-normalized, so texts sharing vocabulary end up
/// close together.
#[derive(Debug, Clone)]
pub struct MockEmbeddingService {
    dimensions: usize,
}

impl MockEmbeddingService {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = fnv1a(&word.to_lowercase()) % self.dimensions as u64;
            embedding[bucket as usize] += 1.0;
        }

        let magnitude: f32 = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut embedding {
                *value /= magnitude;
            }
        }

        embedding
    }
}

impl Default for MockEmbeddingService {
    fn default() -> Self {
        Self::new(384)
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(0xcbf29ce484222325u64, |hash, b| (hash ^ b as u64).wrapping_mul(0x100000001b3))
}

#[async_trait]
impl EmbeddingService for MockEmbeddingService {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, ClusterError> {
        Ok(self.embed(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ClusterError> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }
}

#[cfg(feature = "openai")]
mod openai {
    use async_openai::{
        config::OpenAIConfig,
        types::{CreateEmbeddingRequestArgs, EmbeddingInput},
        Client,
    };
    use async_trait::async_trait;
    use tracing::debug;

    use super::EmbeddingService;
    use crate::error::ClusterError;

    pub struct OpenAIEmbeddingService {
        client: Client<OpenAIConfig>,
        model: String,
        batch_size: usize,
    }

    impl OpenAIEmbeddingService {
        pub fn new(api_key: String, model: String, batch_size: usize) -> Self {
            let config = OpenAIConfig::new().with_api_key(api_key);
            let client = Client::with_config(config);
            Self { client, model, batch_size: batch_size.max(1) }
        }

        async fn request(&self, input: EmbeddingInput) -> Result<Vec<Vec<f32>>, ClusterError> {
            let request = CreateEmbeddingRequestArgs::default()
                .model(&self.model)
                .input(input)
                .build()
                .map_err(|e| ClusterError::Embedding(e.to_string()))?;

            let mut response = self
                .client
                .embeddings()
                .create(request)
                .await
                .map_err(|e| ClusterError::Embedding(e.to_string()))?;

            // The API tags each vector with its input position
            response.data.sort_by_key(|d| d.index);
            Ok(response.data.into_iter().map(|d| d.embedding).collect())
        }
    }

    #[async_trait]
    impl EmbeddingService for OpenAIEmbeddingService {
        async fn embed_text(&self, text: &str) -> Result<Vec<f32>, ClusterError> {
            self.request(EmbeddingInput::String(text.to_string()))
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| ClusterError::Embedding("Empty embedding response".to_string()))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ClusterError> {
            let mut embeddings = Vec::with_capacity(texts.len());
            for (i, chunk) in texts.chunks(self.batch_size).enumerate() {
                debug!("Embedding chunk {} ({} texts) with {}", i, chunk.len(), self.model);
                let vectors = self.request(EmbeddingInput::StringArray(chunk.to_vec())).await?;
                if vectors.len() != chunk.len() {
                    return Err(ClusterError::Embedding(format!(
                        "Expected {} embeddings, got {}",
                        chunk.len(),
                        vectors.len()
                    )));
                }
                embeddings.extend(vectors);
            }
            Ok(embeddings)
        }
    }
}

/// Embedding provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    #[default]
    OpenAI,
    Mock,
}

/// Configuration for embedding services
#[derive(Debug, Clone)]
pub enum EmbeddingServiceConfig {
    OpenAI {
        api_key: String,
        model: String,
        batch_size: usize,
    },
    Mock {
        dimensions: usize,
    },
}

/// Create an embedding service based on configuration
pub fn create_embedding_service(
    config: &EmbeddingServiceConfig,
) -> Result<Arc<dyn EmbeddingService>, ClusterError> {
    match config {
        #[cfg(feature = "openai")]
        EmbeddingServiceConfig::OpenAI { api_key, model, batch_size } => {
            if api_key.is_empty() {
                return Err(ClusterError::Config("OpenAI API key is not configured".to_string()));
            }
            Ok(Arc::new(OpenAIEmbeddingService::new(api_key.clone(), model.clone(), *batch_size)))
        },
        #[cfg(not(feature = "openai"))]
        EmbeddingServiceConfig::OpenAI { .. } => Err(ClusterError::Config(
            "OpenAI provider requires the `openai` feature".to_string(),
        )),
        EmbeddingServiceConfig::Mock { dimensions } => {
            Ok(Arc::new(MockEmbeddingService::new(*dimensions)))
        },
    }
}
