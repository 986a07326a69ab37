//! Configuration for the papergraph binary
//!
//! Resolved once at startup, lowest precedence first: built-in defaults, the
//! conventional `NEO4J_*` / `OPENAI_API_KEY` variables, the TOML file, then
//! `PAPERGRAPH_*` variables (`__` separates nesting, e.g. `PAPERGRAPH_NEO4J__URI`).

use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

use papergraph_cluster::{ClusteringConfig, EmbeddingProvider, EmbeddingServiceConfig};
use papergraph_kb::{
    EndpointMatch, LoaderOptions, MissingEndpointPolicy, Neo4jConfig, PropertyMode, RetryPolicy,
};

/// Config file read when `--config` is not given, if it exists.
pub const DEFAULT_CONFIG_FILE: &str = "papergraph.toml";
pub const ENV_PREFIX: &str = "PAPERGRAPH";

/// Conventional variables and the key each one provides a default for.
const CONVENTIONAL_VARS: &[(&str, &str)] = &[
    ("NEO4J_URI", "neo4j.uri"),
    ("NEO4J_USERNAME", "neo4j.username"),
    ("NEO4J_PASSWORD", "neo4j.password"),
    ("NEO4J_DATABASE", "neo4j.database"),
    ("OPENAI_API_KEY", "embedding.api_key"),
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoaderSection {
    pub property_mode: PropertyMode,
    pub endpoint_match: EndpointMatch,
    pub missing_endpoint: MissingEndpointPolicy,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_ms: u64,
    pub jitter_factor: f64,
}

impl Default for LoaderSection {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            property_mode: PropertyMode::default(),
            endpoint_match: EndpointMatch::default(),
            missing_endpoint: MissingEndpointPolicy::default(),
            max_attempts: retry.max_attempts,
            initial_backoff_ms: retry.initial_delay_ms,
            backoff_multiplier: retry.multiplier,
            max_backoff_ms: retry.max_delay_ms,
            jitter_factor: retry.jitter_factor,
        }
    }
}

impl LoaderSection {
    pub fn options(&self) -> LoaderOptions {
        LoaderOptions {
            property_mode: self.property_mode,
            endpoint_match: self.endpoint_match,
            missing_endpoint: self.missing_endpoint,
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                initial_delay_ms: self.initial_backoff_ms,
                multiplier: self.backoff_multiplier,
                max_delay_ms: self.max_backoff_ms,
                jitter_factor: self.jitter_factor,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory of per-document batch files.
    pub batch_dir: PathBuf,
    pub abstracts_csv: PathBuf,
    pub clustered_csv: PathBuf,
    /// Cluster scatter plot; coordinates go to `<clustered stem>_projection.csv`.
    pub plot_png: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            batch_dir: PathBuf::from("output"),
            abstracts_csv: PathBuf::from("abstracts.csv"),
            clustered_csv: PathBuf::from("abstracts_clustered.csv"),
            plot_png: Some(PathBuf::from("clusters_visualization.png")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingSection {
    pub provider: EmbeddingProvider,
    pub model: String,
    pub api_key: Option<String>,
    pub batch_size: usize,
    /// Vector size of the mock provider.
    pub dimensions: usize,
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            model: "text-embedding-3-small".to_string(),
            api_key: None,
            batch_size: 64,
            dimensions: 384,
        }
    }
}

impl EmbeddingSection {
    pub fn service_config(&self) -> Result<EmbeddingServiceConfig, ConfigError> {
        match self.provider {
            EmbeddingProvider::OpenAI => {
                let api_key = self
                    .api_key
                    .clone()
                    .filter(|k| !k.trim().is_empty())
                    .ok_or_else(|| {
                        ConfigError::Invalid(format!(
                            "embedding.api_key (or OPENAI_API_KEY) is required for the {} provider",
                            "openai"
                        ))
                    })?;
                Ok(EmbeddingServiceConfig::OpenAI {
                    api_key,
                    model: self.model.clone(),
                    batch_size: self.batch_size,
                })
            },
            EmbeddingProvider::Mock => {
                Ok(EmbeddingServiceConfig::Mock { dimensions: self.dimensions })
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence.
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,papergraph_kb=info,papergraph_cluster=info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub neo4j: Neo4jConfig,
    pub loader: LoaderSection,
    pub paths: PathsConfig,
    pub embedding: EmbeddingSection,
    pub clustering: ClusteringConfig,
    pub logging: LoggingConfig,
}

impl PipelineConfig {
    /// Loads `.env`, then resolves configuration from `path` and the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::load_with_env(path, std::env::vars().collect())
    }

    /// Resolves configuration against an explicit set of environment variables.
    pub fn load_with_env(
        path: Option<&Path>,
        vars: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        for (var, key) in CONVENTIONAL_VARS {
            if let Some(value) = vars.get(*var).filter(|v| !v.is_empty()) {
                builder = builder.set_default(*key, value.as_str())?;
            }
        }

        builder = match path {
            Some(path) => builder.add_source(File::from(path).required(true)),
            None => {
                builder.add_source(File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false))
            },
        };

        let prefixed: HashMap<String, String> = vars
            .into_iter()
            .filter(|(k, _)| k.starts_with(&format!("{}_", ENV_PREFIX)))
            .collect();
        // Values stay strings here; numeric and boolean fields convert on deserialize
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .source(Some(prefixed)),
        );

        let config: PipelineConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.clustering;
        if c.min_k < 2 {
            return Err(ConfigError::Invalid(format!(
                "clustering.min_k must be at least 2, got {}",
                c.min_k
            )));
        }
        if c.max_k < c.min_k {
            return Err(ConfigError::Invalid(format!(
                "clustering.max_k ({}) is smaller than clustering.min_k ({})",
                c.max_k, c.min_k
            )));
        }
        if c.n_init == 0 {
            return Err(invalid("clustering.n_init must be positive"));
        }
        if self.embedding.batch_size == 0 {
            return Err(invalid("embedding.batch_size must be positive"));
        }
        if self.loader.max_attempts == 0 {
            return Err(invalid("loader.max_attempts must be at least 1"));
        }
        if self.loader.backoff_multiplier < 1.0 {
            warn!(
                "loader.backoff_multiplier {} is below 1.0; retry delays will shrink",
                self.loader.backoff_multiplier
            );
        }
        Ok(())
    }

    /// Neo4j settings, provided a password is configured.
    pub fn require_neo4j(&self) -> Result<&Neo4jConfig, ConfigError> {
        if self.neo4j.password.is_empty() {
            return Err(invalid(
                "neo4j.password (or NEO4J_PASSWORD) is required to load into Neo4j",
            ));
        }
        Ok(&self.neo4j)
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid(message.to_string())
}
