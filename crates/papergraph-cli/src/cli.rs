use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use papergraph_cluster::EmbeddingProvider;
use papergraph_kb::{EndpointMatch, PropertyMode};

#[derive(Debug, Parser)]
#[command(name = "papergraph")]
#[command(about = "Load per-document graph batches into Neo4j and cluster paper abstracts")]
#[command(version)]
pub struct Cli {
    /// Config file path (defaults to ./papergraph.toml when present)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit JSON logs (overrides config file)
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upsert node/relationship batch files into the graph
    Load(LoadArgs),

    /// Embed and cluster an abstracts CSV
    Cluster(ClusterArgs),
}

/// Where loaded batches go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    Neo4j,
    /// In-process graph; nothing is persisted
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PropertyModeArg {
    Merge,
    Replace,
}

impl From<PropertyModeArg> for PropertyMode {
    fn from(mode: PropertyModeArg) -> Self {
        match mode {
            PropertyModeArg::Merge => PropertyMode::Merge,
            PropertyModeArg::Replace => PropertyMode::Replace,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EndpointMatchArg {
    Composite,
    Id,
}

impl From<EndpointMatchArg> for EndpointMatch {
    fn from(matching: EndpointMatchArg) -> Self {
        match matching {
            EndpointMatchArg::Composite => EndpointMatch::Composite,
            EndpointMatchArg::Id => EndpointMatch::Id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderArg {
    Openai,
    Mock,
}

impl From<ProviderArg> for EmbeddingProvider {
    fn from(provider: ProviderArg) -> Self {
        match provider {
            ProviderArg::Openai => EmbeddingProvider::OpenAI,
            ProviderArg::Mock => EmbeddingProvider::Mock,
        }
    }
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    /// Batch file or directory of batch files (defaults to paths.batch_dir)
    pub path: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "neo4j")]
    pub store: StoreKind,

    #[arg(long, value_enum)]
    pub property_mode: Option<PropertyModeArg>,

    #[arg(long, value_enum)]
    pub endpoint_match: Option<EndpointMatchArg>,

    /// Fail a batch when a relationship endpoint is missing
    #[arg(long)]
    pub strict_endpoints: bool,
}

#[derive(Debug, Args)]
pub struct ClusterArgs {
    /// Abstracts CSV (defaults to paths.abstracts_csv)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Clustered CSV (defaults to paths.clustered_csv)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub provider: Option<ProviderArg>,

    #[arg(long)]
    pub min_k: Option<usize>,

    #[arg(long)]
    pub max_k: Option<usize>,

    /// Cluster scatter plot PNG (defaults to paths.plot_png)
    #[arg(long, conflicts_with = "no_plot")]
    pub plot: Option<PathBuf>,

    /// Skip the scatter plot and projected coordinates
    #[arg(long)]
    pub no_plot: bool,
}
