use clap::Parser;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::path::PathBuf;
use tempfile::TempDir;

use papergraph_cli::cli::{Cli, Commands, StoreKind};
use papergraph_cli::commands::cluster::{clustering_config, plot_path};
use papergraph_cli::commands::{self, load::loader_options};
use papergraph_cli::{ConfigError, PipelineConfig};
use papergraph_cluster::EmbeddingProvider;
use papergraph_kb::{EndpointMatch, MissingEndpointPolicy, PropertyMode};

const CONFIG: &str = r#"
[neo4j]
uri = "bolt://graph.internal:7687"
password = "from-file"
connect_retry_delay_ms = 250

[loader]
property_mode = "replace"
max_attempts = 5

[paths]
batch_dir = "batches"

[embedding]
provider = "mock"
dimensions = 32

[clustering]
max_k = 6
"#;

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

fn write_config(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("papergraph.toml");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_file_values_are_read() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, CONFIG);

    let config = PipelineConfig::load_with_env(Some(&path), HashMap::new()).unwrap();

    assert_eq!(config.neo4j.uri, "bolt://graph.internal:7687");
    assert_eq!(config.neo4j.connection_retry_delay.as_millis(), 250);
    assert_eq!(config.loader.property_mode, PropertyMode::Replace);
    assert_eq!(config.loader.options().retry.max_attempts, 5);
    assert_eq!(config.paths.batch_dir, PathBuf::from("batches"));
    assert_eq!(config.paths.clustered_csv, PathBuf::from("abstracts_clustered.csv"));
    assert_eq!(config.embedding.provider, EmbeddingProvider::Mock);
    assert_eq!(config.clustering.max_k, 6);
    assert_eq!(config.clustering.min_k, 2);
}

#[test]
fn test_prefixed_env_overrides_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, CONFIG);
    let vars = env(&[
        ("PAPERGRAPH_NEO4J__PASSWORD", "from-env"),
        ("PAPERGRAPH_CLUSTERING__MAX_K", "4"),
        ("PAPERGRAPH_LOADER__ENDPOINT_MATCH", "id"),
    ]);

    let config = PipelineConfig::load_with_env(Some(&path), vars).unwrap();

    assert_eq!(config.neo4j.password, "from-env");
    assert_eq!(config.clustering.max_k, 4);
    assert_eq!(config.loader.endpoint_match, EndpointMatch::Id);
}

#[test]
fn test_env_secrets_keep_their_exact_text() {
    let vars = env(&[
        ("PAPERGRAPH_NEO4J__PASSWORD", "0123"),
        ("PAPERGRAPH_EMBEDDING__API_KEY", "1e5"),
        ("PAPERGRAPH_NEO4J__USERNAME", "true"),
        ("PAPERGRAPH_CLUSTERING__MAX_K", "4"),
        ("PAPERGRAPH_LOGGING__JSON", "true"),
    ]);

    let config = PipelineConfig::load_with_env(None, vars).unwrap();

    assert_eq!(config.neo4j.password, "0123");
    assert_eq!(config.embedding.api_key.as_deref(), Some("1e5"));
    assert_eq!(config.neo4j.username, "true");
    assert_eq!(config.clustering.max_k, 4);
    assert!(config.logging.json);
}

#[test]
fn test_conventional_vars_fill_gaps_but_lose_to_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, CONFIG);
    let vars = env(&[
        ("NEO4J_PASSWORD", "conventional"),
        ("NEO4J_USERNAME", "reader"),
        ("OPENAI_API_KEY", "sk-test"),
    ]);

    let config = PipelineConfig::load_with_env(Some(&path), vars).unwrap();

    assert_eq!(config.neo4j.password, "from-file");
    assert_eq!(config.neo4j.username, "reader");
    assert_eq!(config.embedding.api_key.as_deref(), Some("sk-test"));
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.toml");

    let err = PipelineConfig::load_with_env(Some(&missing), HashMap::new()).unwrap_err();
    assert!(matches!(err, ConfigError::Load(_)));
}

#[test]
fn test_invalid_cluster_range_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[clustering]\nmin_k = 5\nmax_k = 3\n");

    let err = PipelineConfig::load_with_env(Some(&path), HashMap::new()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn test_load_flags_override_config() {
    let cli = Cli::try_parse_from([
        "papergraph",
        "load",
        "output/doc_001.json",
        "--store",
        "memory",
        "--property-mode",
        "replace",
        "--strict-endpoints",
    ])
    .unwrap();

    let Commands::Load(args) = cli.command else {
        panic!("expected load command");
    };
    assert_eq!(args.path, Some(PathBuf::from("output/doc_001.json")));
    assert_eq!(args.store, StoreKind::Memory);

    let options = loader_options(&args, &PipelineConfig::default());
    assert_eq!(options.property_mode, PropertyMode::Replace);
    assert_eq!(options.endpoint_match, EndpointMatch::Composite);
    assert_eq!(options.missing_endpoint, MissingEndpointPolicy::Fail);
}

#[test]
fn test_cluster_flags_and_global_config() {
    let cli = Cli::try_parse_from([
        "papergraph",
        "cluster",
        "--input",
        "a.csv",
        "--provider",
        "mock",
        "--max-k",
        "3",
        "-c",
        "custom.toml",
    ])
    .unwrap();

    assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
    let Commands::Cluster(args) = cli.command else {
        panic!("expected cluster command");
    };
    let clustering = clustering_config(&args, &PipelineConfig::default()).unwrap();
    assert_eq!((clustering.min_k, clustering.max_k), (2, 3));

    let bad = Cli::try_parse_from(["papergraph", "cluster", "--min-k", "1"]).unwrap();
    let Commands::Cluster(args) = bad.command else {
        panic!("expected cluster command");
    };
    assert!(clustering_config(&args, &PipelineConfig::default()).is_err());
}

#[test]
fn test_plot_flags() {
    let config = PipelineConfig::default();
    let parse = |extra: &[&str]| {
        let mut argv = vec!["papergraph", "cluster"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Cluster(args) => args,
            other => panic!("expected cluster command, got {:?}", other),
        }
    };

    let default = plot_path(&parse(&[]), &config);
    assert_eq!(default, Some(PathBuf::from("clusters_visualization.png")));
    assert_eq!(
        plot_path(&parse(&["--plot", "figs/k.png"]), &config),
        Some(PathBuf::from("figs/k.png"))
    );
    assert_eq!(plot_path(&parse(&["--no-plot"]), &config), None);
    let both = Cli::try_parse_from(["papergraph", "cluster", "--plot", "a.png", "--no-plot"]);
    assert!(both.is_err());
}

#[test]
fn test_unknown_store_is_rejected() {
    assert!(Cli::try_parse_from(["papergraph", "load", "--store", "sqlite"]).is_err());
}

#[tokio::test]
async fn test_memory_load_command_runs() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("doc_001.json"),
        r#"{"nodes":[{"id":"p1","label":"Paper","title":"T"}],"relationships":[]}"#,
    )
    .unwrap();

    let cli = Cli::try_parse_from([
        "papergraph".to_string(),
        "load".to_string(),
        dir.path().display().to_string(),
        "--store".to_string(),
        "memory".to_string(),
    ])
    .unwrap();

    commands::run(cli.command, &PipelineConfig::default()).await.unwrap();
}

#[tokio::test]
async fn test_cluster_command_writes_output() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("abstracts.csv");
    let output = dir.path().join("clustered.csv");
    let plot = dir.path().join("clusters.png");
    let rows = "ID,Abstract\n1,alpha beta\n2,alpha gamma\n3,delta epsilon\n4,delta zeta\n";
    std::fs::write(&input, rows).unwrap();

    let cli = Cli::try_parse_from([
        "papergraph".to_string(),
        "cluster".to_string(),
        "--input".to_string(),
        input.display().to_string(),
        "--output".to_string(),
        output.display().to_string(),
        "--provider".to_string(),
        "mock".to_string(),
        "--plot".to_string(),
        plot.display().to_string(),
    ])
    .unwrap();

    commands::run(cli.command, &PipelineConfig::default()).await.unwrap();

    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.starts_with("ID,Abstract,cluster"));
    assert_eq!(written.lines().count(), 5);
    assert!(plot.exists());
    let projected = std::fs::read_to_string(dir.path().join("clustered_projection.csv")).unwrap();
    assert_eq!(projected.lines().count(), 5);
}
