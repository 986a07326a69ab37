//! Papergraph command line
//!
//! Wires configuration, logging and the pipeline stages together.

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;

pub use cli::{Cli, Commands};
pub use config::{ConfigError, PipelineConfig};
