//! Structured logging setup for the papergraph binary.
//!
//! Logs go to stderr so command output on stdout stays machine readable.

use anyhow::Context;
use std::io;
use tracing::debug;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::config::LoggingConfig;

/// Installs the global subscriber. `RUST_LOG` overrides the configured filter.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter));
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if config.json {
        let json_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_file(true)
            .with_line_number(true)
            .with_writer(io::stderr);
        registry.with(json_layer).try_init()
    } else {
        let fmt_layer = fmt::layer().with_target(true).with_writer(io::stderr);
        registry.with(fmt_layer).try_init()
    };
    installed.context("Failed to set global default subscriber")?;

    debug!(filter = %config.filter, json = config.json, "Logging initialized");
    Ok(())
}
