//! Error types for the graph loader

use std::path::PathBuf;
use thiserror::Error;

use crate::data::TraceContext;

/// Base Error type for loader operations.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Graph store error: {0}")]
    Store(#[from] StateStoreError),

    #[error("Batch file {}: {source}", path.display())]
    BatchFile {
        path: PathBuf,
        #[source]
        source: BatchFileError,
    },

    #[error("Ingestion error with context: {message}")]
    IngestionErrorWithContext {
        message: String,
        trace_id: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Helper to create an ingestion error with context
    pub fn ingestion_error_with_context<E>(
        message: impl Into<String>,
        trace_ctx: Option<&TraceContext>,
        source: Option<E>,
    ) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CoreError::IngestionErrorWithContext {
            message: message.into(),
            trace_id: trace_ctx.map(|ctx| ctx.trace_id.to_string()),
            source: source.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
        }
    }

    /// True when the underlying failure is a store error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            CoreError::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Specific error type for the graph store.
#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("Graph database connection error: {0}")]
    ConnectionError(String),
    #[error("Graph query execution error: {0}")]
    QueryError(String),
    #[error("Data mapping error from graph result: {0}")]
    MappingError(String),
    #[error("No endpoint node for relationship ({from})-[:{rel_type}]->({to})")]
    MissingEndpoint {
        from: String,
        rel_type: String,
        to: String,
    },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl StateStoreError {
    /// Connectivity failures may succeed on a later attempt; everything else is
    /// deterministic for the same plan.
    pub fn is_transient(&self) -> bool {
        matches!(self, StateStoreError::ConnectionError(_))
    }
}

/// Why a batch file was excluded from loading.
#[derive(Error, Debug)]
pub enum BatchFileError {
    #[error("could not read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("file is empty")]
    Empty,
    #[error("invalid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("top-level JSON value is not an object")]
    NotAnObject,
}

/// Why a single node or relationship record was skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordRejection {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("required field `{0}` is missing, empty or not a string")]
    MissingField(&'static str),
}
