//! Papergraph graph loader
//!
//! Turns per-document JSON batches of node and relationship records into
//! idempotent upserts against a labeled property graph.

// Core modules
pub mod cypher;
pub mod data;
pub mod services;
pub mod storage;
pub mod traits;

// Graph database adapters
#[cfg(feature = "adapters")]
pub mod adapters;

// Re-export key types for convenient usage
pub use data::errors::{BatchFileError, CoreError, RecordRejection, StateStoreError};
pub use data::records::{GraphBatch, NodeRecord, PropertyValue, RelationshipRecord};
pub use data::trace_context::TraceContext;

pub use traits::{
    ApplyOutcome, EndpointMatch, EndpointRef, GraphStore, MissingEndpointPolicy, PropertyMode,
    RelationshipUpsert, UpsertPlan,
};

pub use services::{
    BatchReport, GraphLoader, LoadPipeline, LoaderOptions, RetryPolicy, RunSummary, SkippedFile,
    UpsertReport,
};
pub use storage::MemoryGraphStore;

#[cfg(feature = "adapters")]
pub use adapters::{Neo4jConfig, Neo4jGraphStore};
