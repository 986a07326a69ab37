//! Core data structures for the graph loader

pub mod errors;
pub mod records;
pub mod trace_context;

// Re-export all common types
pub use errors::{BatchFileError, CoreError, RecordRejection, StateStoreError};
pub use records::{GraphBatch, NodeRecord, PropertyValue, RelationshipRecord};
pub use trace_context::TraceContext;
