//! Core traits (interfaces) for the graph loader

pub mod graph_store;

pub use graph_store::{
    ApplyOutcome, EndpointMatch, EndpointRef, GraphStore, MissingEndpointPolicy, PropertyMode,
    RelationshipUpsert, UpsertPlan,
};
