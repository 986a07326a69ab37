//! GraphStore trait definition for graph database interaction

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::data::{
    errors::StateStoreError,
    records::NodeRecord,
    trace_context::TraceContext,
};

/// How attributes of an already existing node are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyMode {
    /// Overwrite the attributes present in the record, keep the others.
    #[default]
    Merge,
    /// Make the node carry exactly the record's attributes.
    Replace,
}

/// How relationship endpoints are located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointMatch {
    /// Use `(label, id)` when the batch declares the endpoint's label, else `id`.
    #[default]
    Composite,
    /// Match any node carrying the id, whatever its label.
    Id,
}

/// What happens when a relationship endpoint does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingEndpointPolicy {
    /// Count and log the relationship, keep going.
    #[default]
    Skip,
    /// Fail the plan; nothing from it is committed.
    Fail,
}

/// One end of a relationship.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointRef {
    pub id: String,
    /// Set when the endpoint must also carry this label.
    pub label: Option<String>,
}

impl EndpointRef {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self { id: id.into(), label: None }
    }

    pub fn by_label_and_id(label: impl Into<String>, id: impl Into<String>) -> Self {
        Self { id: id.into(), label: Some(label.into()) }
    }
}

impl fmt::Display for EndpointRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{}:{}", label, self.id),
            None => write!(f, "{}", self.id),
        }
    }
}

/// A relationship ready to be merged between two located endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipUpsert {
    pub from: EndpointRef,
    pub rel_type: String,
    pub to: EndpointRef,
}

impl fmt::Display for RelationshipUpsert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})-[:{}]->({})", self.from, self.rel_type, self.to)
    }
}

/// The validated, store-ready form of a batch. A store applies a plan as one
/// unit of work: nodes first, then relationships.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpsertPlan {
    pub nodes: Vec<NodeRecord>,
    pub relationships: Vec<RelationshipUpsert>,
    pub property_mode: PropertyMode,
    pub missing_endpoint: MissingEndpointPolicy,
}

impl UpsertPlan {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }

    pub fn mutation_count(&self) -> usize {
        self.nodes.len() + self.relationships.len()
    }
}

/// What a store did with a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub nodes_written: usize,
    /// Relationship upserts that found both endpoints.
    pub relationships_merged: usize,
    /// Relationship upserts that found no endpoint pair (only under `Skip`).
    pub unmatched: Vec<RelationshipUpsert>,
}

/// Represents the interface for interacting with the graph database.
/// This abstracts the underlying database technology (e.g., Neo4j).
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Applies every mutation of the plan atomically.
    ///
    /// Contract: nodes are found-or-created by `(label, id)` and their attributes
    /// written according to `plan.property_mode`; relationships are found-or-created
    /// between the matched endpoints. Either the whole plan becomes visible or,
    /// on error, none of it does.
    async fn apply(
        &self,
        trace_ctx: &TraceContext,
        plan: &UpsertPlan,
    ) -> Result<ApplyOutcome, StateStoreError>;

    /// Verifies the store is reachable.
    async fn ping(&self) -> Result<(), StateStoreError>;
}
