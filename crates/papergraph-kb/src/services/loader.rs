//! Projects node and relationship records into a graph store.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::data::{
    errors::CoreError,
    records::{GraphBatch, NodeRecord, RelationshipRecord},
    trace_context::TraceContext,
};
use crate::services::retry::RetryPolicy;
use crate::traits::graph_store::{
    ApplyOutcome, EndpointMatch, EndpointRef, GraphStore, MissingEndpointPolicy, PropertyMode,
    RelationshipUpsert, UpsertPlan,
};

/// Behavior knobs for [`GraphLoader`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoaderOptions {
    pub property_mode: PropertyMode,
    pub endpoint_match: EndpointMatch,
    pub missing_endpoint: MissingEndpointPolicy,
    pub retry: RetryPolicy,
}

/// Per-kind counts for one upsert call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertReport {
    /// Valid records sent to the store.
    pub processed: usize,
    /// Records rejected before reaching the store.
    pub skipped: usize,
    /// Processed relationships whose endpoints were not found. Always 0 for nodes.
    pub unmatched: usize,
}

/// Counts for one document batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub nodes: UpsertReport,
    pub relationships: UpsertReport,
    /// Ids declared with more than one label inside the batch.
    pub label_conflicts: usize,
}

/// Labels declared per id within one batch.
#[derive(Debug, Default)]
struct LabelIndex {
    labels: HashMap<String, BTreeSet<String>>,
}

impl LabelIndex {
    fn from_nodes(nodes: &[NodeRecord]) -> Self {
        let mut labels: HashMap<String, BTreeSet<String>> = HashMap::new();
        for node in nodes {
            labels.entry(node.id.clone()).or_default().insert(node.label.clone());
        }
        Self { labels }
    }

    fn conflicts(&self) -> Vec<(&str, &BTreeSet<String>)> {
        let mut conflicts: Vec<_> = self
            .labels
            .iter()
            .filter(|(_, labels)| labels.len() > 1)
            .map(|(id, labels)| (id.as_str(), labels))
            .collect();
        conflicts.sort();
        conflicts
    }

    fn unique_label(&self, id: &str) -> Option<&str> {
        match self.labels.get(id) {
            Some(labels) if labels.len() == 1 => labels.iter().next().map(String::as_str),
            _ => None,
        }
    }
}

/// Upserts records into a [`GraphStore`], one atomic plan per call.
pub struct GraphLoader {
    store: Arc<dyn GraphStore>,
    options: LoaderOptions,
}

impl GraphLoader {
    pub fn new(store: Arc<dyn GraphStore>, options: LoaderOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Finds-or-creates every valid node by `(label, id)` and writes its attributes.
    /// Records without a usable `label` or `id` are skipped.
    #[instrument(skip(self, nodes), fields(trace_id = %trace_ctx.trace_id, records = nodes.len()))]
    pub async fn upsert_nodes(
        &self,
        trace_ctx: &TraceContext,
        nodes: &[Value],
    ) -> Result<UpsertReport, CoreError> {
        let (records, skipped) = validate_nodes(nodes);
        let plan = self.plan(records, Vec::new());
        let outcome = self.apply(trace_ctx, &plan).await?;

        Ok(UpsertReport { processed: outcome.nodes_written, skipped, unmatched: 0 })
    }

    /// Finds-or-creates each typed relationship between nodes matched by id.
    #[instrument(skip(self, rels), fields(trace_id = %trace_ctx.trace_id, records = rels.len()))]
    pub async fn upsert_relationships(
        &self,
        trace_ctx: &TraceContext,
        rels: &[Value],
    ) -> Result<UpsertReport, CoreError> {
        let (records, skipped) = validate_relationships(rels);
        let upserts = self.resolve_endpoints(records, &LabelIndex::default());
        let processed = upserts.len();
        let plan = self.plan(Vec::new(), upserts);
        let outcome = self.apply(trace_ctx, &plan).await?;

        Ok(UpsertReport { processed, skipped, unmatched: outcome.unmatched.len() })
    }

    /// Loads one document batch: its nodes, then its relationships, as a single plan.
    #[instrument(
        skip(self, batch),
        fields(
            trace_id = %trace_ctx.trace_id,
            nodes = batch.nodes.len(),
            relationships = batch.relationships.len()
        )
    )]
    pub async fn load_batch(
        &self,
        trace_ctx: &TraceContext,
        batch: &GraphBatch,
    ) -> Result<BatchReport, CoreError> {
        let (nodes, nodes_skipped) = validate_nodes(&batch.nodes);
        let (rels, rels_skipped) = validate_relationships(&batch.relationships);

        let index = LabelIndex::from_nodes(&nodes);
        let conflicts = index.conflicts();
        for (id, labels) in &conflicts {
            warn!(
                "Id '{}' declared with conflicting labels {:?}; matching it by id only",
                id, labels
            );
        }
        let label_conflicts = conflicts.len();

        let upserts = self.resolve_endpoints(rels, &index);
        let rels_processed = upserts.len();
        let plan = self.plan(nodes, upserts);
        let outcome = self.apply(trace_ctx, &plan).await?;

        let report = BatchReport {
            nodes: UpsertReport {
                processed: outcome.nodes_written,
                skipped: nodes_skipped,
                unmatched: 0,
            },
            relationships: UpsertReport {
                processed: rels_processed,
                skipped: rels_skipped,
                unmatched: outcome.unmatched.len(),
            },
            label_conflicts,
        };
        debug!(?report, "Batch applied");
        Ok(report)
    }

    fn plan(&self, nodes: Vec<NodeRecord>, relationships: Vec<RelationshipUpsert>) -> UpsertPlan {
        UpsertPlan {
            nodes,
            relationships,
            property_mode: self.options.property_mode,
            missing_endpoint: self.options.missing_endpoint,
        }
    }

    fn resolve_endpoints(
        &self,
        records: Vec<RelationshipRecord>,
        index: &LabelIndex,
    ) -> Vec<RelationshipUpsert> {
        let endpoint = |id: String| match self.options.endpoint_match {
            EndpointMatch::Composite => match index.unique_label(&id) {
                Some(label) => EndpointRef::by_label_and_id(label, id),
                None => EndpointRef::by_id(id),
            },
            EndpointMatch::Id => EndpointRef::by_id(id),
        };

        records
            .into_iter()
            .map(|rec| RelationshipUpsert {
                from: endpoint(rec.from),
                rel_type: rec.rel_type,
                to: endpoint(rec.to),
            })
            .collect()
    }

    /// Applies a plan, retrying transient store failures. Empty plans never reach the store.
    async fn apply(
        &self,
        trace_ctx: &TraceContext,
        plan: &UpsertPlan,
    ) -> Result<ApplyOutcome, CoreError> {
        if plan.is_empty() {
            debug!("Nothing to apply");
            return Ok(ApplyOutcome::default());
        }

        let result = self
            .options
            .retry
            .retry("Applying upsert plan", |_| self.store.apply(trace_ctx, plan))
            .await;

        match result {
            Ok(outcome) => {
                for rel in &outcome.unmatched {
                    warn!("Relationship {} skipped: endpoint not found", rel);
                }
                info!(
                    nodes = outcome.nodes_written,
                    relationships = outcome.relationships_merged,
                    unmatched = outcome.unmatched.len(),
                    "Upsert plan committed"
                );
                Ok(outcome)
            },
            Err(e) => {
                error!("Upsert plan failed: {}", e);
                Err(e.into())
            },
        }
    }
}

fn validate_nodes(values: &[Value]) -> (Vec<NodeRecord>, usize) {
    let mut skipped = 0;
    let records = values
        .iter()
        .enumerate()
        .filter_map(|(index, value)| match NodeRecord::from_value(value) {
            Ok(node) => Some(node),
            Err(reason) => {
                warn!("Skipping node record #{}: {}", index, reason);
                skipped += 1;
                None
            },
        })
        .collect();
    (records, skipped)
}

fn validate_relationships(values: &[Value]) -> (Vec<RelationshipRecord>, usize) {
    let mut skipped = 0;
    let records = values
        .iter()
        .enumerate()
        .filter_map(|(index, value)| match RelationshipRecord::from_value(value) {
            Ok(rel) => Some(rel),
            Err(reason) => {
                warn!("Skipping relationship record #{}: {}", index, reason);
                skipped += 1;
                None
            },
        })
        .collect();
    (records, skipped)
}
