use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, instrument};

use crate::cypher;
use crate::data::{
    errors::StateStoreError,
    records::{NodeRecord, PropertyValue},
    trace_context::TraceContext,
};
use crate::traits::graph_store::{
    ApplyOutcome, EndpointRef, GraphStore, MissingEndpointPolicy, PropertyMode, UpsertPlan,
};

/// Identity of a node: the `(label, id)` pair used by `MERGE`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub label: String,
    pub id: String,
}

impl NodeKey {
    pub fn new(label: impl Into<String>, id: impl Into<String>) -> Self {
        Self { label: label.into(), id: id.into() }
    }
}

type Properties = BTreeMap<String, PropertyValue>;

#[derive(Debug, Clone, Default)]
struct GraphState {
    nodes: BTreeMap<NodeKey, Properties>,
    edges: BTreeSet<(NodeKey, String, NodeKey)>,
}

impl GraphState {
    fn upsert_node(&mut self, node: &NodeRecord, mode: PropertyMode) {
        let key = NodeKey::new(node.label.clone(), node.id.clone());
        let props = self.nodes.entry(key).or_default();
        if mode == PropertyMode::Replace {
            props.clear();
        }
        for (k, v) in &node.properties {
            if v.is_null() {
                props.remove(k);
            } else {
                props.insert(k.clone(), v.clone());
            }
        }
    }

    fn matching(&self, endpoint: &EndpointRef) -> Vec<NodeKey> {
        self.nodes
            .keys()
            .filter(|key| key.id == endpoint.id)
            .filter(|key| endpoint.label.as_ref().map_or(true, |label| &key.label == label))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct InjectedFailure {
    remaining: usize,
    after_mutations: usize,
}

/// In-process graph store with the same upsert semantics as the Neo4j adapter.
///
/// Every plan is applied to a copy of the current graph which replaces the
/// original only when the whole plan succeeded.
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    state: RwLock<GraphState>,
    failure: Mutex<Option<InjectedFailure>>,
    apply_calls: AtomicUsize,
    committed_plans: AtomicUsize,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `times` calls to `apply` fail with a connection error when they
    /// reach mutation number `after_mutations` (0-based). A plan with fewer mutations
    /// succeeds and still uses up one of the `times`.
    pub fn fail_next_applies(&self, times: usize, after_mutations: usize) {
        *self.failure.lock() = if times == 0 {
            None
        } else {
            Some(InjectedFailure { remaining: times, after_mutations })
        };
    }

    /// Properties of the node with this `(label, id)`, `id` excluded.
    pub fn node(&self, label: &str, id: &str) -> Option<Properties> {
        self.state.read().nodes.get(&NodeKey::new(label, id)).cloned()
    }

    /// Every node carrying this id, whatever its label.
    pub fn nodes_with_id(&self, id: &str) -> Vec<NodeKey> {
        self.state.read().matching(&EndpointRef::by_id(id))
    }

    pub fn node_count(&self) -> usize {
        self.state.read().nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.state.read().edges.len()
    }

    /// Number of `rel_type` edges from any node with `from_id` to any node with `to_id`.
    pub fn relationship_count_between(&self, from_id: &str, rel_type: &str, to_id: &str) -> usize {
        self.state
            .read()
            .edges
            .iter()
            .filter(|(from, t, to)| from.id == from_id && t == rel_type && to.id == to_id)
            .count()
    }

    pub fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }

    pub fn committed_plans(&self) -> usize {
        self.committed_plans.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> Option<usize> {
        let mut slot = self.failure.lock();
        let failure = (*slot)?;
        *slot = if failure.remaining > 1 {
            Some(InjectedFailure { remaining: failure.remaining - 1, ..failure })
        } else {
            None
        };
        Some(failure.after_mutations)
    }
}

fn check_injected(fail_at: Option<usize>, performed: usize) -> Result<(), StateStoreError> {
    match fail_at {
        Some(at) if performed >= at => Err(StateStoreError::ConnectionError(format!(
            "injected failure after {} mutations",
            performed
        ))),
        _ => Ok(()),
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    #[instrument(
        skip(self, plan),
        fields(trace_id = %trace_ctx.trace_id, mutations = plan.mutation_count())
    )]
    async fn apply(
        &self,
        trace_ctx: &TraceContext,
        plan: &UpsertPlan,
    ) -> Result<ApplyOutcome, StateStoreError> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        let fail_at = self.take_failure();

        // Held for the whole plan so concurrent plans serialize like transactions
        let mut guard = self.state.write();
        let mut working = guard.clone();
        let mut outcome = ApplyOutcome::default();
        let mut performed = 0;

        for node in &plan.nodes {
            check_injected(fail_at, performed)?;
            let statement = cypher::node_upsert(node, plan.property_mode);
            debug!(statement = %statement.text, "Applying node");
            working.upsert_node(node, plan.property_mode);
            outcome.nodes_written += 1;
            performed += 1;
        }

        for rel in &plan.relationships {
            check_injected(fail_at, performed)?;
            debug!(statement = %cypher::relationship_upsert(rel).text, "Applying relationship");

            let froms = working.matching(&rel.from);
            let tos = working.matching(&rel.to);
            if froms.is_empty() || tos.is_empty() {
                match plan.missing_endpoint {
                    MissingEndpointPolicy::Skip => outcome.unmatched.push(rel.clone()),
                    MissingEndpointPolicy::Fail => {
                        return Err(StateStoreError::MissingEndpoint {
                            from: rel.from.to_string(),
                            rel_type: rel.rel_type.clone(),
                            to: rel.to.to_string(),
                        });
                    },
                }
            } else {
                for from in &froms {
                    for to in &tos {
                        working.edges.insert((from.clone(), rel.rel_type.clone(), to.clone()));
                    }
                }
                outcome.relationships_merged += 1;
            }
            performed += 1;
        }

        *guard = working;
        self.committed_plans.fetch_add(1, Ordering::SeqCst);

        Ok(outcome)
    }

    async fn ping(&self) -> Result<(), StateStoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::graph_store::RelationshipUpsert;

    fn rel(from: &str, rel_type: &str, to: &str) -> RelationshipUpsert {
        RelationshipUpsert {
            from: EndpointRef::by_id(from),
            rel_type: rel_type.to_string(),
            to: EndpointRef::by_id(to),
        }
    }

    fn plan(nodes: Vec<NodeRecord>, relationships: Vec<RelationshipUpsert>) -> UpsertPlan {
        UpsertPlan { nodes, relationships, ..Default::default() }
    }

    #[tokio::test]
    async fn test_merge_keeps_existing_properties() {
        let store = MemoryGraphStore::new();
        let ctx = TraceContext::new_root();

        let named = NodeRecord::new("Tech", "t1").with_property("name", "x");
        let other = NodeRecord::new("Tech", "t1").with_property("other", "y");
        store.apply(&ctx, &plan(vec![named], vec![])).await.unwrap();
        store.apply(&ctx, &plan(vec![other], vec![])).await.unwrap();

        let props = store.node("Tech", "t1").unwrap();
        assert_eq!(props.get("name"), Some(&PropertyValue::from("x")));
        assert_eq!(props.get("other"), Some(&PropertyValue::from("y")));
        assert_eq!(store.node_count(), 1);
    }

    #[tokio::test]
    async fn test_null_property_is_removed() {
        let store = MemoryGraphStore::new();
        let ctx = TraceContext::new_root();
        let named = NodeRecord::new("Tech", "t1").with_property("name", "x");
        let cleared = NodeRecord::new("Tech", "t1").with_property("name", PropertyValue::Null);

        store.apply(&ctx, &plan(vec![named], vec![])).await.unwrap();
        store.apply(&ctx, &plan(vec![cleared.clone()], vec![])).await.unwrap();
        assert_eq!(store.node("Tech", "t1").unwrap().get("name"), None);

        let replace = UpsertPlan {
            nodes: vec![cleared],
            property_mode: PropertyMode::Replace,
            ..Default::default()
        };
        store.apply(&ctx, &replace).await.unwrap();
        assert!(store.node("Tech", "t1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_drops_absent_properties() {
        let store = MemoryGraphStore::new();
        let ctx = TraceContext::new_root();

        let named = NodeRecord::new("Tech", "t1").with_property("name", "x");
        store.apply(&ctx, &plan(vec![named], vec![])).await.unwrap();
        let replace = UpsertPlan {
            nodes: vec![NodeRecord::new("Tech", "t1").with_property("other", "y")],
            property_mode: PropertyMode::Replace,
            ..Default::default()
        };
        store.apply(&ctx, &replace).await.unwrap();

        let props = store.node("Tech", "t1").unwrap();
        assert_eq!(props.get("name"), None);
        assert_eq!(props.get("other"), Some(&PropertyValue::from("y")));
    }

    #[tokio::test]
    async fn test_same_id_different_labels_are_distinct_nodes() {
        let store = MemoryGraphStore::new();
        let ctx = TraceContext::new_root();

        let nodes = vec![NodeRecord::new("Tech", "x"), NodeRecord::new("Client", "x")];
        store.apply(&ctx, &plan(nodes, vec![])).await.unwrap();

        assert_eq!(store.nodes_with_id("x").len(), 2);
    }

    #[tokio::test]
    async fn test_unmatched_relationship_is_reported() {
        let store = MemoryGraphStore::new();
        let ctx = TraceContext::new_root();

        let dangling = plan(vec![NodeRecord::new("Tech", "a")], vec![rel("a", "USES", "missing")]);
        let outcome = store.apply(&ctx, &dangling).await.unwrap();

        assert_eq!(outcome.relationships_merged, 0);
        assert_eq!(outcome.unmatched, vec![rel("a", "USES", "missing")]);
        assert_eq!(store.relationship_count(), 0);
    }

    #[tokio::test]
    async fn test_strict_missing_endpoint_rolls_back() {
        let store = MemoryGraphStore::new();
        let ctx = TraceContext::new_root();

        let strict = UpsertPlan {
            nodes: vec![NodeRecord::new("Tech", "a")],
            relationships: vec![rel("a", "USES", "missing")],
            missing_endpoint: MissingEndpointPolicy::Fail,
            ..Default::default()
        };

        let err = store.apply(&ctx, &strict).await.unwrap_err();
        assert!(matches!(err, StateStoreError::MissingEndpoint { .. }));
        assert_eq!(store.node_count(), 0);
        assert_eq!(store.committed_plans(), 0);
    }

    #[tokio::test]
    async fn test_injected_failure_leaves_no_partial_state() {
        let store = MemoryGraphStore::new();
        let ctx = TraceContext::new_root();
        store.fail_next_applies(1, 1);

        let batch = plan(vec![NodeRecord::new("Tech", "a"), NodeRecord::new("Tech", "b")], vec![]);
        let err = store.apply(&ctx, &batch).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(store.node_count(), 0);

        // The injection is used up; the retry goes through
        store.apply(&ctx, &batch).await.unwrap();
        assert_eq!(store.node_count(), 2);
        assert_eq!(store.apply_calls(), 2);
    }
}
