use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use test_log::test;

use papergraph_kb::{
    data::errors::{CoreError, StateStoreError},
    GraphBatch, GraphLoader, LoaderOptions, MemoryGraphStore, MissingEndpointPolicy, PropertyMode,
    PropertyValue, RetryPolicy, TraceContext, UpsertReport,
};

fn loader_with(store: &Arc<MemoryGraphStore>, options: LoaderOptions) -> GraphLoader {
    GraphLoader::new(store.clone(), options)
}

fn batch(value: serde_json::Value) -> GraphBatch {
    serde_json::from_value(value).unwrap()
}

#[test(tokio::test)]
async fn test_same_node_twice_yields_one_node() {
    let store = Arc::new(MemoryGraphStore::new());
    let loader = loader_with(&store, LoaderOptions::default());
    let ctx = TraceContext::new_root();
    let node = json!({"label": "Tech", "id": "t1", "name": "RT-PCR"});

    loader.upsert_nodes(&ctx, &[node.clone()]).await.unwrap();
    loader.upsert_nodes(&ctx, &[node]).await.unwrap();

    assert_eq!(store.node_count(), 1);
    assert_eq!(
        store.node("Tech", "t1").unwrap().get("name"),
        Some(&PropertyValue::from("RT-PCR"))
    );
}

#[test(tokio::test)]
async fn test_invalid_node_records_are_skipped() {
    let store = Arc::new(MemoryGraphStore::new());
    let loader = loader_with(&store, LoaderOptions::default());

    let report = loader
        .upsert_nodes(
            &TraceContext::new_root(),
            &[
                json!({"id": "t1", "name": "no label"}),
                json!({"label": "Tech", "name": "no id"}),
                json!({"label": "Tech", "id": "t2"}),
            ],
        )
        .await
        .unwrap();

    assert_eq!(report, UpsertReport { processed: 1, skipped: 2, unmatched: 0 });
    assert_eq!(store.node_count(), 1);
    assert!(store.node("Tech", "t2").is_some());
}

#[test(tokio::test)]
async fn test_relationship_without_endpoints_is_a_noop() {
    let store = Arc::new(MemoryGraphStore::new());
    let loader = loader_with(&store, LoaderOptions::default());

    let rel = json!({"from": "a", "to": "b", "type": "USES"});
    let report = loader.upsert_relationships(&TraceContext::new_root(), &[rel]).await.unwrap();

    assert_eq!(report, UpsertReport { processed: 1, skipped: 0, unmatched: 1 });
    assert_eq!(store.node_count(), 0);
    assert_eq!(store.relationship_count(), 0);
}

#[test(tokio::test)]
async fn test_merge_mode_keeps_earlier_fields() {
    let store = Arc::new(MemoryGraphStore::new());
    let loader = loader_with(&store, LoaderOptions::default());
    let ctx = TraceContext::new_root();

    loader.upsert_nodes(&ctx, &[json!({"label": "Tech", "id": "t1", "name": "x"})]).await.unwrap();
    loader.upsert_nodes(&ctx, &[json!({"label": "Tech", "id": "t1", "other": "y"})]).await.unwrap();

    let props = store.node("Tech", "t1").unwrap();
    assert_eq!(props.get("name"), Some(&PropertyValue::from("x")));
    assert_eq!(props.get("other"), Some(&PropertyValue::from("y")));
}

#[test(tokio::test)]
async fn test_explicit_null_clears_a_property() {
    let store = Arc::new(MemoryGraphStore::new());
    let loader = loader_with(&store, LoaderOptions::default());
    let ctx = TraceContext::new_root();

    let first = json!({"label": "Tech", "id": "t1", "name": "x", "aka": "rt"});
    loader.upsert_nodes(&ctx, &[first]).await.unwrap();
    let cleared = json!({"label": "Tech", "id": "t1", "name": null});
    let report = loader.upsert_nodes(&ctx, &[cleared]).await.unwrap();

    assert_eq!(report.processed, 1);
    let props = store.node("Tech", "t1").unwrap();
    assert_eq!(props.get("name"), None);
    assert_eq!(props.get("aka"), Some(&PropertyValue::from("rt")));
}

#[test(tokio::test)]
async fn test_replace_mode_retracts_absent_fields() {
    let store = Arc::new(MemoryGraphStore::new());
    let options =
        LoaderOptions { property_mode: PropertyMode::Replace, ..LoaderOptions::default() };
    let loader = loader_with(&store, options);
    let ctx = TraceContext::new_root();

    loader.upsert_nodes(&ctx, &[json!({"label": "Tech", "id": "t1", "name": "x"})]).await.unwrap();
    loader.upsert_nodes(&ctx, &[json!({"label": "Tech", "id": "t1", "other": "y"})]).await.unwrap();

    let props = store.node("Tech", "t1").unwrap();
    assert_eq!(props.get("name"), None);
    assert_eq!(props.get("other"), Some(&PropertyValue::from("y")));
}

#[test(tokio::test)]
async fn test_single_node_batch_report() {
    let store = Arc::new(MemoryGraphStore::new());
    let loader = loader_with(&store, LoaderOptions::default());

    let report = loader
        .load_batch(
            &TraceContext::new_root(),
            &batch(json!({
                "nodes": [{"label": "Tech", "id": "t1", "name": "RT-PCR"}],
                "relationships": []
            })),
        )
        .await
        .unwrap();

    assert_eq!(report.nodes.processed, 1);
    assert_eq!(report.relationships.processed, 0);
    assert_eq!(store.node_count(), 1);
    assert_eq!(
        store.node("Tech", "t1").unwrap().get("name"),
        Some(&PropertyValue::from("RT-PCR"))
    );
}

#[test(tokio::test)]
async fn test_duplicate_relationship_yields_one_edge() {
    let store = Arc::new(MemoryGraphStore::new());
    let loader = loader_with(&store, LoaderOptions::default());
    let ctx = TraceContext::new_root();

    loader
        .upsert_nodes(
            &ctx,
            &[json!({"label": "Project", "id": "a"}), json!({"label": "Tech", "id": "b"})],
        )
        .await
        .unwrap();

    let rel = json!({"from": "a", "to": "b", "type": "USES"});
    loader.upsert_relationships(&ctx, &[rel.clone()]).await.unwrap();
    loader.upsert_relationships(&ctx, &[rel]).await.unwrap();

    assert_eq!(store.relationship_count_between("a", "USES", "b"), 1);
    assert_eq!(store.relationship_count(), 1);
}

#[test(tokio::test)]
async fn test_batch_relationships_see_batch_nodes() {
    let store = Arc::new(MemoryGraphStore::new());
    let loader = loader_with(&store, LoaderOptions::default());

    let report = loader
        .load_batch(
            &TraceContext::new_root(),
            &batch(json!({
                "nodes": [
                    {"label": "Project", "id": "p1", "name": "Mars Rover"},
                    {"label": "Client", "id": "nasa", "name": "NASA"}
                ],
                "relationships": [
                    {"from": "p1", "type": "HAS_CLIENT", "to": "nasa"},
                    {"from": "p1", "type": "USES_TECH"}
                ]
            })),
        )
        .await
        .unwrap();

    assert_eq!(report.relationships, UpsertReport { processed: 1, skipped: 1, unmatched: 0 });
    assert_eq!(store.relationship_count_between("p1", "HAS_CLIENT", "nasa"), 1);
}

#[test(tokio::test)]
async fn test_composite_matching_keeps_same_id_labels_apart() {
    let store = Arc::new(MemoryGraphStore::new());
    let loader = loader_with(&store, LoaderOptions::default());
    let ctx = TraceContext::new_root();

    // An earlier document left a Client with the same id as this batch's Tech
    loader.upsert_nodes(&ctx, &[json!({"label": "Client", "id": "x"})]).await.unwrap();

    loader
        .load_batch(
            &ctx,
            &batch(json!({
                "nodes": [{"label": "Project", "id": "p1"}, {"label": "Tech", "id": "x"}],
                "relationships": [{"from": "p1", "type": "USES", "to": "x"}]
            })),
        )
        .await
        .unwrap();

    assert_eq!(store.nodes_with_id("x").len(), 2);
    assert_eq!(store.relationship_count(), 1);
}

#[test(tokio::test)]
async fn test_strict_mode_rolls_back_whole_batch() {
    let store = Arc::new(MemoryGraphStore::new());
    let options =
        LoaderOptions { missing_endpoint: MissingEndpointPolicy::Fail, ..LoaderOptions::default() };
    let loader = loader_with(&store, options);

    let result = loader
        .load_batch(
            &TraceContext::new_root(),
            &batch(json!({
                "nodes": [{"label": "Project", "id": "p1"}],
                "relationships": [{"from": "p1", "type": "USES", "to": "ghost"}]
            })),
        )
        .await;

    assert!(matches!(result, Err(CoreError::Store(StateStoreError::MissingEndpoint { .. }))));
    assert_eq!(store.node_count(), 0);
}

#[test(tokio::test)]
async fn test_failure_mid_batch_leaves_nothing_visible() {
    let store = Arc::new(MemoryGraphStore::new());
    let options = LoaderOptions { retry: RetryPolicy::no_retry(), ..LoaderOptions::default() };
    let loader = loader_with(&store, options);
    store.fail_next_applies(1, 2);

    let result = loader
        .load_batch(
            &TraceContext::new_root(),
            &batch(json!({
                "nodes": [
                    {"label": "Project", "id": "p1"},
                    {"label": "Tech", "id": "t1"},
                    {"label": "Tech", "id": "t2"}
                ],
                "relationships": [{"from": "p1", "type": "USES", "to": "t1"}]
            })),
        )
        .await;

    assert!(result.is_err());
    assert_eq!(store.node_count(), 0);
    assert_eq!(store.relationship_count(), 0);
}

#[test(tokio::test)]
async fn test_transient_failure_then_success_commits_once() {
    let store = Arc::new(MemoryGraphStore::new());
    let retry = RetryPolicy {
        max_attempts: 3,
        initial_delay_ms: 1,
        max_delay_ms: 5,
        jitter_factor: 0.0,
        ..RetryPolicy::default()
    };
    let loader = loader_with(&store, LoaderOptions { retry, ..LoaderOptions::default() });
    store.fail_next_applies(1, 1);

    let report = loader
        .load_batch(
            &TraceContext::new_root(),
            &batch(json!({
                "nodes": [{"label": "Tech", "id": "t1"}, {"label": "Tech", "id": "t2"}]
            })),
        )
        .await
        .unwrap();

    assert_eq!(report.nodes.processed, 2);
    assert_eq!(store.apply_calls(), 2);
    assert_eq!(store.committed_plans(), 1);
    assert_eq!(store.node_count(), 2);
}
