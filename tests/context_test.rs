//! Context codec and change-tracking properties

use std::sync::Arc;

use serde_json::json;

use graphql_ws_lambda::context::{compress, decompress, Change, ContextStore, TrackedContext};
use graphql_ws_lambda::{ConnectionContext, InMemoryStore, PubSubStore};

fn round_trip(context: &ConnectionContext) -> ConnectionContext {
    let fields = compress(context).into_iter().collect();
    decompress(&fields)
}

#[test]
fn test_codec_fidelity() {
    let context = ConnectionContext {
        connection_init_received: true,
        acknowledged: false,
        connection_params: Some(json!({
            "headers": { "authorization": "Bearer x" },
        })),
        extra: json!({
            "count": 42,
            "tags": ["admin", "user"],
            "note": null,
        }),
        subscriptions: Default::default(),
    };

    let rebuilt = round_trip(&context);
    assert_eq!(rebuilt, context);

    // numbers stay numbers, null stays null, strings stay strings
    assert!(rebuilt.extra["count"].is_i64());
    assert!(rebuilt.extra["note"].is_null());
    assert!(rebuilt.extra["tags"][0].is_string());
}

#[test]
fn test_codec_round_trip_scalar_variety() {
    for extra in [
        json!({ "flag": true }),
        json!({ "zero": 0 }),
        json!({ "negative": -12.5 }),
        json!({ "empty": "" }),
        json!({ "ambiguous": "true" }),
        json!({ "ambiguous_number": "42" }),
        json!({ "deep": { "list": [{ "leaf": null }] } }),
    ] {
        let context = ConnectionContext {
            extra: extra.clone(),
            ..Default::default()
        };
        assert_eq!(round_trip(&context).extra, extra);
    }
}

#[test]
fn test_same_value_write_emits_nothing() {
    let mut tracked = TrackedContext::new(ConnectionContext::default());
    tracked.set("extra.level", json!("admin"));
    assert_eq!(tracked.pending_changes().len(), 1);

    tracked.set("extra.level", json!("admin"));
    assert_eq!(tracked.pending_changes().len(), 1);

    tracked.set("extra.level", json!("user"));
    assert_eq!(tracked.pending_changes().len(), 2);
}

#[test]
fn test_delete_emits_one_del_change() {
    let mut tracked = TrackedContext::new(ConnectionContext::default());
    tracked.set("extra.level", json!("admin"));
    tracked.del("extra.level");

    match &tracked.pending_changes()[1] {
        Change::Del { path } => assert_eq!(path, "extra.level"),
        other => panic!("expected a delete change, got {other:?}"),
    }
}

#[test]
fn test_deep_assignment_emits_prefixed_leaves() {
    let mut tracked = TrackedContext::new(ConnectionContext::default());
    tracked.set(
        "extra.profile",
        json!({ "name": "ada", "roles": ["admin", "ops"], "meta": { "age": 36 } }),
    );

    let mut paths: Vec<String> = tracked
        .pending_changes()
        .iter()
        .map(|change| match change {
            Change::Set { path, .. } => path.clone(),
            Change::Del { path } => path.clone(),
        })
        .collect();
    paths.sort();

    assert_eq!(
        paths,
        vec![
            "extra.profile.meta.age",
            "extra.profile.name",
            "extra.profile.roles.0",
            "extra.profile.roles.1",
        ]
    );
}

#[tokio::test]
async fn test_store_load_is_default_when_absent() {
    let store: Arc<dyn PubSubStore> = Arc::new(InMemoryStore::default());
    let mut context_store = ContextStore::new("c1", store);

    let tracked = context_store.load().await.unwrap();
    assert!(!tracked.context().connection_init_received);
    assert!(!tracked.context().acknowledged);
    assert!(tracked.context().connection_params.is_none());
    assert_eq!(tracked.context().extra, json!({}));
}

#[tokio::test]
async fn test_create_then_reload() {
    let backend = Arc::new(InMemoryStore::default());
    let store: Arc<dyn PubSubStore> = backend.clone();

    let mut writer = ContextStore::new("c1", store.clone());
    writer
        .create(ConnectionContext {
            acknowledged: true,
            extra: json!({ "source": "connect" }),
            ..Default::default()
        })
        .await
        .unwrap();

    let mut reader = ContextStore::new("c1", store);
    let tracked = reader.load().await.unwrap();
    assert!(tracked.context().acknowledged);
    assert_eq!(tracked.context().extra, json!({ "source": "connect" }));
}

#[tokio::test]
async fn test_create_replaces_previous_record() {
    let backend = Arc::new(InMemoryStore::default());
    let store: Arc<dyn PubSubStore> = backend.clone();

    let mut context_store = ContextStore::new("c1", store.clone());
    context_store
        .create(ConnectionContext {
            extra: json!({ "old": true }),
            ..Default::default()
        })
        .await
        .unwrap();
    context_store
        .create(ConnectionContext::default())
        .await
        .unwrap();

    let fields = backend.read_context("c1").await.unwrap();
    assert!(!fields.contains_key("extra.old"));
}

#[tokio::test]
async fn test_flush_persists_changes_in_order() {
    let backend = Arc::new(InMemoryStore::default());
    let store: Arc<dyn PubSubStore> = backend.clone();

    let mut context_store = ContextStore::new("c1", store.clone());
    context_store.create(ConnectionContext::default()).await.unwrap();

    {
        let tracked = context_store.load().await.unwrap();
        tracked.set_init_received(true);
        tracked.set_acknowledged(true);
        tracked.set_connection_params(json!({ "token": "t" }));
        tracked.set("extra.count", json!(3));
        tracked.del("extra.count");
    }
    context_store.flush().await.unwrap();

    let fields = backend.read_context("c1").await.unwrap();
    assert_eq!(fields["connectionInitReceived"], "__boolean__true");
    assert_eq!(fields["acknowledged"], "__boolean__true");
    assert_eq!(fields["connectionParams.token"], "t");
    assert!(!fields.contains_key("extra.count"));

    // flush is idempotent
    context_store.flush().await.unwrap();
    let mut reader = ContextStore::new("c1", store);
    let tracked = reader.load().await.unwrap();
    assert!(tracked.context().acknowledged);
    assert_eq!(
        tracked.context().connection_params,
        Some(json!({ "token": "t" }))
    );
}

#[tokio::test]
async fn test_invocation_memoizes_load() {
    let backend = Arc::new(InMemoryStore::default());
    let store: Arc<dyn PubSubStore> = backend.clone();

    let mut context_store = ContextStore::new("c1", store);
    context_store.load().await.unwrap().set("extra.a", json!(1));

    // a write from elsewhere is not observed within the same invocation
    backend
        .set_context_fields("c1", &[("extra.b".to_string(), "x".to_string())])
        .await
        .unwrap();

    let tracked = context_store.load().await.unwrap();
    assert_eq!(tracked.context().extra, json!({ "a": 1 }));
}

#[test]
fn test_undefined_marker_is_skipped_on_rebuild() {
    let mut fields = std::collections::HashMap::new();
    fields.insert("extra.missing".to_string(), "__undefined__".to_string());
    fields.insert("extra.kept".to_string(), "v".to_string());

    let context = decompress(&fields);
    assert_eq!(context.extra, json!({ "kept": "v" }));
    assert!(context.extra.get("missing").is_none());
}
