//! End-to-end store behaviour against the in-memory client.

use couchlayer::{memory::InMemoryClient, prelude::*};
use serde::{Deserialize, Serialize};
use serde_json::json;

fn store() -> EntityStore<InMemoryClient> {
    EntityStore::new(InMemoryClient::new(), StoreConfig::default())
}

fn lmt() -> Canon {
    Canon::new("lmt")
}

async fn seed(store: &EntityStore<InMemoryClient>, canon: &Canon, values: &[&str]) -> Vec<Record> {
    let mut saved = Vec::new();
    for value in values {
        let record = Record::new(canon.clone()).with("p1", *value);
        saved.push(store.save(record).await.unwrap());
    }
    saved
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Invoice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    customer: String,
    total: u64,
}

impl Entity for Invoice {
    fn canon() -> Canon {
        Canon::with_base("billing", "invoice")
    }
}

// ============================================================================
// Save / Load / Remove
// ============================================================================

#[tokio::test]
async fn test_save_load_remove_round_trip() {
    let store = store();

    let saved = store
        .save(Record::new(Canon::new("foo")).with("p1", "v1"))
        .await
        .unwrap();
    let id = saved.id().unwrap().to_string();

    let loaded = store
        .load(&Canon::new("foo"), &Query::by_id(&id))
        .await
        .unwrap();
    assert_eq!(loaded.as_ref().map(Record::to_value), Some(json!({ "id": id, "p1": "v1" })));

    let removed = store
        .remove(&Canon::new("foo"), &Query::by_id(&id))
        .await
        .unwrap();
    assert_eq!(removed, loaded);

    let gone = store
        .load(&Canon::new("foo"), &Query::by_id(&id))
        .await
        .unwrap();
    assert_eq!(gone, None);
}

#[tokio::test]
async fn test_save_update_keeps_unmentioned_fields() {
    let store = store();

    let saved = store
        .save(Record::new(lmt()).with("a", 1).with("b", 2))
        .await
        .unwrap();

    let mut partial = Record::new(lmt()).with("b", 3);
    partial.set_id(saved.id().unwrap());
    store.save(partial).await.unwrap();

    let loaded = store
        .load(&lmt(), &Query::by_id(saved.id().unwrap()))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(loaded.get("a"), Some(&json!(1)));
    assert_eq!(loaded.get("b"), Some(&json!(3)));
}

#[tokio::test]
async fn test_save_with_vanished_id_inserts_new_record() {
    let store = store();

    let mut record = Record::new(lmt()).with("p1", "v1");
    record.set_id("no-such-document");
    let saved = store.save(record).await.unwrap();

    assert_ne!(saved.id(), Some("no-such-document"));
    assert_eq!(store.list(&lmt(), &Query::new()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_save_uses_preassigned_id() {
    let store = store();

    let mut record = Record::new(lmt()).with("p1", "v1");
    record.preassign_id("chosen");
    let saved = store.save(record).await.unwrap();

    assert_eq!(saved.id(), Some("chosen"));
    assert!(store.load(&lmt(), &Query::by_id("chosen")).await.unwrap().is_some());
}

#[tokio::test]
async fn test_load_on_empty_database_is_none() {
    let store = store();

    let loaded = store.load(&lmt(), &Query::by_id("anything")).await.unwrap();

    assert_eq!(loaded, None);
}

// ============================================================================
// List
// ============================================================================

#[tokio::test]
async fn test_list_limit_and_skip() {
    let store = store();
    seed(&store, &lmt(), &["v1", "v2", "v3"]).await;

    let count = |limit: Option<u64>, skip: Option<u64>| {
        let mut builder = Query::builder();
        if let Some(limit) = limit {
            builder = builder.limit(limit);
        }
        if let Some(skip) = skip {
            builder = builder.skip(skip);
        }
        builder.build()
    };

    assert_eq!(store.list(&lmt(), &count(None, None)).await.unwrap().len(), 3);
    assert_eq!(store.list(&lmt(), &count(Some(1), Some(1))).await.unwrap().len(), 1);
    assert_eq!(store.list(&lmt(), &count(Some(2), Some(3))).await.unwrap().len(), 0);
    assert_eq!(store.list(&lmt(), &count(Some(5), Some(2))).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_sorts_by_first_key() {
    let store = store();
    seed(&store, &lmt(), &["b", "c", "a"]).await;

    let query = Query::from_value(json!({ "sort$": { "p1": -1 } })).unwrap();
    let records = store.list(&lmt(), &query).await.unwrap();

    let values = records
        .iter()
        .map(|record| record.get("p1").cloned().unwrap_or_default())
        .collect::<Vec<_>>();
    assert_eq!(values, vec![json!("c"), json!("b"), json!("a")]);
}

#[tokio::test]
async fn test_list_filters_by_equality() {
    let store = store();
    seed(&store, &lmt(), &["v1", "v2", "v1"]).await;

    let records = store
        .list(&lmt(), &Query::builder().filter("p1", "v1").build())
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|record| record.get("p1") == Some(&json!("v1"))));
}

#[tokio::test]
async fn test_types_share_collection_but_not_results() {
    let store = store();
    seed(&store, &Canon::new("foo"), &["v1", "v2"]).await;
    seed(&store, &Canon::with_base("moon", "bar"), &["v1"]).await;

    let foos = store.list(&Canon::new("foo"), &Query::new()).await.unwrap();
    let bars = store.list(&Canon::with_base("moon", "bar"), &Query::new()).await.unwrap();

    assert_eq!(foos.len(), 2);
    assert_eq!(bars.len(), 1);
    assert_eq!(store.client().count("senecadb").await, 3);
}

#[tokio::test]
async fn test_list_native_body_bypasses_discriminator() {
    let store = store();
    seed(&store, &Canon::new("foo"), &["v1"]).await;
    seed(&store, &Canon::new("bar"), &["v1", "v2"]).await;

    let query = Query::builder()
        .native(json!({ "selector": { "p1": "v1" } }))
        .build();
    let records = store.list(&Canon::new("foo"), &query).await.unwrap();

    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn test_discriminator_stored_with_document() {
    let store = store();
    let canon = Canon::parse("zone/base/name").unwrap();
    let saved = store.save(Record::new(canon).with("p1", "v1")).await.unwrap();

    let stored = store
        .native(|db| async move { db.get(saved.id().unwrap_or_default()).await })
        .await
        .unwrap();

    assert_eq!(stored["seneca_type"], json!("base_name"));
    assert!(stored["_rev"].as_str().is_some_and(|rev| rev.starts_with("1-")));
}

// ============================================================================
// Remove
// ============================================================================

#[tokio::test]
async fn test_remove_single_deletes_one_match() {
    let store = store();
    seed(&store, &lmt(), &["v1", "v1", "v1"]).await;

    let removed = store
        .remove(&lmt(), &Query::builder().filter("p1", "v1").build())
        .await
        .unwrap();

    assert!(removed.is_some());
    assert_eq!(store.list(&lmt(), &Query::new()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_remove_all_deletes_every_match_of_type() {
    let store = store();
    seed(&store, &lmt(), &["v1", "v2", "v3"]).await;
    seed(&store, &Canon::new("other"), &["v1"]).await;

    let removed = store
        .remove(&lmt(), &Query::builder().all(true).build())
        .await
        .unwrap();

    assert_eq!(removed, None);
    assert!(store.list(&lmt(), &Query::new()).await.unwrap().is_empty());
    assert_eq!(store.list(&Canon::new("other"), &Query::new()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_remove_all_overrides_caller_limit_and_fields() {
    let store = store();
    seed(&store, &lmt(), &["v1", "v2", "v3", "v4", "v5"]).await;

    let query = Query::from_value(json!({
        "all$": true,
        "load$": true,
        "limit$": 2,
        "fields$": ["p1"],
    }))
    .unwrap();
    let removed = store.remove(&lmt(), &query).await.unwrap();

    assert_eq!(removed, None);
    assert!(store.list(&lmt(), &Query::new()).await.unwrap().is_empty());
    assert_eq!(store.client().count("senecadb").await, 0);
}

#[tokio::test]
async fn test_remove_without_load_returns_none() {
    let store = store();
    let saved = seed(&store, &lmt(), &["v1"]).await;
    let id = saved[0].id().unwrap();

    let query = Query::from_value(json!({ "id": id, "load$": false })).unwrap();
    let removed = store.remove(&lmt(), &query).await.unwrap();

    assert_eq!(removed, None);
    assert_eq!(store.load(&lmt(), &Query::by_id(id)).await.unwrap(), None);
}

#[tokio::test]
async fn test_remove_with_no_match_is_none() {
    let store = store();
    seed(&store, &lmt(), &["v1"]).await;

    let removed = store
        .remove(&lmt(), &Query::builder().filter("p1", "missing").build())
        .await
        .unwrap();

    assert_eq!(removed, None);
    assert_eq!(store.list(&lmt(), &Query::new()).await.unwrap().len(), 1);
}

// ============================================================================
// Typed Entities
// ============================================================================

#[tokio::test]
async fn test_typed_entities_round_trip() {
    let store = store();
    let invoices = store.typed::<Invoice>();

    let saved = invoices
        .save(&Invoice { id: None, customer: "acme".into(), total: 42 })
        .await
        .unwrap();
    assert!(saved.id.is_some());

    let loaded = invoices
        .load(&Query::builder().filter("customer", "acme").build())
        .await
        .unwrap();
    assert_eq!(loaded, Some(saved.clone()));

    let listed = invoices.list(&Query::new()).await.unwrap();
    assert_eq!(listed, vec![saved.clone()]);

    let removed = invoices
        .remove(&Query::by_id(saved.id.clone().unwrap()))
        .await
        .unwrap();
    assert_eq!(removed, Some(saved));
    assert!(invoices.list(&Query::new()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_close_releases_store() {
    let store = store();
    seed(&store, &lmt(), &["v1"]).await;

    store.close().await.unwrap();
}
