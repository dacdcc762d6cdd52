//! Mock server tests for the HTTP client.
//!
//! These tests use wiremock to stand in for a CouchDB server and check the
//! requests the client and the entity store put on the wire.

use couchlayer_core::{
    client::{ClientBuilder, DocumentClient, Request},
    config::StoreConfig,
    error::StoreError,
    query::Query,
    record::{Canon, Record},
    store::EntityStore,
};
use couchlayer_http::CouchHttpClient;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> StoreConfig {
    StoreConfig::new("127.0.0.1", server.address().port(), "senecatest")
}

async fn connect(server: &MockServer) -> CouchHttpClient {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "couchdb": "Welcome" })))
        .mount(server)
        .await;

    CouchHttpClient::builder(&config(server)).build().await.unwrap()
}

// ============================================================================
// Setup
// ============================================================================

#[tokio::test]
async fn test_build_fails_when_server_rejects() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = CouchHttpClient::builder(&config(&server)).build().await.unwrap_err();

    assert!(matches!(err, StoreError::Initialization(_)));
}

#[tokio::test]
async fn test_build_fails_when_unreachable() {
    let config = StoreConfig::new("127.0.0.1", 1, "senecatest");

    let err = CouchHttpClient::builder(&config).build().await.unwrap_err();

    assert!(matches!(err, StoreError::Initialization(_)));
}

// ============================================================================
// Client Requests
// ============================================================================

#[tokio::test]
async fn test_get_maps_404_to_not_found() {
    let server = MockServer::start().await;
    let client = connect(&server).await;

    Mock::given(method("GET"))
        .and(path("/senecatest/d1"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": "not_found",
            "reason": "missing"
        })))
        .mount(&server)
        .await;

    let err = client.get("senecatest", "d1").await.unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_insert_maps_409_to_conflict() {
    let server = MockServer::start().await;
    let client = connect(&server).await;

    Mock::given(method("POST"))
        .and(path("/senecatest"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": "conflict",
            "reason": "Document update conflict."
        })))
        .mount(&server)
        .await;

    let err = client
        .insert("senecatest", json!({ "_id": "d1", "_rev": "1-old" }))
        .await
        .unwrap_err();

    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_server_errors_keep_error_and_reason() {
    let server = MockServer::start().await;
    let client = connect(&server).await;

    Mock::given(method("POST"))
        .and(path("/senecatest/_find"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "bad_request",
            "reason": "Missing required key: selector"
        })))
        .mount(&server)
        .await;

    let err = client
        .request(Request::post("senecatest", "_find", json!({})))
        .await
        .unwrap_err();

    match err {
        StoreError::Server { status, error, reason } => {
            assert_eq!(status, 400);
            assert_eq!(error, "bad_request");
            assert_eq!(reason, "Missing required key: selector");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_document_ids_are_path_escaped() {
    let server = MockServer::start().await;
    let client = connect(&server).await;

    Mock::given(method("GET"))
        .and(path("/senecatest/a%20b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "_id": "a b", "_rev": "1-a" })))
        .mount(&server)
        .await;

    let document = client.get("senecatest", "a b").await.unwrap();

    assert_eq!(document["_id"], "a b");
}

#[tokio::test]
async fn test_get_rejects_empty_id() {
    let server = MockServer::start().await;
    let client = connect(&server).await;

    Mock::given(method("GET"))
        .and(path("/senecatest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "db_name": "senecatest" })))
        .expect(0)
        .mount(&server)
        .await;

    let err = client.get("senecatest", "").await.unwrap_err();

    assert!(matches!(err, StoreError::InvalidDocument(_)));
}

// ============================================================================
// Store Over HTTP
// ============================================================================

#[tokio::test]
async fn test_save_insert_posts_document_with_discriminator() {
    let server = MockServer::start().await;
    let store = EntityStore::new(connect(&server).await, config(&server));

    Mock::given(method("POST"))
        .and(path("/senecatest"))
        .and(body_json(json!({ "p1": "v1", "p2": "v2", "seneca_type": "foo" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "ok": true,
            "id": "d1",
            "rev": "1-a"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let record = Record::new(Canon::new("foo")).with("p1", "v1").with("p2", "v2");
    let saved = store.save(record).await.unwrap();

    assert_eq!(saved.id(), Some("d1"));
}

#[tokio::test]
async fn test_load_posts_find_with_limit_one() {
    let server = MockServer::start().await;
    let store = EntityStore::new(connect(&server).await, config(&server));

    Mock::given(method("POST"))
        .and(path("/senecatest/_find"))
        .and(body_json(json!({
            "selector": { "_id": "d1", "seneca_type": "foo" },
            "limit": 1
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "docs": [{ "_id": "d1", "_rev": "1-a", "p1": "v1", "seneca_type": "foo" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let record = store
        .load(&Canon::new("foo"), &Query::by_id("d1"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(record.to_value(), json!({ "id": "d1", "p1": "v1" }));
}

#[tokio::test]
async fn test_remove_finds_then_bulk_deletes() {
    let server = MockServer::start().await;
    let store = EntityStore::new(connect(&server).await, config(&server));

    Mock::given(method("POST"))
        .and(path("/senecatest/_find"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "docs": [{ "_id": "d1", "_rev": "1-a", "p1": "v1", "seneca_type": "foo" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/senecatest/_bulk_docs"))
        .and(body_json(json!({
            "docs": [{ "_id": "d1", "_rev": "1-a", "_deleted": true }]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            { "ok": true, "id": "d1", "rev": "2-b" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let removed = store
        .remove(&Canon::new("foo"), &Query::by_id("d1"))
        .await
        .unwrap();

    assert_eq!(removed.and_then(|r| r.id().map(str::to_string)), Some("d1".to_string()));
}

#[tokio::test]
async fn test_missing_database_reads_as_empty() {
    let server = MockServer::start().await;
    let store = EntityStore::new(connect(&server).await, config(&server));

    Mock::given(method("POST"))
        .and(path("/senecatest/_find"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": "not_found",
            "reason": "Database does not exist."
        })))
        .mount(&server)
        .await;

    let records = store.list(&Canon::new("foo"), &Query::new()).await.unwrap();

    assert!(records.is_empty());
}

#[tokio::test]
async fn test_save_with_empty_id_inserts() {
    let server = MockServer::start().await;
    let store = EntityStore::new(connect(&server).await, config(&server));

    Mock::given(method("GET"))
        .and(path("/senecatest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "db_name": "senecatest",
            "doc_count": 7
        })))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/senecatest"))
        .and(body_json(json!({ "p1": "v1", "seneca_type": "foo" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "ok": true,
            "id": "d1",
            "rev": "1-a"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut record = Record::new(Canon::new("foo")).with("p1", "v1");
    record.set_id("");
    let saved = store.save(record).await.unwrap();

    assert_eq!(saved.id(), Some("d1"));
}
