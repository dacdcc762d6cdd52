//! In-memory client implementation emulating a CouchDB-style database.
//!
//! Documents live in per-collection maps guarded by an async-aware
//! read-write lock. Writes follow the database's revision rules: every write
//! produces a new `N-<hex>` revision, and replacing or deleting a document
//! requires its current `_rev`.

use async_trait::async_trait;
use mea::rwlock::RwLock;
use serde_json::{Map, Value, json};
use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tracing::trace;
use uuid::Uuid;

use couchlayer_core::{
    client::{BULK_DOCS_PATH, ClientBuilder, DocumentClient, FIND_PATH, Method, Request, WriteResult},
    error::{StoreError, StoreResult},
    record::{DELETED_FIELD, ID_FIELD, REV_FIELD},
};

use crate::evaluator::{Comparable, SelectorEvaluator, lookup};

/// Documents returned by `_find` when the body sets no limit.
pub const DEFAULT_FIND_LIMIT: u64 = 25;

/// Documents of one collection, ordered by id.
type CollectionMap = BTreeMap<String, Map<String, Value>>;
type StoreMap = HashMap<String, CollectionMap>;

/// Thread-safe in-memory document database.
///
/// `InMemoryClient` is cloneable; clones share the same underlying data.
/// Collections are created on first write. Reading a collection that was
/// never written answers "not found", as a missing database would.
///
/// # Example
///
/// ```ignore
/// use couchlayer_memory::InMemoryClient;
/// use couchlayer::client::DocumentClient;
/// use serde_json::json;
///
/// let client = InMemoryClient::new();
/// let written = client.insert("senecadb", json!({ "p1": "v1" })).await?;
/// let document = client.get("senecadb", &written.id).await?;
/// assert_eq!(document["_rev"], written.rev);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryClient {
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryClient {
    /// Creates a new empty client.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    pub fn builder() -> InMemoryClientBuilder {
        InMemoryClientBuilder
    }

    /// Creates an empty collection if it does not exist yet.
    pub async fn create_collection(&self, name: &str) {
        self.store
            .write()
            .await
            .entry(name.to_string())
            .or_default();
    }

    /// Drops a collection and every document in it.
    pub async fn drop_collection(&self, name: &str) -> StoreResult<()> {
        match self.store.write().await.remove(name) {
            Some(_) => Ok(()),
            None => Err(missing_collection(name)),
        }
    }

    /// Number of live documents in a collection.
    pub async fn count(&self, collection: &str) -> usize {
        self.store
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }
}

/// Applies one write to a collection following the database's revision rules.
fn write_document(
    collection_map: &mut CollectionMap,
    collection: &str,
    document: Value,
) -> StoreResult<WriteResult> {
    let mut document = match document {
        Value::Object(document) => document,
        other => return Err(StoreError::InvalidDocument(format!("Expected a JSON object, got {other}"))),
    };

    let id = match document.get(ID_FIELD) {
        Some(Value::String(id)) => id.clone(),
        Some(other) => return Err(StoreError::InvalidDocument(format!("Invalid _id: {other}"))),
        None => Uuid::new_v4().simple().to_string(),
    };
    let deleted = document.get(DELETED_FIELD) == Some(&Value::Bool(true));
    let supplied = document.get(REV_FIELD).and_then(Value::as_str);

    let generation = match (collection_map.get(&id), supplied) {
        (Some(current), Some(rev)) if current.get(REV_FIELD).and_then(Value::as_str) == Some(rev) => {
            generation_of(rev) + 1
        }
        (Some(_), _) | (None, Some(_)) => {
            return Err(StoreError::Conflict(id, collection.to_string()));
        }
        (None, None) if deleted => {
            return Err(StoreError::NotFound(id, collection.to_string()));
        }
        (None, None) => 1,
    };
    let rev = format!("{}-{}", generation, Uuid::new_v4().simple());

    if deleted {
        collection_map.remove(&id);
    } else {
        document.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        document.insert(REV_FIELD.to_string(), Value::String(rev.clone()));
        collection_map.insert(id.clone(), document);
    }

    Ok(WriteResult { id, rev })
}

fn generation_of(rev: &str) -> u64 {
    rev.split_once('-')
        .and_then(|(generation, _)| generation.parse().ok())
        .unwrap_or(0)
}

fn missing_collection(name: &str) -> StoreError {
    StoreError::NotFound(String::new(), name.to_string())
}

fn bad_request(reason: impl Into<String>) -> StoreError {
    StoreError::Server {
        status: 400,
        error: "bad_request".to_string(),
        reason: reason.into(),
    }
}

/// Executes a `_find` body: filter, sort, skip, limit, then project.
fn find(collection_map: &CollectionMap, body: &Value) -> StoreResult<Value> {
    let selector = body
        .get("selector")
        .and_then(Value::as_object)
        .ok_or_else(|| bad_request("Missing required key: selector"))?;

    let documents = collection_map
        .values()
        .cloned()
        .map(Value::Object)
        .collect::<Vec<_>>();
    let mut matched = SelectorEvaluator::filter_documents(&documents, selector)?;

    if let Some(sort) = body.get("sort") {
        let keys = sort_keys(sort)?;

        matched.sort_by(|a, b| {
            for (field, descending) in &keys {
                let left = lookup(a, field).map(Comparable::from).unwrap_or(Comparable::Null);
                let right = lookup(b, field).map(Comparable::from).unwrap_or(Comparable::Null);

                let ordering = left.partial_cmp(&right).unwrap_or(Ordering::Equal);
                let ordering = if *descending { ordering.reverse() } else { ordering };

                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }

    let skip = body.get("skip").and_then(Value::as_u64).unwrap_or(0);
    let limit = body.get("limit").and_then(Value::as_u64).unwrap_or(DEFAULT_FIND_LIMIT);
    let fields = body
        .get("fields")
        .and_then(Value::as_array)
        .map(|fields| fields.iter().filter_map(Value::as_str).collect::<Vec<_>>());

    let docs = matched
        .into_iter()
        .skip(usize::try_from(skip).unwrap_or(usize::MAX))
        .take(usize::try_from(limit).unwrap_or(usize::MAX))
        .map(|document| match &fields {
            Some(fields) => project(document, fields),
            None => document,
        })
        .collect::<Vec<_>>();

    Ok(json!({ "docs": docs }))
}

/// Reads `[{"field": "asc"|"desc"}, "field", ...]` into `(field, descending)` pairs.
fn sort_keys(sort: &Value) -> StoreResult<Vec<(String, bool)>> {
    sort.as_array()
        .ok_or_else(|| bad_request("sort must be an array"))?
        .iter()
        .map(|key| match key {
            Value::String(field) => Ok((field.clone(), false)),
            Value::Object(entry) if entry.len() == 1 => match entry.iter().next() {
                Some((field, Value::String(direction))) if direction == "asc" => Ok((field.clone(), false)),
                Some((field, Value::String(direction))) if direction == "desc" => Ok((field.clone(), true)),
                _ => Err(bad_request(format!("Invalid sort direction: {key}"))),
            },
            other => Err(bad_request(format!("Invalid sort field: {other}"))),
        })
        .collect()
}

fn project(document: Value, fields: &[&str]) -> Value {
    match document {
        Value::Object(mut object) => Value::Object(
            fields
                .iter()
                .filter_map(|field| object.remove(*field).map(|value| (field.to_string(), value)))
                .collect(),
        ),
        other => other,
    }
}

#[async_trait]
impl DocumentClient for InMemoryClient {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Value> {
        let store = self.store.read().await;
        let collection_map = store
            .get(collection)
            .ok_or_else(|| missing_collection(collection))?;

        collection_map
            .get(id)
            .cloned()
            .map(Value::Object)
            .ok_or_else(|| StoreError::NotFound(id.to_string(), collection.to_string()))
    }

    async fn insert(&self, collection: &str, document: Value) -> StoreResult<WriteResult> {
        let mut store = self.store.write().await;
        let collection_map = store
            .entry(collection.to_string())
            .or_default();

        write_document(collection_map, collection, document)
    }

    async fn request(&self, request: Request) -> StoreResult<Value> {
        trace!(method = %request.method, collection = %request.collection, path = %request.path, "request");

        match (request.method, request.path.as_str()) {
            (Method::Post, FIND_PATH) => {
                let store = self.store.read().await;
                let collection_map = store
                    .get(&request.collection)
                    .ok_or_else(|| missing_collection(&request.collection))?;

                find(collection_map, request.body.as_ref().unwrap_or(&Value::Null))
            }
            (Method::Post, BULK_DOCS_PATH) => {
                let docs = match request.body {
                    Some(Value::Object(mut body)) => match body.remove("docs") {
                        Some(Value::Array(docs)) => docs,
                        _ => return Err(bad_request("POST body must include `docs` parameter.")),
                    },
                    _ => return Err(bad_request("Request body must be a JSON object")),
                };

                let mut store = self.store.write().await;
                let collection_map = store
                    .get_mut(&request.collection)
                    .ok_or_else(|| missing_collection(&request.collection))?;

                let results = docs
                    .into_iter()
                    .map(|document| {
                        let id = document.get(ID_FIELD).cloned().unwrap_or(Value::Null);
                        match write_document(collection_map, &request.collection, document) {
                            Ok(WriteResult { id, rev }) => json!({ "ok": true, "id": id, "rev": rev }),
                            Err(StoreError::Conflict(..)) => {
                                json!({ "id": id, "error": "conflict", "reason": "Document update conflict." })
                            }
                            Err(StoreError::NotFound(..)) => {
                                json!({ "id": id, "error": "not_found", "reason": "missing" })
                            }
                            Err(err) => json!({ "id": id, "error": "bad_request", "reason": err.to_string() }),
                        }
                    })
                    .collect::<Vec<_>>();

                Ok(Value::Array(results))
            }
            (Method::Get, "") => {
                let store = self.store.read().await;
                let collection_map = store
                    .get(&request.collection)
                    .ok_or_else(|| missing_collection(&request.collection))?;

                Ok(json!({ "db_name": request.collection, "doc_count": collection_map.len() }))
            }
            (Method::Get, id) => self.get(&request.collection, id).await,
            (method, path) => Err(bad_request(format!("Unsupported request {method} {path}"))),
        }
    }
}

/// Builder for constructing [`InMemoryClient`] instances.
#[derive(Default)]
pub struct InMemoryClientBuilder;

#[async_trait]
impl ClientBuilder for InMemoryClientBuilder {
    type Client = InMemoryClient;

    /// Always succeeds with a fresh, empty client.
    async fn build(self) -> StoreResult<Self::Client> {
        Ok(InMemoryClient::new())
    }
}
