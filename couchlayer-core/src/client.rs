//! The transport seam between the entity store and a document database.
//!
//! The store never speaks HTTP itself. Everything it needs from the database
//! goes through [`DocumentClient`]: fetching one document, writing one
//! document, and issuing generic requests such as `_find` and `_bulk_docs`.
//!
//! # Implementations
//!
//! - `couchlayer-http` talks to a CouchDB-compatible server over HTTP
//! - `couchlayer-memory` emulates the same wire semantics in process
//!
//! # Example
//!
//! ```ignore
//! use couchlayer::client::{DocumentClient, Method};
//! use serde_json::json;
//!
//! let users = client.use_collection("senecadb");
//! let written = users.insert(json!({ "p1": "v1" })).await?;
//! let document = users.get(&written.id).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json, to_value};
use std::fmt::{self, Debug};

use crate::error::{StoreError, StoreResult};

/// Path of the selector query endpoint.
pub const FIND_PATH: &str = "_find";
/// Path of the bulk write endpoint.
pub const BULK_DOCS_PATH: &str = "_bulk_docs";

/// HTTP verb of a generic request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        })
    }
}

/// A generic request against a collection endpoint, e.g. `POST /{collection}/_find`.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub collection: String,
    pub path: String,
    pub body: Option<Value>,
    pub method: Method,
}

impl Request {
    /// Creates a `POST` request with a JSON body.
    pub fn post(collection: impl Into<String>, path: impl Into<String>, body: Value) -> Self {
        Self {
            collection: collection.into(),
            path: path.into(),
            body: Some(body),
            method: Method::Post,
        }
    }

    /// Creates a body-less `GET` request.
    pub fn get(collection: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            path: path.into(),
            body: None,
            method: Method::Get,
        }
    }
}

/// Identity of a document after a successful single-document write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResult {
    pub id: String,
    pub rev: String,
}

/// Abstract interface for document database clients.
///
/// Implementations must report the database's "document missing" answer as
/// [`StoreError::NotFound`] and revision mismatches as [`StoreError::Conflict`];
/// the store relies on both distinctions. Timeouts, if any, belong to the
/// implementation.
#[async_trait]
pub trait DocumentClient: Send + Sync + Debug {
    /// Fetches a document, including its `_id` and `_rev`.
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Value>;

    /// Writes a document.
    ///
    /// Without `_id` the database assigns one. With `_id` and `_rev` the
    /// existing document is replaced, provided `_rev` is current.
    async fn insert(&self, collection: &str, document: Value) -> StoreResult<WriteResult>;

    /// Issues a generic request and returns the decoded response body.
    async fn request(&self, request: Request) -> StoreResult<Value>;

    /// Returns a handle bound to one collection.
    fn use_collection<'a>(&'a self, name: &'a str) -> Scoped<'a, Self>
    where
        Self: Sized,
    {
        Scoped::new(name, self)
    }

    /// Releases the client's resources. The default implementation is a no-op.
    async fn shutdown(self) -> StoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<C> DocumentClient for &C
where
    C: DocumentClient,
{
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Value> {
        (*self).get(collection, id).await
    }

    async fn insert(&self, collection: &str, document: Value) -> StoreResult<WriteResult> {
        (*self).insert(collection, document).await
    }

    async fn request(&self, request: Request) -> StoreResult<Value> {
        (*self).request(request).await
    }
}

/// A client handle scoped to a single collection.
#[derive(Debug)]
pub struct Scoped<'a, C: DocumentClient> {
    name: &'a str,
    client: &'a C,
}

impl<'a, C: DocumentClient> Scoped<'a, C> {
    pub(crate) fn new(name: &'a str, client: &'a C) -> Self {
        Self { name, client }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &'a C {
        self.client
    }

    pub async fn get(&self, id: &str) -> StoreResult<Value> {
        self.client.get(self.name, id).await
    }

    pub async fn insert(&self, document: Value) -> StoreResult<WriteResult> {
        self.client.insert(self.name, document).await
    }

    /// Issues a raw request against this collection.
    pub async fn request(&self, path: &str, method: Method, body: Option<Value>) -> StoreResult<Value> {
        self.client
            .request(Request {
                collection: self.name.to_string(),
                path: path.to_string(),
                body,
                method,
            })
            .await
    }

    /// Runs a `_find` request and returns the matched documents in database order.
    pub async fn find<B: Serialize + Sync>(&self, body: &B) -> StoreResult<Vec<Value>> {
        let response = self
            .request(FIND_PATH, Method::Post, Some(to_value(body)?))
            .await?;

        match response {
            Value::Object(mut object) => match object.remove("docs") {
                Some(Value::Array(docs)) => Ok(docs),
                Some(Value::Null) | None => Ok(Vec::new()),
                Some(other) => Err(StoreError::InvalidDocument(format!("Unexpected docs in find response: {other}"))),
            },
            Value::Null => Ok(Vec::new()),
            other => Err(StoreError::InvalidDocument(format!("Unexpected find response: {other}"))),
        }
    }

    /// Posts a batch of documents to `_bulk_docs`.
    ///
    /// The per-document results are returned unexamined.
    pub async fn bulk_docs(&self, docs: Vec<Value>) -> StoreResult<Value> {
        self.request(BULK_DOCS_PATH, Method::Post, Some(json!({ "docs": docs })))
            .await
    }
}

/// Factory for clients that need asynchronous setup.
#[async_trait]
pub trait ClientBuilder {
    type Client: DocumentClient;

    async fn build(self) -> StoreResult<Self::Client>;
}
