//! The entity store: save, load, list and remove records in one physical collection.
//!
//! Every logical record type shares the configured collection; documents are
//! told apart by the discriminator field (`seneca_type` by default), which the
//! store writes on every save and adds to every selector.
//!
//! Updates and removes are two requests each (get then write, find then bulk
//! delete) and hold no lock in between. A concurrent writer can slip into the
//! gap; the database's revision check is the only protection, and a rejected
//! write surfaces as an ordinary error unless [`ConflictPolicy::Refetch`] is set.
//!
//! # Example
//!
//! ```ignore
//! use couchlayer::{prelude::*, memory::InMemoryClient};
//!
//! let store = EntityStore::new(InMemoryClient::new(), StoreConfig::default());
//!
//! let saved = store.save(Record::new(Canon::new("lmt")).with("p1", "v1")).await?;
//! let loaded = store.load(&Canon::new("lmt"), &Query::by_id(saved.id().unwrap())).await?;
//! ```

use serde::Serialize;
use serde_json::{Map, Value, json};
use std::future::Future;
use tracing::{debug, error, instrument, warn};

use crate::{
    client::{DocumentClient, Scoped},
    config::{ConflictPolicy, StoreConfig},
    entities::Entities,
    error::{StoreError, StoreResult},
    query::Query,
    record::{Canon, DELETED_FIELD, Entity, ID_FIELD, REV_FIELD, Record},
    selector::QueryCompiler,
};

/// Limit used by bulk removes: the largest integer a JSON number carries exactly.
pub const MAX_FIND_LIMIT: u64 = 9_007_199_254_740_991;

/// Entity persistence over a single document database collection.
#[derive(Debug)]
pub struct EntityStore<C: DocumentClient> {
    client: C,
    config: StoreConfig,
}

impl<C: DocumentClient> EntityStore<C> {
    /// Creates a new store over `client`.
    pub fn new(client: C, config: StoreConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Returns a handle to the physical collection.
    pub fn collection(&self) -> Scoped<'_, C> {
        self.client.use_collection(&self.config.dbname)
    }

    /// Returns the query compiler configured with this store's discriminator field.
    pub fn compiler(&self) -> QueryCompiler<'_> {
        QueryCompiler::new(&self.config.basename)
    }

    /// Gets a typed view of the store for the entity type `E`.
    pub fn typed<E: Entity>(&self) -> Entities<'_, C, E> {
        Entities::new(self)
    }

    /// Saves a record.
    ///
    /// A record with an `id` is merged into the stored document, so fields the
    /// record does not carry are kept. If that document no longer exists the
    /// record is inserted as new instead. A record without an `id`, or with an
    /// empty one, is inserted,
    /// using its preassigned id if any, and comes back with its new `id` set.
    #[instrument(skip_all, fields(canon = %record.canon()))]
    pub async fn save(&self, mut record: Record) -> StoreResult<Record> {
        if let Some(id) = record.id().filter(|id| !id.is_empty()).map(str::to_string) {
            if self.update(&record, &id).await.map_err(surface)? {
                record.take_preassigned_id();
                debug!(id, "save/update");
                return Ok(record);
            }

            debug!(id, "stored document is gone, saving as new");
            record.clear_id();
        }

        let mut document = record.fields().clone();
        if let Some(id) = record.take_preassigned_id() {
            document.insert(ID_FIELD.to_string(), Value::String(id));
        }
        self.discriminate(&mut document, record.canon());

        let written = self
            .collection()
            .insert(Value::Object(document))
            .await
            .map_err(surface)?;

        record.set_id(written.id);
        debug!(id = record.id(), "save/insert");

        Ok(record)
    }

    /// Writes `record` over the stored document `id`.
    ///
    /// Returns `false` when the document does not exist.
    async fn update(&self, record: &Record, id: &str) -> StoreResult<bool> {
        let retries = match self.config.conflict_policy {
            ConflictPolicy::Surface => 0,
            ConflictPolicy::Refetch { attempts } => attempts,
        };
        let collection = self.collection();
        let mut attempt = 0;

        loop {
            let stored = match collection.get(id).await {
                Ok(stored) => stored,
                Err(err) if err.is_not_found() => return Ok(false),
                Err(err) => return Err(err),
            };

            match collection.insert(self.merge(stored, record)?).await {
                Ok(_) => return Ok(true),
                Err(err) if err.is_conflict() && attempt < retries => {
                    attempt += 1;
                    warn!(id, attempt, "revision conflict, retrying update");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Overlays the record's fields on the stored document, keeping `_id`, `_rev`
    /// and every field the record does not mention.
    fn merge(&self, stored: Value, record: &Record) -> StoreResult<Value> {
        let mut document = match stored {
            Value::Object(document) => document,
            other => return Err(StoreError::InvalidDocument(format!("Stored document is not an object: {other}"))),
        };

        for (field, value) in record.fields() {
            document.insert(field.clone(), value.clone());
        }
        self.discriminate(&mut document, record.canon());

        Ok(Value::Object(document))
    }

    fn discriminate(&self, document: &mut Map<String, Value>, canon: &Canon) {
        document.insert(self.config.basename.clone(), Value::String(canon.canonical()));
    }

    /// Loads the first record of type `canon` matching `query`.
    ///
    /// Always a `_find` with limit 1, even for plain id lookups.
    #[instrument(skip_all, fields(canon = %canon))]
    pub async fn load(&self, canon: &Canon, query: &Query) -> StoreResult<Option<Record>> {
        let mut selector = self.compiler().compile(query, canon);
        selector.limit = Some(1);

        let record = self
            .find(&selector)
            .await?
            .into_iter()
            .next()
            .map(|document| self.to_record(canon, document))
            .transpose()?;

        debug!(query = ?query.filter, found = record.is_some(), "load");

        Ok(record)
    }

    /// Lists every record of type `canon` matching `query`, in database order.
    ///
    /// A `native` directive replaces the compiled selector query entirely.
    #[instrument(skip_all, fields(canon = %canon))]
    pub async fn list(&self, canon: &Canon, query: &Query) -> StoreResult<Vec<Record>> {
        let body = self.compiler().compile_for_list(query, canon);

        let records = self
            .find(&body)
            .await?
            .into_iter()
            .map(|document| self.to_record(canon, document))
            .collect::<StoreResult<Vec<_>>>()?;

        debug!(query = ?query.filter, count = records.len(), "list");

        Ok(records)
    }

    /// Removes the first record of type `canon` matching `query`, or every
    /// match when the `all` directive is set.
    ///
    /// A single remove returns the deleted record unless `load` is `false`.
    /// A bulk remove always returns `None`. Nothing is written when nothing
    /// matches. Per-document failures inside the bulk delete are not inspected.
    #[instrument(skip_all, fields(canon = %canon))]
    pub async fn remove(&self, canon: &Canon, query: &Query) -> StoreResult<Option<Record>> {
        let all = query.directives.all;
        let load = !all && query.directives.load.unwrap_or(true);

        let mut selector = self.compiler().compile(query, canon);
        selector.limit = Some(if all { MAX_FIND_LIMIT } else { 1 });
        selector.fields = None;

        let documents = self.find(&selector).await?;
        let Some(first) = documents.first() else {
            debug!(query = ?query.filter, "remove matched nothing");
            return Ok(None);
        };

        let snapshot = if load {
            Some(self.to_record(canon, first.clone()).map_err(surface)?)
        } else {
            None
        };

        let batch = documents
            .iter()
            .map(tombstone)
            .collect::<StoreResult<Vec<_>>>()
            .map_err(surface)?;
        let count = batch.len();

        self.collection()
            .bulk_docs(batch)
            .await
            .map_err(surface)?;

        debug!(query = ?query.filter, count, "remove");

        Ok(snapshot)
    }

    /// Hands the raw collection handle to `f` for requests the query compiler cannot express.
    ///
    /// ```ignore
    /// let docs = store
    ///     .native(|db| async move { db.find(&json!({ "selector": { "p1": { "$gt": "v1" } } })).await })
    ///     .await?;
    /// ```
    pub async fn native<'a, F, Fut, T>(&'a self, f: F) -> T
    where
        F: FnOnce(Scoped<'a, C>) -> Fut,
        Fut: Future<Output = T>,
    {
        f(self.collection()).await
    }

    /// Shuts down the store and releases the client.
    pub async fn close(self) -> StoreResult<()> {
        debug!(dbname = %self.config.dbname, "close");
        self.client.shutdown().await
    }

    /// Runs a `_find`, treating a missing database as an empty result.
    async fn find<B: Serialize + Sync>(&self, body: &B) -> StoreResult<Vec<Value>> {
        match self.collection().find(body).await {
            Ok(documents) => Ok(documents),
            Err(err) if err.is_not_found() => Ok(Vec::new()),
            Err(err) => Err(surface(err)),
        }
    }

    fn to_record(&self, canon: &Canon, document: Value) -> StoreResult<Record> {
        Record::from_document(canon.clone(), document, &self.config.basename)
    }
}

/// Builds the bulk-delete entry for a found document.
fn tombstone(document: &Value) -> StoreResult<Value> {
    match (document.get(ID_FIELD), document.get(REV_FIELD)) {
        (Some(id), Some(rev)) => Ok(json!({ ID_FIELD: id, REV_FIELD: rev, DELETED_FIELD: true })),
        _ => Err(StoreError::InvalidDocument(format!("Found document lacks _id or _rev: {document}"))),
    }
}

fn surface(err: StoreError) -> StoreError {
    error!(error = %err, "entity store request failed");
    err
}
