//! Typed access to the entity store.
//!
//! [`Entities`] wraps an [`EntityStore`] for one [`Entity`] type, converting
//! between typed values and records on the way in and out.
//!
//! # Example
//!
//! ```ignore
//! let invoices = store.typed::<Invoice>();
//! let saved = invoices.save(&Invoice { id: None, total: 42 }).await?;
//! let found = invoices.load(&Query::by_id(saved.id.clone().unwrap())).await?;
//! ```

use std::marker::PhantomData;

use crate::{
    client::DocumentClient,
    error::StoreResult,
    query::Query,
    record::{Entity, EntityExt},
    store::EntityStore,
};

/// A view of an [`EntityStore`] bound to the entity type `E`.
#[derive(Debug)]
pub struct Entities<'a, C: DocumentClient, E: Entity> {
    store: &'a EntityStore<C>,
    _marker: PhantomData<E>,
}

impl<'a, C: DocumentClient, E: Entity> Entities<'a, C, E> {
    pub(crate) fn new(store: &'a EntityStore<C>) -> Self {
        Self { store, _marker: PhantomData }
    }

    /// Saves an entity and returns it with its id filled in.
    pub async fn save(&self, entity: &E) -> StoreResult<E> {
        E::from_record(self.store.save(entity.to_record()?).await?)
    }

    pub async fn load(&self, query: &Query) -> StoreResult<Option<E>> {
        self.store
            .load(&E::canon(), query)
            .await?
            .map(E::from_record)
            .transpose()
    }

    pub async fn list(&self, query: &Query) -> StoreResult<Vec<E>> {
        self.store
            .list(&E::canon(), query)
            .await?
            .into_iter()
            .map(E::from_record)
            .collect()
    }

    /// Removes matching entities; see [`EntityStore::remove`].
    pub async fn remove(&self, query: &Query) -> StoreResult<Option<E>> {
        self.store
            .remove(&E::canon(), query)
            .await?
            .map(E::from_record)
            .transpose()
    }
}
