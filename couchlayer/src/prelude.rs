//! Convenient re-exports of commonly used types from couchlayer.
//!
//! ```ignore
//! use couchlayer::prelude::*;
//! ```

pub use couchlayer_core::{
    client::{ClientBuilder, DocumentClient, Method, Request, Scoped, WriteResult},
    config::{ConflictPolicy, StoreConfig},
    entities::Entities,
    error::{StoreError, StoreResult},
    query::{Directives, Query, QueryBuilder, Sort, SortDirection},
    record::{Canon, Entity, EntityExt, Record},
    selector::{FindBody, QueryCompiler, SelectorQuery},
    store::EntityStore,
};
