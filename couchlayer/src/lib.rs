//! Main couchlayer crate providing entity persistence over CouchDB-style document databases.
//!
//! This crate is the primary entry point. It re-exports the core types from
//! `couchlayer-core` and gives access to the available clients.
//!
//! # Features
//!
//! - **Records and typed entities** - Work with loose JSON records or your own Serde types
//! - **Shared collection** - Every logical type lives in one database, told apart by a discriminator field
//! - **Query directives** - `sort$`, `limit$`, `skip$`, `fields$`, `all$`, `load$` and `native$`
//! - **Pluggable clients** - An in-memory client for tests and an HTTP client for real servers
//!
//! # Quick Start
//!
//! ```ignore
//! use couchlayer::{prelude::*, memory::InMemoryClient};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = EntityStore::new(InMemoryClient::new(), StoreConfig::default());
//!
//!     let saved = store
//!         .save(Record::new(Canon::new("lmt")).with("p1", "v1"))
//!         .await
//!         .unwrap();
//!
//!     let found = store
//!         .list(
//!             &Canon::new("lmt"),
//!             &Query::builder().filter("p1", "v1").limit(10).build(),
//!         )
//!         .await
//!         .unwrap();
//!
//!     println!("Saved {:?}, found {:?}", saved, found);
//!
//!     store.close().await.unwrap();
//! }
//! ```
//!
//! # Loose Queries
//!
//! Queries can also be written as JSON, with directives as keys ending in `$`:
//!
//! ```ignore
//! let query = Query::from_value(json!({ "p1": "v1", "sort$": { "p2": -1 }, "limit$": 5 }))?;
//! ```
//!
//! # Clients
//!
//! - [`memory`] - In-process database for development and testing
//! - [`http`] - CouchDB HTTP client (requires the `http` feature)

pub mod prelude;

pub use couchlayer_core::{client, config, entities, error, query, record, selector, store};

// Re-export serde_json for building queries and records
pub use serde_json;

/// In-memory client implementations.
pub mod memory {
    pub use couchlayer_memory::{InMemoryClient, InMemoryClientBuilder};
}

/// CouchDB HTTP client implementations.
///
/// This module is only available when the `http` feature is enabled.
#[cfg(feature = "http")]
pub mod http {
    use couchlayer_core::{
        client::ClientBuilder,
        config::StoreConfig,
        error::StoreResult,
        store::EntityStore,
    };

    pub use couchlayer_http::{CouchHttpClient, CouchHttpClientBuilder};

    /// Connects to the server named in `config` and opens an entity store on it.
    pub async fn connect(config: StoreConfig) -> StoreResult<EntityStore<CouchHttpClient>> {
        let client = CouchHttpClient::builder(&config).build().await?;

        Ok(EntityStore::new(client, config))
    }
}
