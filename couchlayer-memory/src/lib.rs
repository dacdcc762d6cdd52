//! In-memory document database client for couchlayer.
//!
//! This crate provides a thread-safe, in-process implementation of the
//! `DocumentClient` trait that behaves like a CouchDB-compatible server on the
//! wire: documents carry `_id` and `_rev`, stale revisions are rejected,
//! `_find` evaluates selectors with sort/skip/limit/fields, and `_bulk_docs`
//! applies batches (including `_deleted` tombstones) with per-document results.
//! It is ideal for development and testing.
//!
//! # Quick Start
//!
//! ```ignore
//! use couchlayer::{prelude::*, memory::InMemoryClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = EntityStore::new(InMemoryClient::new(), StoreConfig::default());
//!
//!     let saved = store.save(Record::new(Canon::new("lmt")).with("p1", "v1")).await?;
//!     let loaded = store.load(&Canon::new("lmt"), &Query::by_id(saved.id().unwrap())).await?;
//!     assert_eq!(loaded, Some(saved));
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as couchlayer_memory;

pub mod evaluator;
pub mod store;

pub use store::{InMemoryClient, InMemoryClientBuilder};
