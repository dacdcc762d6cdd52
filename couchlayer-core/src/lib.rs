//! A thin entity persistence adapter for CouchDB-style HTTP/JSON document databases.
//!
//! This crate is the core of the couchlayer project and provides:
//!
//! - **Records** ([`record`]) - Records, canonical type names and typed entities
//! - **Queries** ([`query`]) - Generic filters plus typed result-shaping directives
//! - **Query compiler** ([`selector`]) - Translation to the database's selector queries
//! - **Client seam** ([`client`]) - Traits for the transport to the database
//! - **Entity store** ([`store`]) - Save, load, list, remove and native access
//! - **Typed entities** ([`entities`]) - The store bound to one entity type
//! - **Configuration** ([`config`]) - Endpoint, collection and discriminator settings
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use couchlayer::prelude::*;
//!
//! let store = EntityStore::new(client, StoreConfig::new("localhost", 5984, "senecadb"));
//!
//! let record = store.save(Record::new(Canon::new("foo")).with("p1", "v1")).await?;
//! let found = store.load(&Canon::new("foo"), &Query::by_id(record.id().unwrap())).await?;
//! store.remove(&Canon::new("foo"), &Query::builder().all(true).build()).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as couchlayer_core;

pub mod client;
pub mod config;
pub mod entities;
pub mod error;
pub mod query;
pub mod record;
pub mod selector;
pub mod store;
