//! HTTP client for couchlayer.
//!
//! This crate provides a `reqwest` based implementation of the `DocumentClient`
//! trait for CouchDB-compatible servers. Documents are fetched with
//! `GET /{db}/{id}`, written with `POST /{db}`, and generic requests such as
//! `_find` and `_bulk_docs` go to `/{db}/{path}`.
//!
//! To use this client through the facade crate, enable the `http` feature:
//!
//! ```toml
//! [dependencies]
//! couchlayer = { version = "x.y.z", features = ["http"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use couchlayer::{client::ClientBuilder, config::StoreConfig, http::CouchHttpClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StoreConfig::new("127.0.0.1", 5984, "senecatest");
//!     let client = CouchHttpClient::builder(&config).build().await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as couchlayer_http;

pub mod client;

pub use client::{CouchHttpClient, CouchHttpClientBuilder};
