//! Store configuration.
//!
//! A [`StoreConfig`] is built once (usually deserialized from the host's
//! settings) and handed to the store and the HTTP client at construction.

use serde::{Deserialize, Serialize};

/// What the store does when a write is rejected for a stale revision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ConflictPolicy {
    /// Return the conflict to the caller.
    #[default]
    Surface,
    /// Re-fetch, re-merge and re-write an update, at most `attempts` more times.
    Refetch { attempts: u32 },
}

/// Connection and naming settings for an entity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Host of the database's HTTP endpoint.
    pub host: String,
    /// Port of the database's HTTP endpoint.
    pub port: u16,
    /// Physical collection (database) holding every record type.
    pub dbname: String,
    /// Name of the discriminator field carrying each document's canonical type.
    pub basename: String,
    pub conflict_policy: ConflictPolicy,
}

impl StoreConfig {
    pub const DEFAULT_HOST: &'static str = "localhost";
    pub const DEFAULT_PORT: u16 = 5984;
    pub const DEFAULT_DBNAME: &'static str = "senecadb";
    pub const DEFAULT_BASENAME: &'static str = "seneca_type";

    /// Creates a configuration for the given endpoint and collection with default naming.
    pub fn new(host: impl Into<String>, port: u16, dbname: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            dbname: dbname.into(),
            ..Self::default()
        }
    }

    pub fn with_basename(mut self, basename: impl Into<String>) -> Self {
        self.basename = basename.into();
        self
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    /// Base URL of the database's HTTP endpoint.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: Self::DEFAULT_HOST.to_string(),
            port: Self::DEFAULT_PORT,
            dbname: Self::DEFAULT_DBNAME.to_string(),
            basename: Self::DEFAULT_BASENAME.to_string(),
            conflict_policy: ConflictPolicy::default(),
        }
    }
}
