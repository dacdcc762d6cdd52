//! Error types and result types for entity store operations.
//!
//! Use [`StoreResult<T>`] as the return type for fallible operations. The
//! database's "document missing" signal is a distinct variant so callers (and
//! the store itself) can tell it apart from genuine failures.

use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when talking to a document database.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Serialization/deserialization error when converting between records and JSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during client setup or connection. Fatal for the host process.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// The requested document (or database) does not exist.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    NotFound(String, String),
    /// The write carried a stale or missing revision.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document update conflict for {0} in collection {1}")]
    Conflict(String, String),
    /// The database answered with a non-success status.
    #[error("Server error {status}: {error} ({reason})")]
    Server {
        status: u16,
        error: String,
        reason: String,
    },
    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(String),
    /// A stored or supplied document does not have the expected shape.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// A query could not be parsed or compiled.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl StoreError {
    /// Returns `true` for the database's "document missing" signal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(..))
    }

    /// Returns `true` when a write was rejected because of a revision mismatch.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(..))
    }
}

/// A specialized `Result` type for entity store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<SerdeJsonError> for StoreError {
    fn from(err: SerdeJsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
