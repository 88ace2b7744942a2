//! Store interfaces and `SurrealDB` implementation.
//!
//! The store layer only ever reads: it resolves a validated [`QuerySpec`] into
//! filtered, sorted, and limited documents. Projection is applied by the
//! executor on top of what the store returns.

mod compile;
pub mod surreal;

use std::{error::Error, fmt};

use askdb_store::{Document, QuerySpec};
use async_trait::async_trait;

pub use compile::{CompiledQuery, compile_select};
pub use surreal::SurrealDocumentStore;

#[derive(Debug)]
pub enum StoreError {
    /// The connection or transport to the store failed.
    Unavailable(String),
    /// The store rejected or failed a statement.
    Query(String),
    InvalidInput(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "document store unavailable: {message}"),
            Self::Query(message) => write!(f, "document store query failed: {message}"),
            Self::InvalidInput(message) => write!(f, "Invalid input: {message}"),
        }
    }
}

impl Error for StoreError {}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read-only access to named collections of documents.
///
/// Implementations must be safe to share across concurrent calls.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Returns documents of `spec.collection` matching `spec.filter`, ordered by
    /// `spec.sort` and capped at `spec.limit`. A missing collection yields an
    /// empty list.
    async fn find(&self, spec: &QuerySpec) -> StoreResult<Vec<Document>>;

    /// Reports whether a collection is defined in the store.
    async fn collection_exists(&self, collection: &str) -> StoreResult<bool>;
}
