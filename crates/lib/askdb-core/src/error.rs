use std::{error::Error, fmt};

use askdb_store::SchemaValidationError;

use crate::store::StoreError;

/// Failures of the query path, from argument validation down to the store.
#[derive(Debug)]
pub enum QueryError {
    SchemaValidation(String),
    UnknownTool(String),
    CollectionNotFound(String),
    StoreUnavailable(String),
    Store(String),
}

impl QueryError {
    /// Stable machine-readable tag, used when the error crosses a process
    /// boundary.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SchemaValidation(_) => "schema_validation",
            Self::UnknownTool(_) => "unknown_tool",
            Self::CollectionNotFound(_) => "collection_not_found",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::Store(_) => "store",
        }
    }

    /// Rebuilds an error from its tag and message.
    #[must_use]
    pub fn from_kind(kind: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            "schema_validation" => Self::SchemaValidation(message),
            "unknown_tool" => Self::UnknownTool(message),
            "collection_not_found" => Self::CollectionNotFound(message),
            "store_unavailable" => Self::StoreUnavailable(message),
            _ => Self::Store(message),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::SchemaValidation(message)
            | Self::UnknownTool(message)
            | Self::CollectionNotFound(message)
            | Self::StoreUnavailable(message)
            | Self::Store(message) => message,
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchemaValidation(message) => write!(f, "schema validation failed: {message}"),
            Self::UnknownTool(name) => write!(f, "unknown tool: {name}"),
            Self::CollectionNotFound(name) => write!(f, "collection not found: {name}"),
            Self::StoreUnavailable(message) => write!(f, "document store unavailable: {message}"),
            Self::Store(message) => write!(f, "document store error: {message}"),
        }
    }
}

impl Error for QueryError {}

impl From<SchemaValidationError> for QueryError {
    fn from(err: SchemaValidationError) -> Self {
        Self::SchemaValidation(err.0)
    }
}

impl From<StoreError> for QueryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(message) => Self::StoreUnavailable(message),
            StoreError::InvalidInput(message) => Self::SchemaValidation(message),
            StoreError::Query(message) => Self::Store(message),
        }
    }
}
