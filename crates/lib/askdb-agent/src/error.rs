use std::{error::Error, fmt};

use askdb_core::QueryError;
use askdb_store::SchemaValidationError;

/// Failures while translating a question into a query and running it.
#[derive(Debug)]
pub enum BridgeError {
    /// The proposal was rejected by validation or the query failed.
    Query(QueryError),
    /// The model's reply could not be read as a tool call.
    ToolCallParse(String),
    /// The completion service failed or timed out.
    Completion(String),
    /// The tool channel could not be reached.
    Channel(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query(err) => write!(f, "{err}"),
            Self::ToolCallParse(message) => write!(f, "could not parse tool call: {message}"),
            Self::Completion(message) => write!(f, "completion service error: {message}"),
            Self::Channel(message) => write!(f, "tool channel error: {message}"),
        }
    }
}

impl Error for BridgeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Query(err) => Some(err),
            _ => None,
        }
    }
}

impl From<QueryError> for BridgeError {
    fn from(err: QueryError) -> Self {
        Self::Query(err)
    }
}

impl From<SchemaValidationError> for BridgeError {
    fn from(err: SchemaValidationError) -> Self {
        Self::Query(QueryError::from(err))
    }
}
