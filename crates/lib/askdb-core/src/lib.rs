//! Core query engine for askdb.
//!
//! This crate owns the read path: the document store abstraction and its
//! `SurrealDB` implementation, the bounded query executor, and the registry that
//! exposes the executor as a single named tool.

pub mod error;
pub mod executor;
pub mod projection;
pub mod seed;
pub mod store;
pub mod tools;

pub use error::QueryError;
pub use executor::{ExecutorConfig, QueryExecutor};
pub use store::{DocumentStore, StoreError, StoreResult, SurrealDocumentStore};
pub use tools::ToolRegistry;
