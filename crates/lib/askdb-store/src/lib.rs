//! Query models and schema helpers for askdb.
//!
//! This crate defines the shapes shared by the executor, the tool server, and
//! the agent bridge, plus the validation that bounds what any caller may ask
//! the document store for.

pub mod models;
pub mod schema;

pub use models::*;
pub use schema::{
    DEFAULT_LIMIT,
    MAX_LIMIT,
    SchemaValidationError,
    TOOL_DESCRIPTION,
    TOOL_NAME,
    query_args_schema,
};
