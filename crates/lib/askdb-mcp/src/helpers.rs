use std::borrow::Cow;

use askdb_core::QueryError;
use rmcp::ErrorData;
use rmcp::model::ErrorCode;
use serde_json::{Value, json};

use crate::state::LifecycleError;

fn mcp_err(code: ErrorCode, message: impl Into<Cow<'static, str>>, data: Option<Value>) -> ErrorData {
    ErrorData {
        code,
        message: message.into(),
        data,
    }
}

/// Maps a query failure onto an MCP error, tagging it with its kind so the
/// client can rebuild the same variant.
pub fn query_err(err: &QueryError) -> ErrorData {
    let code = match err {
        QueryError::SchemaValidation(_) => ErrorCode::INVALID_PARAMS,
        QueryError::UnknownTool(_) => ErrorCode::METHOD_NOT_FOUND,
        QueryError::CollectionNotFound(_) => ErrorCode::RESOURCE_NOT_FOUND,
        QueryError::StoreUnavailable(_) | QueryError::Store(_) => ErrorCode::INTERNAL_ERROR,
    };
    mcp_err(
        code,
        err.message().to_string(),
        Some(json!({"kind": err.kind()})),
    )
}

pub fn lifecycle_err(err: LifecycleError) -> ErrorData {
    mcp_err(ErrorCode::INTERNAL_ERROR, err.to_string(), None)
}

/// Rebuilds a query failure from an MCP error.
///
/// Errors without a kind tag (for example argument decoding failures raised by
/// the transport layer) are classified by code.
pub fn query_error_from(err: &ErrorData) -> QueryError {
    let message = err.message.to_string();
    if let Some(kind) = err
        .data
        .as_ref()
        .and_then(|data| data.get("kind"))
        .and_then(Value::as_str)
    {
        return QueryError::from_kind(kind, message);
    }
    if err.code == ErrorCode::INVALID_PARAMS {
        QueryError::SchemaValidation(message)
    } else if err.code == ErrorCode::METHOD_NOT_FOUND {
        QueryError::UnknownTool(message)
    } else if err.code == ErrorCode::RESOURCE_NOT_FOUND {
        QueryError::CollectionNotFound(message)
    } else {
        QueryError::Store(message)
    }
}
