//! In-process registry for the single query tool.

use std::sync::Arc;

use askdb_store::{
    QueryResult,
    QuerySpec,
    TOOL_DESCRIPTION,
    TOOL_NAME,
    ToolDescriptor,
    query_args_schema,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::QueryError;
use crate::executor::QueryExecutor;

/// Registers exactly one tool and dispatches calls to the executor.
///
/// The descriptor is built once at construction and never changes. Clones
/// share it; calls hold no state between invocations.
#[derive(Clone)]
pub struct ToolRegistry {
    descriptor: Arc<ToolDescriptor>,
    executor: QueryExecutor,
}

impl ToolRegistry {
    #[must_use]
    pub fn new(executor: QueryExecutor) -> Self {
        let descriptor = ToolDescriptor {
            name: TOOL_NAME.to_string(),
            description: TOOL_DESCRIPTION.to_string(),
            input_schema: query_args_schema(),
        };
        Self {
            descriptor: Arc::new(descriptor),
            executor,
        }
    }

    #[must_use]
    pub fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub const fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    /// Lists registered tools.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        vec![self.descriptor.as_ref().clone()]
    }

    /// Validates and runs a tool call.
    ///
    /// # Errors
    /// Returns `QueryError::UnknownTool` when `name` is not registered,
    /// `QueryError::SchemaValidation` when `arguments` do not fit the schema,
    /// and any executor failure otherwise.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<QueryResult, QueryError> {
        if name != self.descriptor.name {
            return Err(QueryError::UnknownTool(name.to_string()));
        }
        let spec = QuerySpec::from_arguments(arguments)?;
        debug!(tool = name, collection = %spec.collection, limit = spec.limit, "tool call");
        self.executor.execute(spec).await
    }

    /// Runs an already parsed spec through the executor.
    ///
    /// # Errors
    /// Returns any executor failure.
    pub async fn run_query(&self, spec: QuerySpec) -> Result<QueryResult, QueryError> {
        self.executor.execute(spec).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use askdb_store::Document;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::store::{DocumentStore, StoreResult};

    #[derive(Default)]
    struct CountingStore {
        finds: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for CountingStore {
        async fn find(&self, _spec: &QuerySpec) -> StoreResult<Vec<Document>> {
            self.finds.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn collection_exists(&self, _collection: &str) -> StoreResult<bool> {
            Ok(true)
        }
    }

    fn arguments(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn lists_one_stable_descriptor() {
        let registry = ToolRegistry::new(QueryExecutor::new(Arc::new(CountingStore::default())));
        let first = registry.list_tools();
        let second = registry.list_tools();
        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
        assert_eq!(first[0].name, TOOL_NAME);
        assert_eq!(first[0].input_schema["additionalProperties"], json!(false));
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected_without_store_access() {
        let store = Arc::new(CountingStore::default());
        let registry = ToolRegistry::new(QueryExecutor::new(store.clone()));
        let err = registry
            .call_tool("drop_everything", arguments(json!({"collection": "customers"})))
            .await
            .expect_err("unknown tool");
        assert!(matches!(err, QueryError::UnknownTool(name) if name == "drop_everything"));
        assert_eq!(store.finds.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_arguments_are_rejected_without_store_access() {
        let store = Arc::new(CountingStore::default());
        let registry = ToolRegistry::new(QueryExecutor::new(store.clone()));
        for bad in [
            json!({"filter": {}}),
            json!({"collection": "customers", "extra": true}),
            json!({"collection": "customers", "limit": 0}),
        ] {
            let err = registry
                .call_tool(TOOL_NAME, arguments(bad))
                .await
                .expect_err("arguments are invalid");
            assert!(matches!(err, QueryError::SchemaValidation(_)));
        }
        assert_eq!(store.finds.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_calls_are_independent() {
        let store = Arc::new(CountingStore::default());
        let registry = ToolRegistry::new(QueryExecutor::new(store.clone()));
        let mut handles = Vec::new();
        for index in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry
                    .call_tool(
                        TOOL_NAME,
                        arguments(json!({"collection": format!("c{index}"), "limit": index + 1})),
                    )
                    .await
            }));
        }
        for handle in handles {
            let result = handle.await.expect("task joins").expect("call succeeds");
            assert_eq!(result.count, 0);
        }
        assert_eq!(store.finds.load(Ordering::SeqCst), 16);
    }
}
