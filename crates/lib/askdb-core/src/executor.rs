use std::sync::Arc;

use askdb_store::{QueryResult, QuerySpec};
use tracing::{debug, warn};

use crate::error::QueryError;
use crate::projection;
use crate::store::DocumentStore;

/// Policy knobs for the query executor.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutorConfig {
    /// Fail with `CollectionNotFound` instead of returning an empty result
    /// when the collection is not defined in the store.
    pub strict_collections: bool,
}

impl ExecutorConfig {
    #[must_use]
    pub const fn with_strict_collections(mut self, strict_collections: bool) -> Self {
        self.strict_collections = strict_collections;
        self
    }
}

/// Runs bounded, read-only queries against a document store.
#[derive(Clone)]
pub struct QueryExecutor {
    store: Arc<dyn DocumentStore>,
    config: ExecutorConfig,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_config(store, ExecutorConfig::default())
    }

    pub fn with_config(store: Arc<dyn DocumentStore>, config: ExecutorConfig) -> Self {
        Self { store, config }
    }

    #[must_use]
    pub const fn config(&self) -> ExecutorConfig {
        self.config
    }

    /// Executes a query spec.
    ///
    /// The spec is validated again before any store access. The result never
    /// holds more than `spec.limit` documents.
    ///
    /// # Errors
    /// Returns `QueryError::SchemaValidation` for an invalid spec,
    /// `QueryError::CollectionNotFound` under strict collections, and the
    /// store's failure otherwise. Store failures are not retried.
    pub async fn execute(&self, spec: QuerySpec) -> Result<QueryResult, QueryError> {
        spec.validate()?;

        if self.config.strict_collections
            && !self.store.collection_exists(&spec.collection).await?
        {
            return Err(QueryError::CollectionNotFound(spec.collection));
        }

        let mut documents = self.store.find(&spec).await.inspect_err(|err| {
            warn!(collection = %spec.collection, "store read failed: {err}");
        })?;
        documents.truncate(spec.limit);

        if let Some(projection) = &spec.projection {
            documents = documents
                .into_iter()
                .map(|document| projection::apply(projection, document))
                .collect();
        }

        debug!(collection = %spec.collection, count = documents.len(), "query executed");
        Ok(QueryResult::new(documents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use askdb_store::Document;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    use crate::store::{StoreError, StoreResult};

    /// Returns a fixed set of documents, ignoring limit, and counts reads.
    struct FixedStore {
        documents: Vec<Document>,
        tables: Vec<String>,
        finds: AtomicUsize,
        last_spec: Mutex<Option<QuerySpec>>,
    }

    impl FixedStore {
        fn new(count: usize) -> Self {
            let documents = (0..count)
                .map(|index| {
                    let mut doc = Document::new();
                    doc.insert("id".to_string(), json!(format!("c{index}")));
                    doc.insert("name".to_string(), json!(format!("name-{index}")));
                    doc.insert("age".to_string(), json!(20 + index));
                    doc
                })
                .collect();
            Self {
                documents,
                tables: vec!["customers".to_string()],
                finds: AtomicUsize::new(0),
                last_spec: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl DocumentStore for FixedStore {
        async fn find(&self, spec: &QuerySpec) -> StoreResult<Vec<Document>> {
            self.finds.fetch_add(1, Ordering::SeqCst);
            *self.last_spec.lock().expect("lock") = Some(spec.clone());
            Ok(self.documents.clone())
        }

        async fn collection_exists(&self, collection: &str) -> StoreResult<bool> {
            Ok(self.tables.iter().any(|table| table == collection))
        }
    }

    struct DownStore;

    #[async_trait]
    impl DocumentStore for DownStore {
        async fn find(&self, _spec: &QuerySpec) -> StoreResult<Vec<Document>> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }

        async fn collection_exists(&self, _collection: &str) -> StoreResult<bool> {
            Err(StoreError::Unavailable("connection refused".to_string()))
        }
    }

    fn spec(value: Value) -> QuerySpec {
        let Value::Object(arguments) = value else {
            panic!("expected object");
        };
        QuerySpec::from_arguments(arguments).expect("valid spec")
    }

    #[tokio::test]
    async fn never_returns_more_than_limit() {
        let store = Arc::new(FixedStore::new(20));
        let executor = QueryExecutor::new(store);
        for limit in [1_usize, 5, 19, 20, 50] {
            let result = executor
                .execute(spec(json!({"collection": "customers", "limit": limit})))
                .await
                .expect("query runs");
            assert!(result.count <= limit);
            assert_eq!(result.count, result.documents.len());
            assert_eq!(result.count, limit.min(20));
        }
    }

    #[tokio::test]
    async fn rejects_invalid_spec_before_store_access() {
        let store = Arc::new(FixedStore::new(3));
        let executor = QueryExecutor::new(store.clone());
        let mut invalid = spec(json!({"collection": "customers"}));
        invalid.limit = 10_000;

        let err = executor.execute(invalid).await.expect_err("limit is rejected");
        assert!(matches!(err, QueryError::SchemaValidation(_)));

        let mut invalid = spec(json!({"collection": "customers"}));
        invalid.filter.insert("$where".to_string(), json!("1 == 1"));
        let err = executor.execute(invalid).await.expect_err("operator is rejected");
        assert!(matches!(err, QueryError::SchemaValidation(_)));

        assert_eq!(store.finds.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn applies_projection_after_read() {
        let store = Arc::new(FixedStore::new(2));
        let executor = QueryExecutor::new(store);
        let result = executor
            .execute(spec(json!({"collection": "customers", "projection": {"name": 1}})))
            .await
            .expect("query runs");
        for document in &result.documents {
            assert!(document.contains_key("id"));
            assert!(document.contains_key("name"));
            assert!(!document.contains_key("age"));
        }
    }

    #[tokio::test]
    async fn strict_collections_report_missing_collection() {
        let store = Arc::new(FixedStore::new(2));
        let lenient = QueryExecutor::new(store.clone());
        let result = lenient
            .execute(spec(json!({"collection": "customers"})))
            .await
            .expect("known collection");
        assert_eq!(result.count, 2);

        let strict = QueryExecutor::with_config(
            store.clone(),
            ExecutorConfig::default().with_strict_collections(true),
        );
        let err = strict
            .execute(spec(json!({"collection": "invoices"})))
            .await
            .expect_err("unknown collection");
        assert!(matches!(err, QueryError::CollectionNotFound(name) if name == "invoices"));
        assert_eq!(store.finds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn propagates_store_unavailable() {
        let executor = QueryExecutor::new(Arc::new(DownStore));
        let err = executor
            .execute(spec(json!({"collection": "customers"})))
            .await
            .expect_err("store is down");
        assert!(matches!(err, QueryError::StoreUnavailable(_)));
    }

    #[tokio::test]
    async fn passes_spec_to_store_unchanged() {
        let store = Arc::new(FixedStore::new(1));
        let executor = QueryExecutor::new(store.clone());
        let query = spec(json!({
            "collection": "customers",
            "filter": {"city": "London"},
            "sort": [{"field": "age", "direction": "desc"}],
            "limit": 7
        }));
        executor.execute(query.clone()).await.expect("query runs");
        let seen = store.last_spec.lock().expect("lock").clone();
        assert_eq!(seen, Some(query));
    }
}
