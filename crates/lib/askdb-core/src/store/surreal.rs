use std::sync::Arc;

use askdb_store::{Document, QuerySpec};
use async_trait::async_trait;
use serde_json::Value;
use surrealdb::error::Api;
use surrealdb::{Connection, Surreal};
use tracing::debug;

use super::{DocumentStore, StoreError, StoreResult, compile_select};

impl From<surrealdb::Error> for StoreError {
    fn from(err: surrealdb::Error) -> Self {
        // Only connection and transport failures mean the store is out of
        // reach. Statement and decoding failures surface from remote engines as
        // `Api` errors too, and stay query errors.
        match &err {
            surrealdb::Error::Api(
                Api::Http(_)
                | Api::Ws(_)
                | Api::Scheme(_)
                | Api::InvalidUrl(_)
                | Api::ConnectionUninitialised,
            ) => Self::Unavailable(err.to_string()),
            _ => Self::Query(err.to_string()),
        }
    }
}

/// `SurrealDB`-backed document store.
///
/// Collections map to tables. The handle is shared, so clones are cheap and
/// safe to use from concurrent tasks.
pub struct SurrealDocumentStore<C: Connection> {
    db: Arc<Surreal<C>>,
}

impl<C: Connection> Clone for SurrealDocumentStore<C> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> SurrealDocumentStore<C> {
    #[must_use]
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            db: Arc::new(db),
        }
    }

    #[must_use]
    pub const fn from_arc(db: Arc<Surreal<C>>) -> Self {
        Self { db }
    }

    #[must_use]
    pub fn db(&self) -> &Surreal<C> {
        &self.db
    }

    /// Lists the tables defined in the selected database.
    ///
    /// # Errors
    /// Returns `StoreError` if the database query fails.
    pub async fn list_collections(&self) -> StoreResult<Vec<String>> {
        let mut response = self.db.query("INFO FOR DB;").await?;
        let info: Option<Value> = response.take(0)?;
        let mut tables: Vec<String> = info
            .as_ref()
            .and_then(|info| info.get("tables"))
            .and_then(Value::as_object)
            .map(|tables| tables.keys().cloned().collect())
            .unwrap_or_default();
        tables.sort();
        Ok(tables)
    }

    /// Inserts documents into a collection.
    ///
    /// Only used to seed sample data; the query path never writes.
    ///
    /// # Errors
    /// Returns `StoreError` if validation fails or the database write fails.
    pub async fn insert_documents(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> StoreResult<usize> {
        ensure_non_empty(collection, "collection")?;
        let count = documents.len();
        for document in documents {
            self.db
                .query("CREATE type::table($collection) CONTENT $document RETURN NONE;")
                .bind(("collection", collection.to_string()))
                .bind(("document", Value::Object(document)))
                .await?
                .check()?;
        }
        Ok(count)
    }

    /// Removes every document from a collection.
    ///
    /// # Errors
    /// Returns `StoreError` if validation fails or the database write fails.
    pub async fn clear_collection(&self, collection: &str) -> StoreResult<()> {
        ensure_non_empty(collection, "collection")?;
        self.db
            .query("DELETE type::table($collection) RETURN NONE;")
            .bind(("collection", collection.to_string()))
            .await?
            .check()?;
        Ok(())
    }
}

#[async_trait]
impl<C: Connection> DocumentStore for SurrealDocumentStore<C> {
    async fn find(&self, spec: &QuerySpec) -> StoreResult<Vec<Document>> {
        let compiled = compile_select(spec)?;
        debug!(collection = %spec.collection, statement = %compiled.text, "running select");
        let mut query = self.db.query(compiled.text);
        for binding in compiled.bindings {
            query = query.bind(binding);
        }
        let mut response = query.await?;
        let rows: Vec<Value> = response.take(0)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(document) => Some(document),
                _ => None,
            })
            .collect())
    }

    async fn collection_exists(&self, collection: &str) -> StoreResult<bool> {
        let tables = self.list_collections().await?;
        Ok(tables.iter().any(|table| table == collection))
    }
}

fn ensure_non_empty(value: &str, field: &str) -> StoreResult<()> {
    if value.trim().is_empty() {
        return Err(StoreError::InvalidInput(format!("{field} is required")));
    }
    Ok(())
}
