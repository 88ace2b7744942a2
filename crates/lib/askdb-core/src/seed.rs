//! Sample data for local runs and tests.

use askdb_store::Document;
use serde_json::{Value, json};
use surrealdb::Connection;
use tracing::info;

use crate::store::{StoreResult, SurrealDocumentStore};

pub const SAMPLE_COLLECTION: &str = "customers";

/// The sample `customers` documents.
#[must_use]
pub fn sample_customers() -> Vec<Document> {
    [
        json!({"name": "Alice", "city": "London", "age": 30}),
        json!({"name": "Bob", "city": "Paris", "age": 25}),
        json!({"name": "Charlie", "city": "London", "age": 35}),
        json!({"name": "Diana", "city": "Berlin", "age": 28}),
    ]
    .into_iter()
    .filter_map(|value| match value {
        Value::Object(document) => Some(document),
        _ => None,
    })
    .collect()
}

/// Replaces the sample collection's contents with [`sample_customers`].
///
/// # Errors
/// Returns `StoreError` if any write fails.
pub async fn seed_sample_customers<C: Connection>(
    store: &SurrealDocumentStore<C>,
) -> StoreResult<usize> {
    store.clear_collection(SAMPLE_COLLECTION).await?;
    let inserted = store
        .insert_documents(SAMPLE_COLLECTION, sample_customers())
        .await?;
    info!(collection = SAMPLE_COLLECTION, inserted, "seeded sample data");
    Ok(inserted)
}
