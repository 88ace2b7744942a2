use askdb_core::SurrealDocumentStore;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::config::AskDbConfig;

/// Opens the configured store and selects its namespace and database.
pub async fn connect_store(
    config: &AskDbConfig,
) -> Result<SurrealDocumentStore<Any>, surrealdb::Error> {
    let db = any::connect(config.db_uri.as_str()).await?;

    if let Some(credentials) = config.db_credentials.as_ref() {
        db.signin(Root {
            username: credentials.username.as_str(),
            password: credentials.password.as_str(),
        })
        .await?;
    }

    db.use_ns(&config.db_namespace)
        .use_db(&config.db_name)
        .await?;

    info!(
        uri = %config.db_uri,
        namespace = %config.db_namespace,
        database = %config.db_name,
        "document store connected"
    );
    Ok(SurrealDocumentStore::new(db))
}
