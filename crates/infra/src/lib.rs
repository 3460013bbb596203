//! Infrastructure layer: configuration, storage backends, and the application
//! services that tie the pure domain crates to them.

pub mod config;
pub mod services;
pub mod storage;

pub use config::{ConfigError, Settings};
pub use services::Services;
pub use storage::{InMemoryLedgerStore, PostgresLedgerStore, Storage};

use std::sync::Arc;

use paybook_core::DomainResult;

/// Pick the backend named by the settings: Postgres when `DATABASE_URL` is set,
/// otherwise the in-memory store.
pub async fn connect_storage(settings: &Settings) -> DomainResult<Arc<dyn Storage>> {
    match &settings.database_url {
        Some(url) => Ok(Arc::new(PostgresLedgerStore::connect(url).await?)),
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store");
            Ok(Arc::new(InMemoryLedgerStore::new()))
        }
    }
}
