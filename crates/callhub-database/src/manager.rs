//! Store manager that dispatches to the configured provider.

use std::sync::Arc;

use tracing::info;

use callhub_core::config::DatabaseConfig;
use callhub_core::error::AppError;
use callhub_core::result::AppResult;

use crate::connection::DatabasePool;
use crate::memory::{MemoryCallStore, MemoryDirectory, MemoryHistorySink};
use crate::migration::run_migrations;
use crate::repositories::{CallRepository, DirectoryRepository, MessageRepository};
use crate::traits::{CallHistorySink, CallStore, Directory};

/// The three collaborators, selected together from configuration.
#[derive(Debug, Clone)]
pub struct StoreManager {
    calls: Arc<dyn CallStore>,
    history: Arc<dyn CallHistorySink>,
    directory: Arc<dyn Directory>,
    pool: Option<DatabasePool>,
}

impl StoreManager {
    /// Build the collaborators named by `database.provider`.
    pub async fn new(config: &DatabaseConfig) -> AppResult<Self> {
        match config.provider.as_str() {
            "postgres" => {
                info!("Initializing PostgreSQL call store");
                let db = DatabasePool::connect(config).await?;
                run_migrations(&db).await?;
                let pool = db.pool().clone();
                Ok(Self {
                    calls: Arc::new(CallRepository::new(pool.clone())),
                    history: Arc::new(MessageRepository::new(pool.clone())),
                    directory: Arc::new(DirectoryRepository::new(pool)),
                    pool: Some(db),
                })
            }
            "memory" => {
                info!("Initializing in-memory call store");
                Ok(Self::memory())
            }
            other => Err(AppError::configuration(format!(
                "Unknown database provider: '{other}'. Supported: postgres, memory"
            ))),
        }
    }

    /// Fresh in-memory collaborators.
    pub fn memory() -> Self {
        Self::from_parts(
            Arc::new(MemoryCallStore::new()),
            Arc::new(MemoryHistorySink::new()),
            Arc::new(MemoryDirectory::new()),
        )
    }

    /// Assemble from existing collaborators (for testing).
    pub fn from_parts(
        calls: Arc<dyn CallStore>,
        history: Arc<dyn CallHistorySink>,
        directory: Arc<dyn Directory>,
    ) -> Self {
        Self {
            calls,
            history,
            directory,
            pool: None,
        }
    }

    /// Call record store.
    pub fn calls(&self) -> Arc<dyn CallStore> {
        Arc::clone(&self.calls)
    }

    /// History sink.
    pub fn history(&self) -> Arc<dyn CallHistorySink> {
        Arc::clone(&self.history)
    }

    /// Directory.
    pub fn directory(&self) -> Arc<dyn Directory> {
        Arc::clone(&self.directory)
    }

    /// Whether the backing store answers. Always true in memory.
    pub async fn health_check(&self) -> AppResult<bool> {
        match &self.pool {
            Some(db) => db.health_check().await,
            None => Ok(true),
        }
    }

    /// Release pooled connections.
    pub async fn close(&self) {
        if let Some(db) = &self.pool {
            db.close().await;
        }
    }
}
