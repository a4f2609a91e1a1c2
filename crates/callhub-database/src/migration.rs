//! Schema migrations for the call store.

use tracing::info;

use callhub_core::error::{AppError, ErrorKind};

use crate::connection::DatabasePool;

/// Apply every pending migration under `migrations/`.
pub async fn run_migrations(db: &DatabasePool) -> Result<(), AppError> {
    sqlx::migrate!("../../migrations")
        .run(db.pool())
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, format!("Migration failed: {e}"), e)
        })?;

    info!("Call store schema is up to date");
    Ok(())
}
