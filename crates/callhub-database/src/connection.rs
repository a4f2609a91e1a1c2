//! PostgreSQL connection pool management.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use callhub_core::config::DatabaseConfig;
use callhub_core::error::{AppError, ErrorKind};

/// Shared PostgreSQL pool backing the call repositories.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// Open the pool described by `config`.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        if config.url.trim().is_empty() {
            return Err(AppError::configuration(
                "database.url is required when database.provider = \"postgres\"",
            ));
        }

        info!(
            url = %mask_password(&config.url),
            max_connections = config.max_connections,
            "Opening call store pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Failed to connect to call store: {e}"),
                    e,
                )
            })?;

        Ok(Self { pool })
    }

    /// Borrow the sqlx pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trip a trivial query.
    pub async fn health_check(&self) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|v| v == 1)
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Health check failed", e))
    }

    /// Close all connections.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Call store pool closed");
    }
}

/// Hide the password of a connection URL for logging.
fn mask_password(url: &str) -> String {
    let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
    let Some(at) = url.rfind('@') else {
        return url.to_string();
    };
    match url[scheme_end..at].find(':') {
        Some(colon) => format!("{}:****{}", &url[..scheme_end + colon], &url[at..]),
        None => url.to_string(),
    }
}
