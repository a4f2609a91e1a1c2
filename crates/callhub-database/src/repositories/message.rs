//! Conversation message sink for call-history entries.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use callhub_core::error::{AppError, ErrorKind};
use callhub_core::protocol::CallSummary;
use callhub_core::result::AppResult;

use crate::traits::CallHistorySink;

/// Appends call summaries to the `messages` table as `kind = 'call'` rows.
#[derive(Debug, Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    /// Create a new message repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CallHistorySink for MessageRepository {
    async fn append(&self, entry: &CallSummary) -> AppResult<()> {
        let metadata = serde_json::to_value(entry)?;
        sqlx::query(
            "INSERT INTO messages (id, conversation_id, kind, content, metadata) \
             VALUES ($1, $2, 'call', $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(entry.conversation_id.into_uuid())
        .bind(&entry.text)
        .bind(metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to append call history", e)
        })?;
        Ok(())
    }
}
