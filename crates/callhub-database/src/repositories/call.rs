//! Call repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;

use callhub_core::error::{AppError, ErrorKind};
use callhub_core::result::AppResult;
use callhub_core::types::{CallId, ConversationId};
use callhub_entity::call::{Call, CallRecord};

use crate::traits::CallStore;

const COLUMNS: &str = "id, conversation_id, caller_id, participant_ids, accepted_by, media_kind, \
     status, is_group, started_at, ended_at, duration_seconds, rejected_by, missed_by, created_at";

/// Repository for the `calls` table.
#[derive(Debug, Clone)]
pub struct CallRepository {
    pool: PgPool,
}

impl CallRepository {
    /// Create a new call repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CallStore for CallRepository {
    async fn create(&self, call: &Call) -> AppResult<Call> {
        let row = CallRecord::from(call);
        let saved = sqlx::query_as::<_, CallRecord>(&format!(
            "INSERT INTO calls ({COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             RETURNING {COLUMNS}"
        ))
        .bind(row.id)
        .bind(row.conversation_id)
        .bind(row.caller_id)
        .bind(&row.participant_ids)
        .bind(&row.accepted_by)
        .bind(&row.media_kind)
        .bind(&row.status)
        .bind(row.is_group)
        .bind(row.started_at)
        .bind(row.ended_at)
        .bind(row.duration_seconds)
        .bind(&row.rejected_by)
        .bind(&row.missed_by)
        .bind(row.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to create call", e))?;

        Call::try_from(saved)
    }

    async fn find_by_id(&self, id: CallId) -> AppResult<Option<Call>> {
        sqlx::query_as::<_, CallRecord>(&format!("SELECT {COLUMNS} FROM calls WHERE id = $1"))
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find call", e))?
            .map(Call::try_from)
            .transpose()
    }

    async fn update(&self, call: &Call) -> AppResult<()> {
        let row = CallRecord::from(call);
        let result = sqlx::query(
            "UPDATE calls SET accepted_by = $2, status = $3, started_at = $4, ended_at = $5, \
             duration_seconds = $6, rejected_by = $7, missed_by = $8, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(row.id)
        .bind(&row.accepted_by)
        .bind(&row.status)
        .bind(row.started_at)
        .bind(row.ended_at)
        .bind(row.duration_seconds)
        .bind(&row.rejected_by)
        .bind(&row.missed_by)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to update call", e))?;

        if result.rows_affected() == 0 {
            return Err(AppError::call_not_found(call.id));
        }
        Ok(())
    }

    async fn find_by_conversation(
        &self,
        conversation_id: ConversationId,
        limit: u32,
    ) -> AppResult<Vec<Call>> {
        let rows = sqlx::query_as::<_, CallRecord>(&format!(
            "SELECT {COLUMNS} FROM calls WHERE conversation_id = $1 \
             ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(conversation_id.into_uuid())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list calls", e))?;

        rows.into_iter().map(Call::try_from).collect()
    }
}
