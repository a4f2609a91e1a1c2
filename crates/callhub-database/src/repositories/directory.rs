//! Conversation and user lookups.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use callhub_core::error::{AppError, ErrorKind};
use callhub_core::protocol::CallerProfile;
use callhub_core::result::AppResult;
use callhub_core::types::{ConversationId, UserId};

use crate::traits::Directory;

/// Reads display metadata from the chat service's tables.
#[derive(Debug, Clone)]
pub struct DirectoryRepository {
    pool: PgPool,
}

impl DirectoryRepository {
    /// Create a new directory repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Directory for DirectoryRepository {
    async fn conversation_name(
        &self,
        conversation_id: ConversationId,
    ) -> AppResult<Option<String>> {
        let name: Option<Option<String>> = sqlx::query_scalar(
            "SELECT name FROM conversations WHERE id = $1 AND is_group",
        )
        .bind(conversation_id.into_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to look up conversation", e)
        })?;
        Ok(name.flatten())
    }

    async fn user_profile(&self, user_id: UserId) -> AppResult<Option<CallerProfile>> {
        let row: Option<(Uuid, Option<String>, Option<String>)> =
            sqlx::query_as("SELECT id, display_name, avatar_url FROM users WHERE id = $1")
                .bind(user_id.into_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to look up user", e)
                })?;

        Ok(row.map(|(id, display_name, avatar_url)| CallerProfile {
            user_id: UserId::from_uuid(id),
            display_name,
            avatar_url,
        }))
    }
}
