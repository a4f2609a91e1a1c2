//! Database row representation of a call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use callhub_core::error::AppError;
use callhub_core::types::{CallId, ConversationId, UserId};

use super::model::Call;

/// A row of the `calls` table.
///
/// Membership sets are stored as `UUID[]` columns, enums as text.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CallRecord {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub caller_id: Uuid,
    pub participant_ids: Vec<Uuid>,
    pub accepted_by: Vec<Uuid>,
    pub media_kind: String,
    pub status: String,
    pub is_group: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub rejected_by: Vec<Uuid>,
    pub missed_by: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

fn to_uuids<'a>(ids: impl IntoIterator<Item = &'a UserId>) -> Vec<Uuid> {
    ids.into_iter().map(|id| id.into_uuid()).collect()
}

impl From<&Call> for CallRecord {
    fn from(call: &Call) -> Self {
        Self {
            id: call.id.into_uuid(),
            conversation_id: call.conversation_id.into_uuid(),
            caller_id: call.caller_id.into_uuid(),
            participant_ids: to_uuids(&call.participant_ids),
            accepted_by: to_uuids(&call.accepted_by),
            media_kind: call.media_kind.as_str().to_string(),
            status: call.status.as_str().to_string(),
            is_group: call.is_group,
            started_at: call.started_at,
            ended_at: call.ended_at,
            duration_seconds: call.duration_seconds,
            rejected_by: to_uuids(&call.rejected_by),
            missed_by: to_uuids(&call.missed_by),
            created_at: call.created_at,
        }
    }
}

impl TryFrom<CallRecord> for Call {
    type Error = AppError;

    fn try_from(row: CallRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: CallId::from_uuid(row.id),
            conversation_id: ConversationId::from_uuid(row.conversation_id),
            caller_id: UserId::from_uuid(row.caller_id),
            participant_ids: row.participant_ids.into_iter().map(UserId::from).collect(),
            accepted_by: row.accepted_by.into_iter().map(UserId::from).collect(),
            media_kind: row.media_kind.parse()?,
            status: row.status.parse()?,
            is_group: row.is_group,
            started_at: row.started_at,
            ended_at: row.ended_at,
            duration_seconds: row.duration_seconds,
            rejected_by: row.rejected_by.into_iter().map(UserId::from).collect(),
            missed_by: row.missed_by.into_iter().map(UserId::from).collect(),
            created_at: row.created_at,
        })
    }
}
