//! Read-only call projections carried inside events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CallId, CallStatus, ConversationId, MediaKind, UserId};

/// Snapshot of a call as clients see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallView {
    pub id: CallId,
    pub conversation_id: ConversationId,
    pub caller_id: UserId,
    pub participant_ids: Vec<UserId>,
    pub accepted_by: Vec<UserId>,
    pub media_kind: MediaKind,
    pub status: CallStatus,
    pub is_group: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub rejected_by: Vec<UserId>,
    pub missed_by: Vec<UserId>,
    pub created_at: DateTime<Utc>,
}

impl CallView {
    /// Everyone on the call: the caller followed by the participants.
    pub fn parties(&self) -> Vec<UserId> {
        std::iter::once(self.caller_id)
            .chain(self.participant_ids.iter().copied())
            .collect()
    }
}

/// Identity of the caller shown on the ringing screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerProfile {
    pub user_id: UserId,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl CallerProfile {
    /// Profile carrying only the identifier.
    pub fn anonymous(user_id: UserId) -> Self {
        Self {
            user_id,
            display_name: None,
            avatar_url: None,
        }
    }
}

/// Conversation-history entry synthesized when a call terminates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSummary {
    pub call_id: CallId,
    pub conversation_id: ConversationId,
    pub media_kind: MediaKind,
    pub status: CallStatus,
    pub duration_seconds: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Display text, e.g. `"Video call - Ended (1:05)"`.
    pub text: String,
}
