//! The call aggregate and its lifecycle rules.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use callhub_core::error::AppError;
use callhub_core::protocol::CallView;
use callhub_core::result::AppResult;
use callhub_core::types::{CallId, CallStatus, ConversationId, MediaKind, UserId};

/// Data required to create a new call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCall {
    /// Conversation the call belongs to.
    pub conversation_id: ConversationId,
    /// User placing the call.
    pub caller_id: UserId,
    /// Invited users. The caller is removed and duplicates collapsed.
    pub participant_ids: Vec<UserId>,
    /// Audio or video.
    pub media_kind: MediaKind,
    /// Group call flag.
    pub is_group: bool,
}

/// One call between a caller and one or more participants.
///
/// Status only moves along [`CallStatus::can_transition_to`]. The
/// duration is written once, when the call reaches a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    /// Unique call identifier.
    pub id: CallId,
    /// Conversation the call belongs to.
    pub conversation_id: ConversationId,
    /// User who placed the call.
    pub caller_id: UserId,
    /// Invited users, caller excluded.
    pub participant_ids: Vec<UserId>,
    /// Participants who answered.
    pub accepted_by: BTreeSet<UserId>,
    /// Audio or video.
    pub media_kind: MediaKind,
    /// Current lifecycle status.
    pub status: CallStatus,
    /// Group call flag.
    pub is_group: bool,
    /// Stamped by the first acceptance.
    pub started_at: Option<DateTime<Utc>>,
    /// Stamped when the call terminates.
    pub ended_at: Option<DateTime<Utc>>,
    /// Whole seconds between `started_at` and `ended_at`, `0` if never answered.
    pub duration_seconds: Option<i64>,
    /// Participants who declined.
    pub rejected_by: BTreeSet<UserId>,
    /// Participants who were never reached or never answered.
    pub missed_by: BTreeSet<UserId>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl Call {
    /// Build a `pending` call from creation data.
    pub fn new(id: CallId, data: NewCall, now: DateTime<Utc>) -> Self {
        let mut seen = BTreeSet::new();
        let participant_ids = data
            .participant_ids
            .into_iter()
            .filter(|p| *p != data.caller_id && seen.insert(*p))
            .collect();

        Self {
            id,
            conversation_id: data.conversation_id,
            caller_id: data.caller_id,
            participant_ids,
            accepted_by: BTreeSet::new(),
            media_kind: data.media_kind,
            status: CallStatus::Pending,
            is_group: data.is_group,
            started_at: None,
            ended_at: None,
            duration_seconds: None,
            rejected_by: BTreeSet::new(),
            missed_by: BTreeSet::new(),
            created_at: now,
        }
    }

    /// Move to `next`, refusing illegal transitions.
    pub fn transition(&mut self, next: CallStatus) -> AppResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::invalid_transition(format!(
                "Call {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    /// Whether `user_id` was invited.
    pub fn is_participant(&self, user_id: UserId) -> bool {
        self.participant_ids.contains(&user_id)
    }

    /// Whether `user_id` is the caller or an invited participant.
    pub fn is_party(&self, user_id: UserId) -> bool {
        self.caller_id == user_id || self.is_participant(user_id)
    }

    /// Caller followed by every participant.
    pub fn parties(&self) -> Vec<UserId> {
        std::iter::once(self.caller_id)
            .chain(self.participant_ids.iter().copied())
            .collect()
    }

    /// Caller followed by every participant who answered.
    pub fn joined_parties(&self) -> Vec<UserId> {
        std::iter::once(self.caller_id)
            .chain(self.accepted_by.iter().copied())
            .collect()
    }

    /// Participants who neither answered nor declined.
    pub fn unanswered(&self) -> Vec<UserId> {
        self.participant_ids
            .iter()
            .copied()
            .filter(|p| !self.accepted_by.contains(p) && !self.rejected_by.contains(p))
            .collect()
    }

    /// Record a participant that could not be reached.
    pub fn mark_missed(&mut self, user_id: UserId) {
        if self.is_participant(user_id) {
            self.missed_by.insert(user_id);
        }
    }

    /// Record an answer.
    ///
    /// Returns `true` for the first acceptance, which moves the call to
    /// `ongoing` and stamps `started_at`. Later acceptances only join.
    pub fn record_acceptance(&mut self, user_id: UserId, now: DateTime<Utc>) -> AppResult<bool> {
        if !self.is_participant(user_id) {
            return Err(AppError::not_participant(user_id, self.id));
        }
        if self.status.is_terminal() {
            return Err(AppError::invalid_transition(format!(
                "Call {} is already {}",
                self.id, self.status
            )));
        }
        if self.rejected_by.contains(&user_id) {
            return Err(AppError::invalid_transition(format!(
                "User {user_id} already declined call {}",
                self.id
            )));
        }

        self.accepted_by.insert(user_id);
        self.missed_by.remove(&user_id);

        if self.status == CallStatus::Ongoing {
            return Ok(false);
        }
        self.transition(CallStatus::Ongoing)?;
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        Ok(true)
    }

    /// Record a decline.
    pub fn record_rejection(&mut self, user_id: UserId) -> AppResult<()> {
        if !self.is_participant(user_id) {
            return Err(AppError::not_participant(user_id, self.id));
        }
        self.rejected_by.insert(user_id);
        Ok(())
    }

    /// Every participant either declined or was never reached.
    pub fn all_declined(&self) -> bool {
        self.participant_ids
            .iter()
            .all(|p| self.rejected_by.contains(p) || self.missed_by.contains(p))
    }

    /// Terminate the call with `status`, stamping `ended_at` and the duration.
    ///
    /// Returns the duration in whole seconds.
    pub fn finish(&mut self, status: CallStatus, now: DateTime<Utc>) -> AppResult<i64> {
        if !status.is_terminal() {
            return Err(AppError::invalid_transition(format!(
                "{status} is not a terminal status"
            )));
        }
        self.transition(status)?;
        self.ended_at = Some(now);
        let duration = self
            .started_at
            .map(|started| (now - started).num_seconds().max(0))
            .unwrap_or(0);
        self.duration_seconds = Some(duration);
        Ok(duration)
    }
}

impl From<&Call> for CallView {
    fn from(call: &Call) -> Self {
        Self {
            id: call.id,
            conversation_id: call.conversation_id,
            caller_id: call.caller_id,
            participant_ids: call.participant_ids.clone(),
            accepted_by: call.accepted_by.iter().copied().collect(),
            media_kind: call.media_kind,
            status: call.status,
            is_group: call.is_group,
            started_at: call.started_at,
            ended_at: call.ended_at,
            duration_seconds: call.duration_seconds,
            rejected_by: call.rejected_by.iter().copied().collect(),
            missed_by: call.missed_by.iter().copied().collect(),
            created_at: call.created_at,
        }
    }
}
