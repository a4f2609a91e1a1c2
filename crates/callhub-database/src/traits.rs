//! Collaborator interfaces used by the call session manager.

use async_trait::async_trait;

use callhub_core::protocol::{CallSummary, CallerProfile};
use callhub_core::result::AppResult;
use callhub_core::types::{CallId, ConversationId, UserId};
use callhub_entity::call::Call;

/// Durable store for call records.
#[async_trait]
pub trait CallStore: Send + Sync + std::fmt::Debug + 'static {
    /// Persist a new call.
    async fn create(&self, call: &Call) -> AppResult<Call>;

    /// Find a call by ID. Returns `None` if it does not exist.
    async fn find_by_id(&self, id: CallId) -> AppResult<Option<Call>>;

    /// Overwrite a stored call with its new state.
    async fn update(&self, call: &Call) -> AppResult<()>;

    /// Most recent calls of a conversation, newest first.
    async fn find_by_conversation(
        &self,
        conversation_id: ConversationId,
        limit: u32,
    ) -> AppResult<Vec<Call>>;
}

/// One-way sink receiving a history entry for every terminated call.
#[async_trait]
pub trait CallHistorySink: Send + Sync + std::fmt::Debug + 'static {
    /// Append the entry to its conversation.
    async fn append(&self, entry: &CallSummary) -> AppResult<()>;
}

/// Read-only conversation and user metadata.
#[async_trait]
pub trait Directory: Send + Sync + std::fmt::Debug + 'static {
    /// Display name of a group conversation, if it has one.
    async fn conversation_name(&self, conversation_id: ConversationId)
    -> AppResult<Option<String>>;

    /// Public profile of a user, if known.
    async fn user_profile(&self, user_id: UserId) -> AppResult<Option<CallerProfile>>;
}
