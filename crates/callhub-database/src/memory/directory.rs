//! In-memory directory.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use callhub_core::protocol::CallerProfile;
use callhub_core::result::AppResult;
use callhub_core::types::{ConversationId, UserId};

use crate::traits::Directory;

/// Directory whose entries are seeded by the embedding application.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    conversations: Arc<DashMap<ConversationId, String>>,
    users: Arc<DashMap<UserId, CallerProfile>>,
}

impl MemoryDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Name a group conversation.
    pub fn set_conversation_name(&self, conversation_id: ConversationId, name: impl Into<String>) {
        self.conversations.insert(conversation_id, name.into());
    }

    /// Register a user profile.
    pub fn set_user_profile(&self, profile: CallerProfile) {
        self.users.insert(profile.user_id, profile);
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn conversation_name(
        &self,
        conversation_id: ConversationId,
    ) -> AppResult<Option<String>> {
        Ok(self.conversations.get(&conversation_id).map(|n| n.clone()))
    }

    async fn user_profile(&self, user_id: UserId) -> AppResult<Option<CallerProfile>> {
        Ok(self.users.get(&user_id).map(|p| p.clone()))
    }
}
