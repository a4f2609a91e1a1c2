//! In-memory call-history sink.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use callhub_core::protocol::CallSummary;
use callhub_core::result::AppResult;
use callhub_core::types::ConversationId;

use crate::traits::CallHistorySink;

/// Keeps appended entries per conversation, oldest first.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistorySink {
    entries: Arc<DashMap<ConversationId, Vec<CallSummary>>>,
}

impl MemoryHistorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries appended to a conversation.
    pub fn entries(&self, conversation_id: ConversationId) -> Vec<CallSummary> {
        self.entries
            .get(&conversation_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CallHistorySink for MemoryHistorySink {
    async fn append(&self, entry: &CallSummary) -> AppResult<()> {
        self.entries
            .entry(entry.conversation_id)
            .or_default()
            .push(entry.clone());
        Ok(())
    }
}
