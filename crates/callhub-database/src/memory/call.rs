//! In-memory call store.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use callhub_core::error::AppError;
use callhub_core::result::AppResult;
use callhub_core::types::{CallId, ConversationId};
use callhub_entity::call::Call;

use crate::traits::CallStore;

/// Call store backed by a concurrent map.
#[derive(Debug, Clone, Default)]
pub struct MemoryCallStore {
    calls: Arc<DashMap<CallId, Call>>,
}

impl MemoryCallStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored calls.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Whether no call was ever created.
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

#[async_trait]
impl CallStore for MemoryCallStore {
    async fn create(&self, call: &Call) -> AppResult<Call> {
        if self.calls.contains_key(&call.id) {
            return Err(AppError::validation(format!("Call {} already exists", call.id)));
        }
        self.calls.insert(call.id, call.clone());
        Ok(call.clone())
    }

    async fn find_by_id(&self, id: CallId) -> AppResult<Option<Call>> {
        Ok(self.calls.get(&id).map(|entry| entry.value().clone()))
    }

    async fn update(&self, call: &Call) -> AppResult<()> {
        match self.calls.get_mut(&call.id) {
            Some(mut entry) => {
                *entry = call.clone();
                Ok(())
            }
            None => Err(AppError::call_not_found(call.id)),
        }
    }

    async fn find_by_conversation(
        &self,
        conversation_id: ConversationId,
        limit: u32,
    ) -> AppResult<Vec<Call>> {
        let mut calls: Vec<Call> = self
            .calls
            .iter()
            .filter(|entry| entry.conversation_id == conversation_id)
            .map(|entry| entry.value().clone())
            .collect();
        calls.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        calls.truncate(limit as usize);
        Ok(calls)
    }
}
