//! In-process presence registry.

use async_trait::async_trait;
use dashmap::DashMap;

use callhub_core::types::{ConnectionId, UserId};

use super::PresenceRegistry;

/// Presence registry held in a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryPresence {
    entries: DashMap<UserId, ConnectionId>,
}

impl InMemoryPresence {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PresenceRegistry for InMemoryPresence {
    async fn register(&self, user_id: UserId, connection_id: ConnectionId) -> Option<ConnectionId> {
        self.entries.insert(user_id, connection_id)
    }

    async fn lookup(&self, user_id: UserId) -> Option<ConnectionId> {
        self.entries.get(&user_id).map(|entry| *entry.value())
    }

    async fn unregister(&self, user_id: UserId, connection_id: ConnectionId) -> bool {
        self.entries
            .remove_if(&user_id, |_, current| *current == connection_id)
            .is_some()
    }

    async fn online_users(&self) -> Vec<UserId> {
        self.entries.iter().map(|entry| *entry.key()).collect()
    }
}
