//! Events collected while a call is locked and delivered after commit.

use callhub_core::protocol::ServerEvent;
use callhub_core::types::UserId;

use crate::connection::ConnectionManager;

/// Ordered list of `(recipient, event)` pairs.
#[derive(Debug, Default)]
pub struct Outbox {
    items: Vec<(UserId, ServerEvent)>,
}

impl Outbox {
    /// Empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one event for one user.
    pub fn push(&mut self, user_id: UserId, event: ServerEvent) {
        self.items.push((user_id, event));
    }

    /// Queue the same event for several users.
    pub fn push_all(&mut self, users: impl IntoIterator<Item = UserId>, event: &ServerEvent) {
        for user_id in users {
            self.items.push((user_id, event.clone()));
        }
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Route every event through presence. Offline recipients are skipped.
    pub async fn deliver(self, connections: &ConnectionManager) {
        for (user_id, event) in self.items {
            connections.send_to_user(user_id, event).await;
        }
    }
}
