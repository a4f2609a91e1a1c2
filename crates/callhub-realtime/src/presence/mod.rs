//! Presence registry: which connection currently speaks for each user.
//!
//! One live entry per user, last registration wins. The registry is a
//! trait so a multi-instance deployment can back it with a shared store;
//! the in-memory implementation assumes a single signaling server.

pub mod memory;

use async_trait::async_trait;

use callhub_core::types::{ConnectionId, UserId};

pub use memory::InMemoryPresence;

/// Maps users to their single live connection.
#[async_trait]
pub trait PresenceRegistry: Send + Sync + std::fmt::Debug + 'static {
    /// Bind `user_id` to `connection_id`, replacing any previous entry.
    ///
    /// Returns the replaced connection, if any.
    async fn register(&self, user_id: UserId, connection_id: ConnectionId) -> Option<ConnectionId>;

    /// Current connection of `user_id`.
    async fn lookup(&self, user_id: UserId) -> Option<ConnectionId>;

    /// Remove the entry only if it still points at `connection_id`.
    ///
    /// Returns `true` if an entry was removed.
    async fn unregister(&self, user_id: UserId, connection_id: ConnectionId) -> bool;

    /// Every user with a live entry.
    async fn online_users(&self) -> Vec<UserId>;
}
