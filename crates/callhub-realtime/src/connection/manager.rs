//! Connection manager: connection lifecycle, presence side effects, routing.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use callhub_core::config::realtime::RealtimeConfig;
use callhub_core::protocol::ServerEvent;
use callhub_core::types::{ConnectionId, UserId};

use crate::presence::PresenceRegistry;

use super::handle::ConnectionHandle;
use super::pool::ConnectionPool;

/// Manages all active WebSocket connections and routes events to users.
#[derive(Debug)]
pub struct ConnectionManager {
    pool: ConnectionPool,
    presence: Arc<dyn PresenceRegistry>,
    config: RealtimeConfig,
}

impl ConnectionManager {
    /// Creates a new connection manager.
    pub fn new(config: RealtimeConfig, presence: Arc<dyn PresenceRegistry>) -> Self {
        Self {
            pool: ConnectionPool::new(),
            presence,
            config,
        }
    }

    /// Registers a connection for an authenticated user.
    ///
    /// The user becomes reachable through this connection, replacing any
    /// previous one. Every other connection is told the user is online and
    /// the newcomer receives one `presence-changed` per user already online.
    pub async fn register(
        &self,
        user_id: UserId,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(self.config.channel_buffer_size);
        let handle = Arc::new(ConnectionHandle::new(user_id, tx));

        self.pool.add(handle.clone());
        if let Some(previous) = self.presence.register(user_id, handle.id).await {
            debug!(
                user_id = %user_id,
                previous = %previous,
                "Presence replaced by newer connection"
            );
        }

        self.broadcast_except(
            &ServerEvent::PresenceChanged {
                user_id,
                online: true,
            },
            handle.id,
        );

        for other in self.presence.online_users().await {
            if other != user_id {
                handle.send(ServerEvent::PresenceChanged {
                    user_id: other,
                    online: true,
                });
            }
        }

        info!(conn_id = %handle.id, user_id = %user_id, "Connection registered");
        (handle, rx)
    }

    /// Unregisters a connection.
    ///
    /// Returns the user if this was their live connection, in which case
    /// everyone else is told they went offline. A stale connection closing
    /// after a reconnect returns `None` and changes nothing.
    pub async fn unregister(&self, conn_id: &ConnectionId) -> Option<UserId> {
        let handle = self.pool.remove(conn_id)?;
        handle.mark_dead();

        let was_live = self.presence.unregister(handle.user_id, handle.id).await;
        info!(
            conn_id = %conn_id,
            user_id = %handle.user_id,
            was_live,
            "Connection unregistered"
        );
        if !was_live {
            return None;
        }

        self.broadcast_except(
            &ServerEvent::PresenceChanged {
                user_id: handle.user_id,
                online: false,
            },
            handle.id,
        );
        Some(handle.user_id)
    }

    /// Sends an event to a user's live connection.
    ///
    /// Returns `false` if the user is not present; that is not an error.
    pub async fn send_to_user(&self, user_id: UserId, event: ServerEvent) -> bool {
        let Some(conn_id) = self.presence.lookup(user_id).await else {
            debug!(user_id = %user_id, event = event.kind(), "User offline, event skipped");
            return false;
        };
        self.send_to_connection(&conn_id, event)
    }

    /// Sends an event to one connection.
    pub fn send_to_connection(&self, conn_id: &ConnectionId, event: ServerEvent) -> bool {
        match self.pool.get(conn_id) {
            Some(handle) => handle.send(event),
            None => false,
        }
    }

    /// Sends an event to every connection except one.
    pub fn broadcast_except(&self, event: &ServerEvent, except: ConnectionId) {
        for conn in self.pool.all_connections() {
            if conn.id != except {
                conn.send(event.clone());
            }
        }
    }

    /// Whether the user currently has a live connection.
    pub async fn is_online(&self, user_id: UserId) -> bool {
        self.presence.lookup(user_id).await.is_some()
    }

    /// Number of users with a live connection.
    pub async fn online_count(&self) -> usize {
        self.presence.online_users().await.len()
    }

    /// Gets a connection by ID.
    pub fn get(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.pool.get(conn_id)
    }

    /// Marks every connection dead so transports close their sockets.
    pub fn close_all(&self) {
        let all = self.pool.all_connections();
        for conn in &all {
            conn.mark_dead();
        }
        info!(count = all.len(), "All connections closed");
    }

    /// Returns the total connection count.
    pub fn connection_count(&self) -> usize {
        self.pool.connection_count()
    }

    /// Realtime configuration.
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }
}
