//! Connection pool: every open connection, indexed by connection ID.

use std::sync::Arc;

use dashmap::DashMap;

use callhub_core::types::ConnectionId;

use super::handle::ConnectionHandle;

/// Thread-safe pool of all active WebSocket connections.
///
/// A user may briefly own several connections (a reconnect racing the old
/// socket's close); routing by user goes through the presence registry.
#[derive(Debug, Default)]
pub struct ConnectionPool {
    by_id: DashMap<ConnectionId, Arc<ConnectionHandle>>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, handle: Arc<ConnectionHandle>) {
        self.by_id.insert(handle.id, handle);
    }

    /// Take a connection out; `None` if it was already gone.
    pub fn remove(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.by_id.remove(conn_id).map(|(_, handle)| handle)
    }

    pub fn get(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.by_id.get(conn_id).map(|entry| entry.value().clone())
    }

    /// Open connections, stale ones included.
    pub fn connection_count(&self) -> usize {
        self.by_id.len()
    }

    /// Snapshot of every handle, for broadcasts.
    pub fn all_connections(&self) -> Vec<Arc<ConnectionHandle>> {
        self.by_id
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}
