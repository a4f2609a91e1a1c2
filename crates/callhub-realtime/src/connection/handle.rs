//! Individual WebSocket connection handle.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use callhub_core::protocol::ServerEvent;
use callhub_core::types::{ConnectionId, UserId};

/// A handle to a single WebSocket connection.
///
/// Holds the sender channel for pushing events to the client and the
/// cancellation token the transport watches to close the socket.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Unique connection ID
    pub id: ConnectionId,
    /// User bound to this connection
    pub user_id: UserId,
    /// Sender for outbound events
    sender: mpsc::Sender<ServerEvent>,
    /// When the connection was established
    pub connected_at: DateTime<Utc>,
    /// Monotonic reference point for `last_pong_ms`
    opened: Instant,
    /// Last pong, millis after `opened`
    last_pong_ms: AtomicU64,
    /// Cancelled once the connection is dead
    closed: CancellationToken,
}

impl ConnectionHandle {
    /// Create a new connection handle
    pub fn new(user_id: UserId, sender: mpsc::Sender<ServerEvent>) -> Self {
        let now = Utc::now();
        Self {
            id: ConnectionId::new(),
            user_id,
            sender,
            connected_at: now,
            opened: Instant::now(),
            last_pong_ms: AtomicU64::new(0),
            closed: CancellationToken::new(),
        }
    }

    /// Queue an event for this connection without waiting.
    ///
    /// Returns `false` if the connection is dead or its queue is full.
    pub fn send(&self, event: ServerEvent) -> bool {
        if !self.is_alive() {
            return false;
        }
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(
                    conn_id = %self.id,
                    event = event.kind(),
                    "Connection send buffer full, dropping event"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.mark_dead();
                false
            }
        }
    }

    /// Check if connection is alive
    pub fn is_alive(&self) -> bool {
        !self.closed.is_cancelled()
    }

    /// Mark connection as dead; the transport closes the socket.
    pub fn mark_dead(&self) {
        self.closed.cancel();
    }

    /// Token cancelled when the connection dies.
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Record a pong response
    pub fn record_pong(&self) {
        self.last_pong_ms
            .store(self.opened.elapsed().as_millis() as u64, Ordering::Relaxed);
    }

    /// Milliseconds since the last pong (or since opening).
    pub fn millis_since_pong(&self) -> u64 {
        (self.opened.elapsed().as_millis() as u64)
            .saturating_sub(self.last_pong_ms.load(Ordering::Relaxed))
    }
}
