//! Ping/pong heartbeat for WebSocket keepalive.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time;

use callhub_core::config::realtime::RealtimeConfig;
use callhub_core::protocol::ServerEvent;

use super::handle::ConnectionHandle;

/// Heartbeat configuration
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Interval between pings
    pub ping_interval: Duration,
    /// Silence after which the connection is dead
    pub ping_timeout: Duration,
}

impl From<&RealtimeConfig> for HeartbeatConfig {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            ping_interval: Duration::from_secs(config.ping_interval_seconds),
            ping_timeout: Duration::from_secs(config.ping_timeout_seconds),
        }
    }
}

/// Run the heartbeat loop for a connection.
///
/// Sends periodic pings and marks the connection dead once no pong has
/// arrived within the timeout, which makes the transport close it.
pub async fn run_heartbeat(handle: Arc<ConnectionHandle>, config: HeartbeatConfig) {
    let mut interval = time::interval(config.ping_interval);
    interval.tick().await;
    let closed = handle.closed();

    loop {
        tokio::select! {
            _ = closed.cancelled() => break,
            _ = interval.tick() => {}
        }

        let silent_ms = handle.millis_since_pong();
        if silent_ms > config.ping_timeout.as_millis() as u64 {
            tracing::warn!(
                conn_id = %handle.id,
                user_id = %handle.user_id,
                silent_ms,
                "Heartbeat timeout"
            );
            handle.mark_dead();
            break;
        }

        let ping = ServerEvent::Ping {
            timestamp: Utc::now().timestamp_millis(),
        };
        if !handle.send(ping) && !handle.is_alive() {
            break;
        }
    }

    tracing::debug!(conn_id = %handle.id, "Heartbeat loop ended");
}
