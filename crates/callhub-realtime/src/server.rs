//! Top-level real-time engine that ties together all subsystems.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use callhub_core::config::AppConfig;
use callhub_core::error::{AppError, ErrorKind};
use callhub_core::protocol::{ClientRequest, ServerEvent};
use callhub_core::types::{CallId, ConnectionId, UserId};
use callhub_database::StoreManager;

use crate::call::{ActiveCallRegistry, CallSessionManager, InMemoryActiveCalls, SignalRelay};
use crate::connection::heartbeat::{HeartbeatConfig, run_heartbeat};
use crate::connection::{ConnectionHandle, ConnectionManager};
use crate::message::validate_inbound;
use crate::presence::{InMemoryPresence, PresenceRegistry};

/// Central real-time engine: connections, presence, calls, relay.
#[derive(Clone)]
pub struct RealtimeEngine {
    /// Connection manager.
    pub connections: Arc<ConnectionManager>,
    /// Call session manager.
    pub calls: Arc<CallSessionManager>,
    /// Signal relay.
    pub relay: Arc<SignalRelay>,
    heartbeat: HeartbeatConfig,
    max_message_bytes: usize,
}

impl std::fmt::Debug for RealtimeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeEngine")
            .field("connections", &self.connections.connection_count())
            .finish()
    }
}

impl RealtimeEngine {
    /// Creates an engine with in-process presence and active-call registries.
    pub fn new(config: &AppConfig, stores: &StoreManager) -> Self {
        Self::with_registries(
            config,
            stores,
            Arc::new(InMemoryPresence::new()),
            Arc::new(InMemoryActiveCalls::new()),
        )
    }

    /// Creates an engine over the given registries.
    pub fn with_registries(
        config: &AppConfig,
        stores: &StoreManager,
        presence: Arc<dyn PresenceRegistry>,
        active: Arc<dyn ActiveCallRegistry>,
    ) -> Self {
        let connections = Arc::new(ConnectionManager::new(config.realtime.clone(), presence));
        let calls = CallSessionManager::new(
            config.call.clone(),
            stores,
            Arc::clone(&connections),
            active,
        );
        let relay = Arc::new(SignalRelay::new(
            Arc::clone(&connections),
            stores.calls(),
            config.call.verify_relay_membership,
        ));

        info!(
            ring_timeout_seconds = config.call.ring_timeout_seconds,
            verify_relay_membership = config.call.verify_relay_membership,
            "Real-time engine initialized"
        );

        Self {
            connections,
            calls,
            relay,
            heartbeat: HeartbeatConfig::from(&config.realtime),
            max_message_bytes: config.realtime.max_message_bytes,
        }
    }

    /// Connection established for an authenticated user.
    pub async fn connect(
        &self,
        user_id: UserId,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<ServerEvent>) {
        self.connections.register(user_id).await
    }

    /// Start pinging a connection.
    pub fn spawn_heartbeat(&self, handle: Arc<ConnectionHandle>) -> JoinHandle<()> {
        tokio::spawn(run_heartbeat(handle, self.heartbeat.clone()))
    }

    /// Connection closed. If it was the user's live connection, their
    /// active call is ended on their behalf.
    pub async fn disconnect(&self, conn_id: &ConnectionId) {
        if let Some(user_id) = self.connections.unregister(conn_id).await {
            self.calls.on_disconnect(user_id).await;
        }
    }

    /// Processes a raw inbound text frame.
    pub async fn handle_inbound(&self, conn_id: &ConnectionId, raw: &str) {
        let Some(handle) = self.connections.get(conn_id) else {
            warn!(conn_id = %conn_id, "Message from unknown connection");
            return;
        };
        handle.record_pong();

        match validate_inbound(raw, self.max_message_bytes) {
            Ok(request) => self.handle_request(&handle, request).await,
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "Invalid inbound frame");
                handle.send(ServerEvent::error(&e, None));
            }
        }
    }

    /// Executes one decoded request on behalf of the connection's user.
    pub async fn handle_request(&self, handle: &ConnectionHandle, request: ClientRequest) {
        let user_id = handle.user_id;
        let kind = request.kind();
        debug!(conn_id = %handle.id, user_id = %user_id, request = kind, "Inbound request");

        let (outcome, call_id): (Result<(), AppError>, Option<CallId>) = match request {
            ClientRequest::InitiateCall(body) => {
                (self.calls.initiate(user_id, body).await.map(drop), None)
            }
            ClientRequest::AcceptCall { call_id } => (
                self.calls.accept(call_id, user_id).await.map(drop),
                Some(call_id),
            ),
            ClientRequest::RejectCall { call_id } => (
                self.calls.reject(call_id, user_id).await.map(drop),
                Some(call_id),
            ),
            ClientRequest::EndCall { call_id } => (
                self.calls.end(call_id, user_id).await.map(drop),
                Some(call_id),
            ),
            ClientRequest::CancelCall { call_id } => (
                self.calls.cancel(call_id, user_id).await.map(drop),
                Some(call_id),
            ),
            ClientRequest::Signal {
                call_id,
                target_id,
                kind,
                payload,
            } => {
                self.relay
                    .relay(call_id, user_id, target_id, kind, payload)
                    .await;
                (Ok(()), Some(call_id))
            }
            ClientRequest::ActiveCallStatus { user_id: target } => {
                let target = target.unwrap_or(user_id);
                let call_id = self.calls.active_call(target).await;
                handle.send(ServerEvent::ActiveCallStatus {
                    user_id: target,
                    in_call: call_id.is_some(),
                    call_id,
                });
                (Ok(()), call_id)
            }
            ClientRequest::Pong { .. } => (Ok(()), None),
        };

        if let Err(e) = outcome {
            warn!(
                user_id = %user_id,
                request = kind,
                code = e.kind.code(),
                error = %e.message,
                "Request failed"
            );
            // The manager already told the caller nobody could be rung.
            if e.kind != ErrorKind::AllBusy {
                handle.send(ServerEvent::error(&e, call_id));
            }
        }
    }

    /// Closes every connection. Their socket tasks see the close and exit.
    pub fn shutdown(&self) {
        info!("Shutting down real-time engine");
        self.connections.close_all();
    }
}
