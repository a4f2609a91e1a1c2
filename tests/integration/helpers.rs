//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use callhub_core::config::AppConfig;
use callhub_core::protocol::{ClientRequest, InitiateCallRequest, ServerEvent, encode_request};
use callhub_core::types::{CallId, ConversationId, MediaKind, UserId};
use callhub_database::StoreManager;
use callhub_database::memory::{MemoryCallStore, MemoryDirectory, MemoryHistorySink};
use callhub_realtime::RealtimeEngine;
use callhub_realtime::connection::ConnectionHandle;

/// How long a test waits for an event before giving up.
const EVENT_WAIT: Duration = Duration::from_secs(2);

/// Signaling server over in-memory stores.
pub struct TestServer {
    /// The engine under test
    pub engine: RealtimeEngine,
    /// Call records, for direct inspection
    pub calls: Arc<MemoryCallStore>,
    /// Appended history entries
    pub history: Arc<MemoryHistorySink>,
    /// Names and profiles
    pub directory: Arc<MemoryDirectory>,
}

impl TestServer {
    /// Create a server with default configuration
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// Create a server with the given configuration
    pub fn with_config(config: AppConfig) -> Self {
        let calls = Arc::new(MemoryCallStore::new());
        let history = Arc::new(MemoryHistorySink::new());
        let directory = Arc::new(MemoryDirectory::new());
        let stores = StoreManager::from_parts(calls.clone(), history.clone(), directory.clone());
        let engine = RealtimeEngine::new(&config, &stores);

        Self {
            engine,
            calls,
            history,
            directory,
        }
    }

    /// Connect a fresh user
    pub async fn user(&self) -> TestClient {
        self.connect(UserId::new()).await
    }

    /// Connect a given user
    pub async fn connect(&self, user_id: UserId) -> TestClient {
        let (handle, rx) = self.engine.connect(user_id).await;
        TestClient {
            user_id,
            handle,
            rx,
            engine: self.engine.clone(),
        }
    }
}

/// One connected user, driving the engine the way a socket would.
pub struct TestClient {
    pub user_id: UserId,
    pub handle: Arc<ConnectionHandle>,
    rx: mpsc::Receiver<ServerEvent>,
    engine: RealtimeEngine,
}

impl TestClient {
    /// Send a request as a raw text frame
    pub async fn send(&self, request: ClientRequest) {
        let raw = encode_request(&request).expect("Failed to encode request");
        self.engine.handle_inbound(&self.handle.id, &raw).await;
    }

    /// Send an arbitrary text frame
    pub async fn send_raw(&self, raw: &str) {
        self.engine.handle_inbound(&self.handle.id, raw).await;
    }

    /// Ring `participants` and return the new call's id
    pub async fn call(
        &mut self,
        conversation_id: ConversationId,
        participants: &[UserId],
        media_kind: MediaKind,
        is_group: bool,
    ) -> CallId {
        self.send(ClientRequest::InitiateCall(InitiateCallRequest {
            conversation_id,
            participant_ids: participants.to_vec(),
            media_kind,
            is_group,
        }))
        .await;
        match self
            .expect(|e| matches!(e, ServerEvent::CallInitiated { .. }))
            .await
        {
            ServerEvent::CallInitiated { call } => call.id,
            other => panic!("Expected call-initiated, got {other:?}"),
        }
    }

    pub async fn accept(&self, call_id: CallId) {
        self.send(ClientRequest::AcceptCall { call_id }).await;
    }

    pub async fn reject(&self, call_id: CallId) {
        self.send(ClientRequest::RejectCall { call_id }).await;
    }

    pub async fn end(&self, call_id: CallId) {
        self.send(ClientRequest::EndCall { call_id }).await;
    }

    pub async fn cancel(&self, call_id: CallId) {
        self.send(ClientRequest::CancelCall { call_id }).await;
    }

    /// Close the connection
    pub async fn disconnect(&self) {
        self.engine.disconnect(&self.handle.id).await;
    }

    /// Wait for the next event, ignoring presence and heartbeat traffic
    pub async fn recv(&mut self) -> ServerEvent {
        loop {
            let event = tokio::time::timeout(EVENT_WAIT, self.rx.recv())
                .await
                .expect("Timed out waiting for an event")
                .expect("Connection channel closed");
            if !matches!(
                event,
                ServerEvent::PresenceChanged { .. } | ServerEvent::Ping { .. }
            ) {
                return event;
            }
        }
    }

    /// Wait until an event matching `pred` arrives, skipping others
    pub async fn expect<F>(&mut self, pred: F) -> ServerEvent
    where
        F: Fn(&ServerEvent) -> bool,
    {
        loop {
            let event = self.recv().await;
            if pred(&event) {
                return event;
            }
        }
    }

    /// Call events already queued, without waiting
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            if !matches!(
                event,
                ServerEvent::PresenceChanged { .. }
                    | ServerEvent::Ping { .. }
                    | ServerEvent::CallHistory { .. }
            ) {
                events.push(event);
            }
        }
        events
    }

    /// Wire names of the queued call events
    pub fn drain_kinds(&mut self) -> Vec<&'static str> {
        self.drain().iter().map(ServerEvent::kind).collect()
    }
}
