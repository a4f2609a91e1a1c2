//! End-to-end negotiation: client call sessions talking through the server.

mod helpers;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use callhub_client::{
    CallSession, EngineConfig, LocalMedia, MediaDevices, PeerConnection, PeerConnectionFactory,
    PeerEvent, PeerState, SessionState, SignalSink,
};
use callhub_core::protocol::ClientRequest;
use callhub_core::result::AppResult;
use callhub_core::types::{ConversationId, MediaKind, UserId};
use callhub_realtime::RealtimeEngine;
use callhub_realtime::connection::ConnectionHandle;

use helpers::{TestClient, TestServer};

/// Sends requests straight into the engine on behalf of one connection.
#[derive(Debug)]
struct ServerSink {
    engine: RealtimeEngine,
    handle: Arc<ConnectionHandle>,
}

#[async_trait]
impl SignalSink for ServerSink {
    async fn send(&self, request: ClientRequest) -> AppResult<()> {
        self.engine.handle_request(&self.handle, request).await;
        Ok(())
    }
}

#[derive(Debug)]
struct SilentTracks;

impl LocalMedia for SilentTracks {
    fn set_audio_enabled(&self, _enabled: bool) {}
    fn set_video_enabled(&self, _enabled: bool) {}
    fn has_video(&self) -> bool {
        false
    }
    fn stop(&self) {}
}

#[derive(Debug)]
struct SilentDevices;

#[async_trait]
impl MediaDevices for SilentDevices {
    async fn capture(&self, _kind: MediaKind) -> AppResult<Arc<dyn LocalMedia>> {
        Ok(Arc::new(SilentTracks))
    }
}

/// Connects as soon as the remote description is applied, trickling one
/// candidate first.
#[derive(Debug)]
struct LoopbackConnection {
    owner: UserId,
    remote: UserId,
    events: mpsc::UnboundedSender<PeerEvent>,
    remote_description: Mutex<Option<Value>>,
    candidates: Mutex<Vec<Value>>,
    closed: AtomicBool,
}

#[async_trait]
impl PeerConnection for LoopbackConnection {
    async fn create_offer(&self) -> AppResult<Value> {
        Ok(json!({ "type": "offer", "from": self.owner }))
    }

    async fn create_answer(&self) -> AppResult<Value> {
        Ok(json!({ "type": "answer", "from": self.owner }))
    }

    async fn set_remote_description(&self, description: Value) -> AppResult<()> {
        *self.remote_description.lock().unwrap() = Some(description);
        let _ = self.events.send(PeerEvent::IceCandidate {
            remote: self.remote,
            candidate: json!({ "candidate": format!("host {}", self.owner) }),
        });
        let _ = self.events.send(PeerEvent::Connected {
            remote: self.remote,
        });
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: Value) -> AppResult<()> {
        self.candidates.lock().unwrap().push(candidate);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct LoopbackFactory {
    owner: UserId,
    created: Mutex<Vec<Arc<LoopbackConnection>>>,
}

#[async_trait]
impl PeerConnectionFactory for LoopbackFactory {
    async fn create(
        &self,
        remote: UserId,
        _ice_servers: &[String],
        _local: Arc<dyn LocalMedia>,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> AppResult<Arc<dyn PeerConnection>> {
        let connection = Arc::new(LoopbackConnection {
            owner: self.owner,
            remote,
            events,
            remote_description: Mutex::new(None),
            candidates: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });
        self.created.lock().unwrap().push(connection.clone());
        Ok(connection)
    }
}

/// One user's client stack: socket plus call session.
struct Side {
    client: TestClient,
    call: CallSession,
    factory: Arc<LoopbackFactory>,
}

impl Side {
    async fn new(server: &TestServer) -> Self {
        let client = server.user().await;
        let sink = Arc::new(ServerSink {
            engine: server.engine.clone(),
            handle: client.handle.clone(),
        });
        let factory = Arc::new(LoopbackFactory {
            owner: client.user_id,
            created: Mutex::new(Vec::new()),
        });
        let call = CallSession::new(
            client.user_id,
            sink,
            Arc::new(SilentDevices),
            factory.clone(),
            EngineConfig::default(),
        );
        Self {
            client,
            call,
            factory,
        }
    }

    fn user_id(&self) -> UserId {
        self.client.user_id
    }

    /// Feed queued server events through the call session.
    async fn pump(&mut self) {
        for event in self.client.drain() {
            self.call
                .handle_event(&event)
                .await
                .expect("session rejected event");
        }
    }

    fn connection_to(&self, remote: UserId) -> Arc<LoopbackConnection> {
        let created = self.factory.created.lock().unwrap();
        let mut matching = created.iter().filter(|c| c.remote == remote);
        let connection = matching.next().expect("No peer connection").clone();
        assert!(matching.next().is_none(), "Expected one peer connection");
        connection
    }

    fn link_state(&self, remote: UserId) -> Option<PeerState> {
        self.call.engine().and_then(|e| e.link_state(remote))
    }
}

async fn settle(sides: &mut [&mut Side]) {
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        for side in sides.iter_mut() {
            side.pump().await;
        }
    }
}

#[tokio::test]
async fn test_call_negotiates_media_through_relay() {
    let server = TestServer::new();
    let mut caller = Side::new(&server).await;
    let mut callee = Side::new(&server).await;

    caller
        .call
        .initiate(
            ConversationId::new(),
            vec![callee.user_id()],
            MediaKind::Audio,
            false,
        )
        .await
        .unwrap();
    assert_eq!(caller.call.state(), SessionState::Outgoing);

    settle(&mut [&mut caller, &mut callee]).await;
    assert_eq!(callee.call.state(), SessionState::Incoming);
    assert!(caller.call.controller().session().unwrap().call_id.is_some());

    let session = callee.call.accept().await.unwrap();
    assert_eq!(session.remotes, vec![caller.user_id()]);

    settle(&mut [&mut caller, &mut callee]).await;
    assert_eq!(caller.call.state(), SessionState::Connected);
    assert_eq!(callee.call.state(), SessionState::Connected);
    assert_eq!(
        caller.link_state(callee.user_id()),
        Some(PeerState::Connected)
    );
    assert_eq!(
        callee.link_state(caller.user_id()),
        Some(PeerState::Connected)
    );

    let caller_engine = caller.call.engine().unwrap().clone();
    let callee_engine = callee.call.engine().unwrap().clone();
    let (offerer, answerer) = if caller_engine.is_initiator(callee.user_id()) {
        (&caller, &callee)
    } else {
        (&callee, &caller)
    };
    let offerer_conn = offerer.connection_to(answerer.user_id());
    let answerer_conn = answerer.connection_to(offerer.user_id());
    let answer = offerer_conn.remote_description.lock().unwrap().clone().unwrap();
    let offer = answerer_conn.remote_description.lock().unwrap().clone().unwrap();
    assert_eq!(answer["type"], "answer");
    assert_eq!(offer["type"], "offer");
    assert_eq!(offerer_conn.candidates.lock().unwrap().len(), 1);
    assert_eq!(answerer_conn.candidates.lock().unwrap().len(), 1);

    caller.call.end().await.unwrap();
    assert!(caller_engine.is_torn_down());
    settle(&mut [&mut caller, &mut callee]).await;

    assert_eq!(callee.call.state(), SessionState::Ended);
    assert!(callee_engine.is_torn_down());
    assert!(offerer_conn.closed.load(Ordering::SeqCst));
    assert!(answerer_conn.closed.load(Ordering::SeqCst));
    assert_eq!(server.engine.calls.active_call(callee.user_id()).await, None);
}

#[tokio::test]
async fn test_late_joiner_connects_to_everyone() {
    let server = TestServer::new();
    let mut caller = Side::new(&server).await;
    let mut first = Side::new(&server).await;
    let mut late = Side::new(&server).await;

    caller
        .call
        .initiate(
            ConversationId::new(),
            vec![first.user_id(), late.user_id()],
            MediaKind::Video,
            true,
        )
        .await
        .unwrap();
    settle(&mut [&mut caller, &mut first, &mut late]).await;
    assert_eq!(first.call.state(), SessionState::Incoming);
    assert_eq!(late.call.state(), SessionState::Incoming);

    first.call.accept().await.unwrap();
    settle(&mut [&mut caller, &mut first, &mut late]).await;
    assert_eq!(
        caller.link_state(first.user_id()),
        Some(PeerState::Connected)
    );

    late.call.accept().await.unwrap();
    settle(&mut [&mut caller, &mut first, &mut late]).await;

    let sides = [&caller, &first, &late];
    for side in sides {
        for other in sides {
            if side.user_id() != other.user_id() {
                assert_eq!(
                    side.link_state(other.user_id()),
                    Some(PeerState::Connected),
                    "{} -> {} not connected",
                    side.user_id(),
                    other.user_id()
                );
            }
        }
        assert_eq!(side.call.engine().unwrap().link_count(), 2);
    }
}

#[tokio::test]
async fn test_cancel_before_acknowledgement_is_sent_later() {
    let server = TestServer::new();
    let mut caller = Side::new(&server).await;
    let mut callee = Side::new(&server).await;

    caller
        .call
        .initiate(
            ConversationId::new(),
            vec![callee.user_id()],
            MediaKind::Video,
            false,
        )
        .await
        .unwrap();
    caller.call.cancel().await.unwrap();
    assert_eq!(caller.call.state(), SessionState::Idle);
    assert!(caller.call.media().is_none());

    settle(&mut [&mut caller, &mut callee]).await;

    assert_eq!(callee.call.state(), SessionState::Idle);
    assert!(callee.call.controller().incoming().is_none());
    assert_eq!(server.engine.calls.active_call(caller.user_id()).await, None);
}
