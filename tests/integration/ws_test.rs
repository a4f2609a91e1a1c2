//! Integration tests over a real WebSocket: signaling client against the server.

use std::time::Duration;

use tokio::sync::mpsc;

use callhub_api::{AppState, build_app};
use callhub_client::{SignalSink, WsSignalingClient};
use callhub_core::config::AppConfig;
use callhub_core::protocol::{ClientRequest, InitiateCallRequest, ServerEvent};
use callhub_core::types::{ConversationId, EndReason, MediaKind, UserId};
use callhub_database::StoreManager;
use callhub_realtime::RealtimeEngine;

async fn spawn_server() -> (String, RealtimeEngine) {
    let config = AppConfig::default();
    let stores = StoreManager::memory();
    let realtime = RealtimeEngine::new(&config, &stores);
    let app = build_app(AppState::new(config, stores, realtime.clone()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("No local address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    (format!("ws://{addr}"), realtime)
}

async fn wait_for<F>(events: &mut mpsc::UnboundedReceiver<ServerEvent>, pred: F) -> ServerEvent
where
    F: Fn(&ServerEvent) -> bool,
{
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("Timed out waiting for an event")
            .expect("Signaling connection closed");
        if pred(&event) {
            return event;
        }
    }
}

#[tokio::test]
async fn test_call_over_websocket() {
    let (base_url, engine) = spawn_server().await;
    let alice = UserId::new();
    let bob = UserId::new();

    let (alice_client, mut alice_events) = WsSignalingClient::connect(&base_url, alice)
        .await
        .expect("Alice failed to connect");
    let (bob_client, mut bob_events) = WsSignalingClient::connect(&base_url, bob)
        .await
        .expect("Bob failed to connect");

    wait_for(&mut alice_events, |e| {
        matches!(e, ServerEvent::PresenceChanged { user_id, online: true } if *user_id == bob)
    })
    .await;

    alice_client
        .send(ClientRequest::InitiateCall(InitiateCallRequest {
            conversation_id: ConversationId::new(),
            participant_ids: vec![bob],
            media_kind: MediaKind::Audio,
            is_group: false,
        }))
        .await
        .unwrap();

    let ServerEvent::CallInitiated { call } = wait_for(&mut alice_events, |e| {
        matches!(e, ServerEvent::CallInitiated { .. })
    })
    .await
    else {
        unreachable!();
    };
    let incoming = wait_for(&mut bob_events, |e| {
        matches!(e, ServerEvent::IncomingCall { .. })
    })
    .await;
    assert_eq!(incoming.call_id(), Some(call.id));

    bob_client
        .send(ClientRequest::AcceptCall { call_id: call.id })
        .await
        .unwrap();
    wait_for(&mut alice_events, |e| {
        matches!(e, ServerEvent::Accepted { user_id, .. } if *user_id == bob)
    })
    .await;
    assert_eq!(engine.calls.active_call(bob).await, Some(call.id));

    bob_client.close();
    assert!(!bob_client.is_open());
    assert!(bob_client.send(ClientRequest::EndCall { call_id: call.id }).await.is_err());

    let ended = wait_for(&mut alice_events, |e| matches!(e, ServerEvent::Ended { .. })).await;
    assert!(matches!(
        ended,
        ServerEvent::Ended {
            reason: EndReason::Ended,
            ..
        }
    ));
    assert_eq!(engine.calls.active_call(alice).await, None);
}

#[tokio::test]
async fn test_malformed_request_gets_error_event() {
    let (base_url, _engine) = spawn_server().await;
    let (client, mut events) = WsSignalingClient::connect(&base_url, UserId::new())
        .await
        .expect("Failed to connect");

    client
        .send(ClientRequest::InitiateCall(InitiateCallRequest {
            conversation_id: ConversationId::new(),
            participant_ids: vec![],
            media_kind: MediaKind::Video,
            is_group: false,
        }))
        .await
        .unwrap();

    let error = wait_for(&mut events, |e| matches!(e, ServerEvent::Error { .. })).await;
    let ServerEvent::Error { code, .. } = error else {
        unreachable!();
    };
    assert_eq!(code, "VALIDATION");
}
