//! Integration tests for the negotiation relay.

mod helpers;

use serde_json::json;

use callhub_core::config::AppConfig;
use callhub_core::protocol::{ClientRequest, ServerEvent};
use callhub_core::types::{CallId, ConversationId, MediaKind, SignalKind, UserId};

use helpers::TestServer;

#[tokio::test]
async fn test_payload_is_forwarded_verbatim() {
    let server = TestServer::new();
    let mut alice = server.user().await;
    let mut bob = server.user().await;

    let call_id = alice
        .call(ConversationId::new(), &[bob.user_id], MediaKind::Video, false)
        .await;
    bob.accept(call_id).await;
    bob.drain();

    let payload = json!({ "sdp": "v=0\r\no=- 1 2 IN IP4 0.0.0.0", "type": "offer" });
    alice
        .send(ClientRequest::Signal {
            call_id,
            target_id: bob.user_id,
            kind: SignalKind::Offer,
            payload: payload.clone(),
        })
        .await;

    match bob.drain().as_slice() {
        [
            ServerEvent::Signal {
                call_id: id,
                sender_id,
                target_id,
                kind,
                payload: received,
            },
        ] => {
            assert_eq!(*id, call_id);
            assert_eq!(*sender_id, alice.user_id);
            assert_eq!(*target_id, bob.user_id);
            assert_eq!(*kind, SignalKind::Offer);
            assert_eq!(received, &payload);
        }
        other => panic!("Expected one signal, got {other:?}"),
    }
}

#[tokio::test]
async fn test_signal_to_absent_target_is_dropped_silently() {
    let server = TestServer::new();
    let mut alice = server.user().await;

    alice
        .send(ClientRequest::Signal {
            call_id: CallId::new(),
            target_id: UserId::new(),
            kind: SignalKind::IceCandidate,
            payload: json!({ "candidate": "candidate:1 1 udp 2122260223 10.0.0.1 5000 typ host" }),
        })
        .await;

    assert!(alice.drain().is_empty());
}

#[tokio::test]
async fn test_relay_without_membership_check_ignores_call_state() {
    let server = TestServer::new();
    let alice = server.user().await;
    let mut bob = server.user().await;

    let delivered = server
        .engine
        .relay
        .relay(
            CallId::new(),
            alice.user_id,
            bob.user_id,
            SignalKind::Answer,
            json!({}),
        )
        .await;

    assert!(delivered);
    assert_eq!(bob.drain_kinds(), vec!["signal"]);
}

#[tokio::test]
async fn test_membership_check_drops_outsiders() {
    let mut config = AppConfig::default();
    config.call.verify_relay_membership = true;
    let server = TestServer::with_config(config);

    let mut alice = server.user().await;
    let mut bob = server.user().await;
    let mallory = server.user().await;

    let call_id = alice
        .call(ConversationId::new(), &[bob.user_id], MediaKind::Audio, false)
        .await;
    bob.accept(call_id).await;
    bob.drain();
    alice.drain();

    mallory
        .send(ClientRequest::Signal {
            call_id,
            target_id: bob.user_id,
            kind: SignalKind::Offer,
            payload: json!({ "sdp": "forged" }),
        })
        .await;
    assert!(bob.drain().is_empty());

    alice
        .send(ClientRequest::Signal {
            call_id,
            target_id: bob.user_id,
            kind: SignalKind::Offer,
            payload: json!({ "sdp": "genuine" }),
        })
        .await;
    assert_eq!(bob.drain_kinds(), vec!["signal"]);

    alice.end(call_id).await;
    bob.drain();
    alice
        .send(ClientRequest::Signal {
            call_id,
            target_id: bob.user_id,
            kind: SignalKind::IceCandidate,
            payload: json!({}),
        })
        .await;
    assert!(bob.drain().is_empty());
}
