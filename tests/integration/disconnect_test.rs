//! Integration tests for connection loss and presence.

mod helpers;

use callhub_core::protocol::ServerEvent;
use callhub_core::types::{CallStatus, ConversationId, EndReason, MediaKind};
use callhub_database::CallStore;

use helpers::TestServer;

#[tokio::test]
async fn test_disconnect_ends_active_call() {
    let server = TestServer::new();
    let mut alice = server.user().await;
    let mut bob = server.user().await;

    let call_id = alice
        .call(ConversationId::new(), &[bob.user_id], MediaKind::Audio, false)
        .await;
    bob.accept(call_id).await;
    alice.drain();
    bob.drain();

    bob.disconnect().await;

    match alice.drain().as_slice() {
        [ServerEvent::Ended { reason, .. }] => assert_eq!(*reason, EndReason::Ended),
        other => panic!("Expected ended, got {other:?}"),
    }
    let record = server.calls.find_by_id(call_id).await.unwrap().unwrap();
    assert_eq!(record.status, CallStatus::Ended);
    assert_eq!(server.engine.calls.active_call(alice.user_id).await, None);
    assert!(!server.engine.connections.is_online(bob.user_id).await);
}

#[tokio::test]
async fn test_ringing_caller_disconnect_ends_call_for_participants() {
    let server = TestServer::new();
    let mut alice = server.user().await;
    let mut bob = server.user().await;

    let call_id = alice
        .call(ConversationId::new(), &[bob.user_id], MediaKind::Video, false)
        .await;
    bob.drain();

    alice.disconnect().await;

    assert_eq!(bob.drain_kinds(), vec!["ended"]);
    let record = server.calls.find_by_id(call_id).await.unwrap().unwrap();
    assert!(record.status.is_terminal());
    assert_eq!(record.duration_seconds, Some(0));
    assert_eq!(server.engine.calls.active_call(bob.user_id).await, None);
}

#[tokio::test]
async fn test_stale_connection_close_keeps_call() {
    let server = TestServer::new();
    let mut alice = server.user().await;
    let mut bob = server.user().await;

    let call_id = alice
        .call(ConversationId::new(), &[bob.user_id], MediaKind::Audio, false)
        .await;
    bob.accept(call_id).await;
    bob.drain();

    let reconnected = server.connect(alice.user_id).await;
    alice.disconnect().await;

    assert!(bob.drain().is_empty());
    assert_eq!(
        server.engine.calls.active_call(alice.user_id).await,
        Some(call_id)
    );
    assert!(server.engine.connections.is_online(alice.user_id).await);

    reconnected.end(call_id).await;
    assert_eq!(bob.drain_kinds(), vec!["ended"]);
}

#[tokio::test]
async fn test_presence_is_broadcast() {
    let server = TestServer::new();
    let alice = server.user().await;
    let bob = server.user().await;

    let mut watcher = server.engine.connect(callhub_core::types::UserId::new()).await.1;
    let mut online = Vec::new();
    while let Ok(event) = watcher.try_recv() {
        if let ServerEvent::PresenceChanged { user_id, online: true } = event {
            online.push(user_id);
        }
    }
    assert_eq!(online.len(), 2);
    assert!(online.contains(&alice.user_id));
    assert!(online.contains(&bob.user_id));

    bob.disconnect().await;
    match watcher.try_recv() {
        Ok(ServerEvent::PresenceChanged { user_id, online }) => {
            assert_eq!(user_id, bob.user_id);
            assert!(!online);
        }
        other => panic!("Expected offline notice, got {other:?}"),
    }
    assert_eq!(server.engine.connections.online_count().await, 2);
}
