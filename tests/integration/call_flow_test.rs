//! Integration tests for call lifecycles driven through inbound frames.

mod helpers;

use std::time::Duration;

use callhub_core::protocol::{ClientRequest, ServerEvent};
use callhub_core::types::{CallStatus, ConversationId, EndReason, MediaKind, UserId};
use callhub_database::CallStore;

use helpers::TestServer;

#[tokio::test]
async fn test_one_to_one_call_lifecycle() {
    let server = TestServer::new();
    let mut alice = server.user().await;
    let mut bob = server.user().await;

    let call_id = alice
        .call(ConversationId::new(), &[bob.user_id], MediaKind::Video, false)
        .await;

    let incoming = bob
        .expect(|e| matches!(e, ServerEvent::IncomingCall { .. }))
        .await;
    let ServerEvent::IncomingCall { call, caller, .. } = incoming else {
        unreachable!();
    };
    assert_eq!(call.id, call_id);
    assert_eq!(call.status, CallStatus::Ringing);
    assert_eq!(caller.user_id, alice.user_id);

    bob.accept(call_id).await;
    assert_eq!(alice.drain_kinds(), vec!["accepted", "status-update"]);
    assert_eq!(bob.drain_kinds(), vec!["status-update"]);

    let record = server.calls.find_by_id(call_id).await.unwrap().unwrap();
    assert_eq!(record.status, CallStatus::Ongoing);
    assert!(record.started_at.is_some());

    alice.end(call_id).await;
    match bob.drain().as_slice() {
        [ServerEvent::Ended { reason, .. }] => assert_eq!(*reason, EndReason::Ended),
        other => panic!("Expected a single ended event, got {other:?}"),
    }
    assert!(alice.drain().is_empty());

    let record = server.calls.find_by_id(call_id).await.unwrap().unwrap();
    assert_eq!(record.status, CallStatus::Ended);
    assert!(record.ended_at.is_some());
    assert_eq!(server.engine.calls.active_call(alice.user_id).await, None);
    assert_eq!(server.engine.calls.active_call(bob.user_id).await, None);
}

#[tokio::test]
async fn test_one_to_one_reject_notifies_caller_once() {
    let server = TestServer::new();
    let mut alice = server.user().await;
    let bob = server.user().await;

    let call_id = alice
        .call(ConversationId::new(), &[bob.user_id], MediaKind::Audio, false)
        .await;
    bob.reject(call_id).await;

    let events = alice.drain();
    assert_eq!(
        events.iter().map(ServerEvent::kind).collect::<Vec<_>>(),
        vec!["rejected", "ended"]
    );
    assert!(matches!(
        events[1],
        ServerEvent::Ended {
            reason: EndReason::Rejected,
            duration_seconds: 0,
            ..
        }
    ));

    let record = server.calls.find_by_id(call_id).await.unwrap().unwrap();
    assert_eq!(record.status, CallStatus::Rejected);
    assert!(record.rejected_by.contains(&bob.user_id));
    assert_eq!(server.engine.calls.active_call(alice.user_id).await, None);
}

#[tokio::test]
async fn test_group_ends_when_everyone_declined_or_unreachable() {
    let server = TestServer::new();
    let mut caller = server.user().await;
    let first = server.user().await;
    let second = server.user().await;
    let offline = UserId::new();

    let call_id = caller
        .call(
            ConversationId::new(),
            &[first.user_id, offline, second.user_id],
            MediaKind::Audio,
            true,
        )
        .await;

    first.reject(call_id).await;
    assert_eq!(caller.drain_kinds(), vec!["participant-rejected"]);
    let record = server.calls.find_by_id(call_id).await.unwrap().unwrap();
    assert_eq!(record.status, CallStatus::Ringing);
    assert_eq!(record.missed_by.len(), 1);
    assert!(record.missed_by.contains(&offline));

    second.reject(call_id).await;
    assert_eq!(
        caller.drain_kinds(),
        vec!["participant-rejected", "ended"]
    );
    let record = server.calls.find_by_id(call_id).await.unwrap().unwrap();
    assert_eq!(record.status, CallStatus::Rejected);
}

#[tokio::test]
async fn test_group_call_join_and_hang_up() {
    let server = TestServer::new();
    let conversation_id = ConversationId::new();
    server
        .directory
        .set_conversation_name(conversation_id, "Weekly sync");

    let mut u1 = server.user().await;
    let mut u2 = server.user().await;
    let mut u3 = server.user().await;

    let call_id = u1
        .call(
            conversation_id,
            &[u2.user_id, u3.user_id],
            MediaKind::Video,
            true,
        )
        .await;

    for client in [&mut u2, &mut u3] {
        let event = client
            .expect(|e| matches!(e, ServerEvent::IncomingCall { .. }))
            .await;
        let ServerEvent::IncomingCall {
            conversation_name, ..
        } = event
        else {
            unreachable!();
        };
        assert_eq!(conversation_name.as_deref(), Some("Weekly sync"));
    }

    u2.accept(call_id).await;
    assert_eq!(u1.drain_kinds(), vec!["accepted", "status-update"]);
    assert_eq!(u3.drain_kinds(), vec!["participant-joined", "status-update"]);
    assert_eq!(u2.drain_kinds(), vec!["status-update"]);

    u3.accept(call_id).await;
    assert_eq!(u1.drain_kinds(), vec!["accepted", "status-update"]);
    let u2_events = u2.drain();
    assert!(matches!(
        &u2_events[0],
        ServerEvent::ParticipantJoined { user_id, .. } if *user_id == u3.user_id
    ));
    let Some(ServerEvent::StatusUpdate { parties, .. }) = u2_events.last() else {
        panic!("Expected status-update, got {u2_events:?}");
    };
    assert_eq!(parties.len(), 3);
    u3.drain();

    u2.end(call_id).await;
    for client in [&mut u1, &mut u3] {
        assert_eq!(client.drain_kinds(), vec!["ended"]);
    }
    assert!(u2.drain().is_empty());

    let record = server.calls.find_by_id(call_id).await.unwrap().unwrap();
    assert_eq!(record.status, CallStatus::Ended);
    assert_eq!(record.accepted_by.len(), 2);
    assert!(record.accepted_by.contains(&u3.user_id));
}

#[tokio::test]
async fn test_everyone_busy_creates_nothing() {
    let server = TestServer::new();
    let mut alice = server.user().await;
    let mut bob = server.user().await;
    let carol = server.user().await;

    let existing = bob
        .call(ConversationId::new(), &[carol.user_id], MediaKind::Audio, false)
        .await;
    carol.accept(existing).await;
    bob.drain();

    alice
        .send(ClientRequest::InitiateCall(
            callhub_core::protocol::InitiateCallRequest {
                conversation_id: ConversationId::new(),
                participant_ids: vec![bob.user_id],
                media_kind: MediaKind::Video,
                is_group: false,
            },
        ))
        .await;

    match alice.drain().as_slice() {
        [ServerEvent::Busy { busy_participants }] => {
            assert_eq!(busy_participants, &vec![bob.user_id]);
        }
        other => panic!("Expected only busy, got {other:?}"),
    }
    assert!(bob.drain().is_empty());
    assert_eq!(server.calls.len(), 1);
    assert_eq!(server.engine.calls.active_call(alice.user_id).await, None);
}

#[tokio::test]
async fn test_some_busy_rings_the_rest() {
    let server = TestServer::new();
    let mut alice = server.user().await;
    let mut bob = server.user().await;
    let carol = server.user().await;
    let mut dave = server.user().await;

    let existing = bob
        .call(ConversationId::new(), &[carol.user_id], MediaKind::Audio, false)
        .await;
    carol.accept(existing).await;
    bob.drain();

    let call_id = alice
        .call(
            ConversationId::new(),
            &[bob.user_id, dave.user_id],
            MediaKind::Audio,
            true,
        )
        .await;

    match alice.drain().as_slice() {
        [ServerEvent::SomeBusy {
            busy_participants, ..
        }] => assert_eq!(busy_participants, &vec![bob.user_id]),
        other => panic!("Expected some-busy, got {other:?}"),
    }
    assert_eq!(dave.drain_kinds(), vec!["incoming-call"]);
    assert!(bob.drain().is_empty());

    let record = server.calls.find_by_id(call_id).await.unwrap().unwrap();
    assert_eq!(record.missed_by.len(), 1);
    assert!(record.missed_by.contains(&bob.user_id));
    assert_eq!(
        server.engine.calls.active_call(bob.user_id).await,
        Some(existing)
    );
}

#[tokio::test]
async fn test_second_call_while_in_call_is_refused() {
    let server = TestServer::new();
    let mut alice = server.user().await;
    let bob = server.user().await;
    let carol = server.user().await;

    let first = alice
        .call(ConversationId::new(), &[bob.user_id], MediaKind::Audio, false)
        .await;
    alice.drain();

    alice
        .send(ClientRequest::InitiateCall(
            callhub_core::protocol::InitiateCallRequest {
                conversation_id: ConversationId::new(),
                participant_ids: vec![carol.user_id],
                media_kind: MediaKind::Audio,
                is_group: false,
            },
        ))
        .await;

    match alice.drain().as_slice() {
        [ServerEvent::Error { code, .. }] => assert_eq!(code, "ALREADY_IN_CALL"),
        other => panic!("Expected an error, got {other:?}"),
    }
    assert_eq!(
        server.engine.calls.active_call(alice.user_id).await,
        Some(first)
    );
}

#[tokio::test]
async fn test_cancel_marks_everyone_missed() {
    let server = TestServer::new();
    let conversation_id = ConversationId::new();
    let mut alice = server.user().await;
    let mut bob = server.user().await;

    let call_id = alice
        .call(conversation_id, &[bob.user_id], MediaKind::Audio, false)
        .await;
    bob.drain();

    alice.cancel(call_id).await;
    match bob.drain().as_slice() {
        [ServerEvent::Cancelled { call_id: cancelled }] => assert_eq!(*cancelled, call_id),
        other => panic!("Expected cancelled, got {other:?}"),
    }

    let record = server.calls.find_by_id(call_id).await.unwrap().unwrap();
    assert_eq!(record.status, CallStatus::Missed);
    assert_eq!(record.missed_by.len(), 1);
    assert!(record.missed_by.contains(&bob.user_id));
    assert_eq!(record.duration_seconds, Some(0));

    let history = alice
        .expect(|e| matches!(e, ServerEvent::CallHistory { .. }))
        .await;
    let ServerEvent::CallHistory { entry, .. } = history else {
        unreachable!();
    };
    assert_eq!(entry.text, "Audio call - Missed");
    assert_eq!(server.history.entries(conversation_id).len(), 1);
}

#[tokio::test]
async fn test_only_caller_can_cancel() {
    let server = TestServer::new();
    let mut alice = server.user().await;
    let mut bob = server.user().await;

    let call_id = alice
        .call(ConversationId::new(), &[bob.user_id], MediaKind::Audio, false)
        .await;
    bob.drain();

    bob.cancel(call_id).await;
    match bob.drain().as_slice() {
        [ServerEvent::Error { code, call_id: id, .. }] => {
            assert_eq!(code, "VALIDATION");
            assert_eq!(*id, Some(call_id));
        }
        other => panic!("Expected an error, got {other:?}"),
    }
    let record = server.calls.find_by_id(call_id).await.unwrap().unwrap();
    assert_eq!(record.status, CallStatus::Ringing);
}

#[tokio::test]
async fn test_answered_call_history_reaches_every_party() {
    let server = TestServer::new();
    let conversation_id = ConversationId::new();
    let mut alice = server.user().await;
    let mut bob = server.user().await;

    let call_id = alice
        .call(conversation_id, &[bob.user_id], MediaKind::Video, false)
        .await;
    bob.accept(call_id).await;
    bob.end(call_id).await;

    for client in [&mut alice, &mut bob] {
        let event = client
            .expect(|e| matches!(e, ServerEvent::CallHistory { .. }))
            .await;
        let ServerEvent::CallHistory {
            conversation_id: id,
            entry,
        } = event
        else {
            unreachable!();
        };
        assert_eq!(id, conversation_id);
        assert_eq!(entry.status, CallStatus::Ended);
        assert!(entry.text.starts_with("Video call - Ended"));
    }

    let listed = server.engine.calls.history(conversation_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, call_id);
}

#[tokio::test]
async fn test_active_call_status_query() {
    let server = TestServer::new();
    let mut alice = server.user().await;
    let mut bob = server.user().await;

    bob.send(ClientRequest::ActiveCallStatus {
        user_id: Some(alice.user_id),
    })
    .await;
    assert!(matches!(
        bob.drain().as_slice(),
        [ServerEvent::ActiveCallStatus { in_call: false, call_id: None, .. }]
    ));

    let call_id = alice
        .call(ConversationId::new(), &[bob.user_id], MediaKind::Audio, false)
        .await;
    bob.accept(call_id).await;
    bob.drain();

    bob.send(ClientRequest::ActiveCallStatus { user_id: None })
        .await;
    match bob.drain().as_slice() {
        [ServerEvent::ActiveCallStatus {
            user_id,
            in_call,
            call_id: current,
        }] => {
            assert_eq!(*user_id, bob.user_id);
            assert!(*in_call);
            assert_eq!(*current, Some(call_id));
        }
        other => panic!("Expected active-call-status, got {other:?}"),
    }
}

#[tokio::test]
async fn test_bad_frames_get_errors() {
    let server = TestServer::new();
    let mut alice = server.user().await;

    alice.send_raw("definitely not json").await;
    alice.send_raw(r#"{"type":"accept-call"}"#).await;
    alice
        .send(ClientRequest::AcceptCall {
            call_id: callhub_core::types::CallId::new(),
        })
        .await;

    let codes: Vec<String> = alice
        .drain()
        .into_iter()
        .map(|e| match e {
            ServerEvent::Error { code, .. } => code,
            other => panic!("Expected an error, got {other:?}"),
        })
        .collect();
    assert_eq!(codes, vec!["VALIDATION", "VALIDATION", "CALL_NOT_FOUND"]);
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_call_times_out() {
    let server = TestServer::new();
    let mut alice = server.user().await;
    let mut bob = server.user().await;

    let call_id = alice
        .call(ConversationId::new(), &[bob.user_id], MediaKind::Audio, false)
        .await;
    bob.drain();

    tokio::time::sleep(Duration::from_secs(46)).await;

    let ended = alice
        .expect(|e| matches!(e, ServerEvent::Ended { .. }))
        .await;
    assert!(matches!(
        ended,
        ServerEvent::Ended {
            reason: EndReason::Missed,
            ..
        }
    ));
    bob.expect(|e| matches!(e, ServerEvent::Cancelled { .. }))
        .await;

    let record = server.calls.find_by_id(call_id).await.unwrap().unwrap();
    assert_eq!(record.status, CallStatus::Missed);
}
