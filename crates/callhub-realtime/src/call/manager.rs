//! Call session manager: the server-side call state machine.
//!
//! Every operation on an existing call runs under that call's lock, reads
//! the record, applies one lifecycle step, persists it, and collects the
//! resulting events in an [`Outbox`]. Events are delivered only after the
//! lock is released.

use std::sync::{Arc, Weak};

use chrono::Utc;
use tracing::{info, warn};
use validator::Validate;

use callhub_core::config::call::CallConfig;
use callhub_core::error::{AppError, ErrorKind};
use callhub_core::protocol::{CallView, CallerProfile, InitiateCallRequest, ServerEvent};
use callhub_core::result::AppResult;
use callhub_core::types::{CallId, CallStatus, ConversationId, EndReason, UserId};
use callhub_database::{CallStore, Directory, StoreManager};
use callhub_entity::call::{Call, NewCall};

use crate::connection::ConnectionManager;

use super::active::ActiveCallRegistry;
use super::history::HistoryRecorder;
use super::locks::CallLocks;
use super::outbox::Outbox;
use super::timeout::RingTimeouts;

/// Owns call lifecycle transitions and the single-call-per-user rule.
#[derive(Debug)]
pub struct CallSessionManager {
    store: Arc<dyn CallStore>,
    directory: Arc<dyn Directory>,
    history: HistoryRecorder,
    connections: Arc<ConnectionManager>,
    active: Arc<dyn ActiveCallRegistry>,
    locks: CallLocks,
    timeouts: RingTimeouts,
    config: CallConfig,
    this: Weak<Self>,
}

impl CallSessionManager {
    /// Create a manager over the configured stores.
    pub fn new(
        config: CallConfig,
        stores: &StoreManager,
        connections: Arc<ConnectionManager>,
        active: Arc<dyn ActiveCallRegistry>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            store: stores.calls(),
            directory: stores.directory(),
            history: HistoryRecorder::new(stores.history(), Arc::clone(&connections)),
            connections,
            active,
            locks: CallLocks::new(),
            timeouts: RingTimeouts::new(config.ring_timeout_seconds),
            config,
            this: this.clone(),
        })
    }

    /// Start a call from `caller_id`.
    ///
    /// Participants already on another call are skipped and reported to the
    /// caller with `some-busy`. Participants with no live connection are
    /// recorded as missed. When nobody is left to ring, nothing is created
    /// and `AllBusy` is returned: the caller gets `busy` if anyone was busy,
    /// otherwise an error event saying nobody is online.
    pub async fn initiate(&self, caller_id: UserId, request: InitiateCallRequest) -> AppResult<Call> {
        request.validate()?;

        let mut call = Call::new(
            CallId::new(),
            NewCall {
                conversation_id: request.conversation_id,
                caller_id,
                participant_ids: request.participant_ids,
                media_kind: request.media_kind,
                is_group: request.is_group,
            },
            Utc::now(),
        );
        if call.participant_ids.is_empty() {
            return Err(AppError::validation(
                "A call needs at least one participant besides the caller",
            ));
        }

        if self.active.try_claim(caller_id, call.id).await.is_err() {
            return Err(AppError::already_in_call());
        }

        let mut free = Vec::new();
        let mut busy = Vec::new();
        let mut unreachable = Vec::new();
        for &participant in &call.participant_ids {
            if self.active.current(participant).await.is_some() {
                busy.push(participant);
            } else if !self.connections.is_online(participant).await {
                unreachable.push(participant);
            } else {
                free.push(participant);
            }
        }

        if free.is_empty() {
            self.active.release(caller_id, call.id).await;
            info!(
                caller_id = %caller_id,
                busy = busy.len(),
                unreachable = unreachable.len(),
                "Call not created, nobody to ring"
            );
            let (err, event) = if busy.is_empty() {
                let err = AppError::new(ErrorKind::AllBusy, "No participant is online");
                let event = ServerEvent::error(&err, None);
                (err, event)
            } else {
                let event = ServerEvent::Busy {
                    busy_participants: busy,
                };
                (AppError::all_busy(), event)
            };
            self.connections.send_to_user(caller_id, event).await;
            return Err(err);
        }

        call.transition(CallStatus::Ringing)?;
        for &participant in unreachable.iter().chain(busy.iter()) {
            call.mark_missed(participant);
        }

        let call = match self.store.create(&call).await {
            Ok(call) => call,
            Err(e) => {
                self.active.release(caller_id, call.id).await;
                return Err(e);
            }
        };

        info!(
            call_id = %call.id,
            caller_id = %caller_id,
            media = %call.media_kind,
            ringing = free.len(),
            busy = busy.len(),
            unreachable = unreachable.len(),
            "Call initiated"
        );

        let caller = self.caller_profile(caller_id).await;
        let conversation_name = if call.is_group {
            self.conversation_name(call.conversation_id).await
        } else {
            None
        };

        let view = CallView::from(&call);
        let mut outbox = Outbox::new();
        outbox.push(caller_id, ServerEvent::CallInitiated { call: view.clone() });
        outbox.push_all(
            free,
            &ServerEvent::IncomingCall {
                call: view,
                caller,
                conversation_name,
            },
        );
        if !busy.is_empty() {
            outbox.push(
                caller_id,
                ServerEvent::SomeBusy {
                    call_id: call.id,
                    busy_participants: busy,
                },
            );
        }

        self.arm_ring_timeout(call.id);
        outbox.deliver(&self.connections).await;
        Ok(call)
    }

    /// Answer a call.
    ///
    /// The first acceptance moves the call to `ongoing` and stamps
    /// `started_at`; later acceptances only join.
    pub async fn accept(&self, call_id: CallId, user_id: UserId) -> AppResult<Call> {
        let (call, outbox) = {
            let _guard = self.locks.lock(call_id).await;
            let mut call = self.load(call_id).await?;

            if !call.is_participant(user_id) {
                return Err(AppError::not_participant(user_id, call_id));
            }
            if call.status.is_terminal() {
                return Err(AppError::invalid_transition(format!(
                    "Call {call_id} is already {}",
                    call.status
                )));
            }
            if call.accepted_by.contains(&user_id) {
                return Ok(call);
            }
            if self.active.try_claim(user_id, call_id).await.is_err() {
                return Err(AppError::already_in_other_call());
            }

            let first = match call.record_acceptance(user_id, Utc::now()) {
                Ok(first) => first,
                Err(e) => {
                    self.active.release(user_id, call_id).await;
                    return Err(e);
                }
            };
            if let Err(e) = self.store.update(&call).await {
                self.active.release(user_id, call_id).await;
                return Err(e);
            }
            if first {
                self.timeouts.disarm(call_id);
            }

            info!(call_id = %call_id, user_id = %user_id, first, "Call accepted");

            let mut outbox = Outbox::new();
            outbox.push(call.caller_id, ServerEvent::Accepted { call_id, user_id });
            outbox.push_all(
                call.participant_ids
                    .iter()
                    .copied()
                    .filter(|p| *p != user_id),
                &ServerEvent::ParticipantJoined { call_id, user_id },
            );
            outbox.push_all(
                call.parties(),
                &ServerEvent::StatusUpdate {
                    call_id,
                    status: call.status,
                    user_id: Some(user_id),
                    parties: call.joined_parties(),
                },
            );
            (call, outbox)
        };

        outbox.deliver(&self.connections).await;
        Ok(call)
    }

    /// Decline a call.
    ///
    /// A 1:1 call ends as `rejected`. A group call ends only once every
    /// participant declined or was never reached; until then the caller is
    /// told who declined and the call keeps ringing for the rest.
    pub async fn reject(&self, call_id: CallId, user_id: UserId) -> AppResult<Call> {
        let (call, outbox) = {
            let _guard = self.locks.lock(call_id).await;
            let mut call = self.load(call_id).await?;

            if !call.is_participant(user_id) {
                return Err(AppError::not_participant(user_id, call_id));
            }
            if call.status.is_terminal() {
                self.active.release(user_id, call_id).await;
                return Ok(call);
            }
            if call.accepted_by.contains(&user_id) {
                return Err(AppError::invalid_transition(format!(
                    "User {user_id} already answered call {call_id}"
                )));
            }

            call.record_rejection(user_id)?;
            let mut outbox = Outbox::new();
            let caller_id = call.caller_id;

            if !call.is_group || call.all_declined() {
                let duration = call.finish(CallStatus::Rejected, Utc::now())?;
                self.store.update(&call).await?;
                self.timeouts.disarm(call_id);
                self.release_all(&call).await;

                let notice = if call.is_group {
                    ServerEvent::ParticipantRejected { call_id, user_id }
                } else {
                    ServerEvent::Rejected { call_id, user_id }
                };
                outbox.push(caller_id, notice);
                outbox.push(
                    caller_id,
                    ServerEvent::Ended {
                        call_id,
                        reason: EndReason::Rejected,
                        duration_seconds: duration,
                    },
                );
                self.history.record(&call);
                info!(call_id = %call_id, user_id = %user_id, "Call rejected");
            } else {
                self.store.update(&call).await?;
                outbox.push(caller_id, ServerEvent::ParticipantRejected { call_id, user_id });
                info!(call_id = %call_id, user_id = %user_id, "Group participant declined");
            }
            (call, outbox)
        };

        outbox.deliver(&self.connections).await;
        Ok(call)
    }

    /// Hang up. Any party may end the call at any point.
    ///
    /// Clears every party's pointer and notifies everyone but `user_id`.
    pub async fn end(&self, call_id: CallId, user_id: UserId) -> AppResult<Call> {
        let (call, outbox) = {
            let _guard = self.locks.lock(call_id).await;
            let call = self.load(call_id).await?;

            if !call.is_party(user_id) {
                return Err(AppError::not_participant(user_id, call_id));
            }
            if call.status.is_terminal() {
                self.active.release(user_id, call_id).await;
                return Ok(call);
            }
            self.end_locked(call, user_id).await?
        };

        outbox.deliver(&self.connections).await;
        Ok(call)
    }

    /// Abort an outgoing call before anyone answered.
    ///
    /// Every participant who neither answered nor declined is marked
    /// missed. An already answered call is ended on the caller's behalf.
    pub async fn cancel(&self, call_id: CallId, user_id: UserId) -> AppResult<Call> {
        let (call, outbox) = {
            let _guard = self.locks.lock(call_id).await;
            let call = self.load(call_id).await?;

            if call.caller_id != user_id {
                return Err(AppError::validation(format!(
                    "Only the caller can cancel call {call_id}"
                )));
            }
            if call.status.is_terminal() {
                self.active.release(user_id, call_id).await;
                return Ok(call);
            }
            if call.status == CallStatus::Ongoing {
                self.end_locked(call, user_id).await?
            } else {
                self.cancel_locked(call, false).await?
            }
        };

        outbox.deliver(&self.connections).await;
        Ok(call)
    }

    /// Call `user_id` currently holds, if any.
    pub async fn active_call(&self, user_id: UserId) -> Option<CallId> {
        self.active.current(user_id).await
    }

    /// End the call of a user whose live connection closed.
    pub async fn on_disconnect(&self, user_id: UserId) {
        let Some(call_id) = self.active.current(user_id).await else {
            return;
        };
        info!(call_id = %call_id, user_id = %user_id, "Ending call of disconnected user");
        if let Err(e) = self.end(call_id, user_id).await {
            warn!(call_id = %call_id, user_id = %user_id, error = %e, "Disconnect cleanup failed");
            self.active.release(user_id, call_id).await;
        }
    }

    /// Most recent calls of a conversation, newest first.
    pub async fn history(&self, conversation_id: ConversationId) -> AppResult<Vec<Call>> {
        self.store
            .find_by_conversation(conversation_id, self.config.history_limit)
            .await
    }

    /// Load a call or fail with `CallNotFound`.
    pub async fn find(&self, call_id: CallId) -> AppResult<Call> {
        self.load(call_id).await
    }

    async fn end_locked(&self, mut call: Call, user_id: UserId) -> AppResult<(Call, Outbox)> {
        let call_id = call.id;
        let duration = call.finish(CallStatus::Ended, Utc::now())?;
        self.store.update(&call).await?;
        self.timeouts.disarm(call_id);
        self.release_all(&call).await;

        let mut outbox = Outbox::new();
        outbox.push_all(
            call.parties().into_iter().filter(|p| *p != user_id),
            &ServerEvent::Ended {
                call_id,
                reason: EndReason::Ended,
                duration_seconds: duration,
            },
        );
        self.history.record(&call);
        info!(call_id = %call_id, user_id = %user_id, duration, "Call ended");
        Ok((call, outbox))
    }

    async fn cancel_locked(&self, mut call: Call, notify_caller: bool) -> AppResult<(Call, Outbox)> {
        let call_id = call.id;
        for participant in call.unanswered() {
            call.mark_missed(participant);
        }
        let duration = call.finish(CallStatus::Missed, Utc::now())?;
        self.store.update(&call).await?;
        self.timeouts.disarm(call_id);
        self.release_all(&call).await;

        let mut outbox = Outbox::new();
        outbox.push_all(
            call.participant_ids.iter().copied(),
            &ServerEvent::Cancelled { call_id },
        );
        if notify_caller {
            outbox.push(
                call.caller_id,
                ServerEvent::Ended {
                    call_id,
                    reason: EndReason::Missed,
                    duration_seconds: duration,
                },
            );
        }
        self.history.record(&call);
        info!(call_id = %call_id, missed = call.missed_by.len(), "Call cancelled");
        Ok((call, outbox))
    }

    /// Ring timeout fired: a call nobody answered becomes missed.
    async fn expire_ringing(&self, call_id: CallId) {
        self.timeouts.forget(call_id);
        let outbox = {
            let _guard = self.locks.lock(call_id).await;
            let call = match self.load(call_id).await {
                Ok(call) => call,
                Err(e) => {
                    warn!(call_id = %call_id, error = %e, "Ring timeout on unreadable call");
                    return;
                }
            };
            if call.status != CallStatus::Ringing {
                return;
            }
            info!(call_id = %call_id, "Ring timeout elapsed");
            match self.cancel_locked(call, true).await {
                Ok((_, outbox)) => outbox,
                Err(e) => {
                    warn!(call_id = %call_id, error = %e, "Ring timeout cancel failed");
                    return;
                }
            }
        };
        outbox.deliver(&self.connections).await;
    }

    fn arm_ring_timeout(&self, call_id: CallId) {
        let this = self.this.clone();
        self.timeouts.arm(call_id, async move {
            if let Some(manager) = this.upgrade() {
                manager.expire_ringing(call_id).await;
            }
        });
    }

    async fn release_all(&self, call: &Call) {
        for user_id in call.parties() {
            self.active.release(user_id, call.id).await;
        }
    }

    async fn load(&self, call_id: CallId) -> AppResult<Call> {
        self.store
            .find_by_id(call_id)
            .await?
            .ok_or_else(|| AppError::call_not_found(call_id))
    }

    async fn caller_profile(&self, caller_id: UserId) -> CallerProfile {
        match self.directory.user_profile(caller_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => CallerProfile::anonymous(caller_id),
            Err(e) => {
                warn!(user_id = %caller_id, error = %e, "Caller profile lookup failed");
                CallerProfile::anonymous(caller_id)
            }
        }
    }

    async fn conversation_name(&self, conversation_id: ConversationId) -> Option<String> {
        self.directory
            .conversation_name(conversation_id)
            .await
            .unwrap_or_else(|e| {
                warn!(conversation_id = %conversation_id, error = %e, "Conversation lookup failed");
                None
            })
    }
}
