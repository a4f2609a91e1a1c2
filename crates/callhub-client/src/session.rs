//! Client call-session controller.
//!
//! Tracks what the local user is doing (`idle → outgoing | incoming →
//! connected → ended → idle`) and turns user actions into requests.

use std::sync::Arc;

use tracing::{debug, info};

use callhub_core::error::AppError;
use callhub_core::protocol::{CallView, CallerProfile, ClientRequest, InitiateCallRequest, ServerEvent};
use callhub_core::result::AppResult;
use callhub_core::types::{CallId, ConversationId, MediaKind, UserId};

use crate::transport::SignalSink;

/// Local call-session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No call.
    Idle,
    /// We called and nobody answered yet.
    Outgoing,
    /// Someone is calling us.
    Incoming,
    /// At least one remote party answered.
    Connected,
    /// Finished; [`CallController::reset`] returns to idle.
    Ended,
}

/// The call the local user is part of.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSession {
    /// Unknown until the server acknowledges an outgoing call.
    pub call_id: Option<CallId>,
    /// Conversation the call belongs to.
    pub conversation_id: ConversationId,
    /// Who placed the call; the local user for outgoing calls.
    pub caller_id: UserId,
    /// Audio or video.
    pub media_kind: MediaKind,
    /// Group calls stay up while anyone remains.
    pub is_group: bool,
    /// Parties that joined the call, other than the local user. Invitees
    /// still ringing are added when they answer.
    pub remotes: Vec<UserId>,
}

/// A ringing call waiting for an answer.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingCall {
    /// The call as the server announced it.
    pub call: CallView,
    /// Display details of the caller.
    pub caller: CallerProfile,
    /// Group name, for group calls.
    pub conversation_name: Option<String>,
}

/// Drives the local side of one call at a time.
#[derive(Debug)]
pub struct CallController {
    self_id: UserId,
    sink: Arc<dyn SignalSink>,
    state: SessionState,
    session: Option<ActiveSession>,
    incoming: Option<IncomingCall>,
    cancel_requested: bool,
}

impl CallController {
    /// Idle controller for `self_id`, sending requests through `sink`.
    pub fn new(self_id: UserId, sink: Arc<dyn SignalSink>) -> Self {
        Self {
            self_id,
            sink,
            state: SessionState::Idle,
            session: None,
            incoming: None,
            cancel_requested: false,
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The call we placed or joined, if any.
    pub fn session(&self) -> Option<&ActiveSession> {
        self.session.as_ref()
    }

    /// The call ringing for us, if any.
    pub fn incoming(&self) -> Option<&IncomingCall> {
        self.incoming.as_ref()
    }

    /// Place a call. Only possible while idle.
    pub async fn initiate(
        &mut self,
        conversation_id: ConversationId,
        participant_ids: Vec<UserId>,
        media_kind: MediaKind,
        is_group: bool,
    ) -> AppResult<()> {
        if self.state != SessionState::Idle {
            return Err(AppError::already_in_call());
        }
        self.sink
            .send(ClientRequest::InitiateCall(InitiateCallRequest {
                conversation_id,
                participant_ids,
                media_kind,
                is_group,
            }))
            .await?;

        self.session = Some(ActiveSession {
            call_id: None,
            conversation_id,
            caller_id: self.self_id,
            media_kind,
            is_group,
            remotes: Vec::new(),
        });
        self.cancel_requested = false;
        self.state = SessionState::Outgoing;
        Ok(())
    }

    /// Answer the ringing call. Returns the session to negotiate media for.
    pub async fn accept(&mut self) -> AppResult<ActiveSession> {
        let Some(incoming) = self.incoming.take() else {
            return Err(AppError::validation("No incoming call to accept"));
        };
        let call = &incoming.call;
        if let Err(e) = self.sink.send(ClientRequest::AcceptCall { call_id: call.id }).await {
            self.incoming = Some(incoming);
            return Err(e);
        }

        let session = ActiveSession {
            call_id: Some(call.id),
            conversation_id: call.conversation_id,
            caller_id: call.caller_id,
            media_kind: call.media_kind,
            is_group: call.is_group,
            remotes: std::iter::once(call.caller_id)
                .chain(call.accepted_by.iter().copied())
                .filter(|p| *p != self.self_id)
                .collect(),
        };
        self.session = Some(session.clone());
        self.state = SessionState::Connected;
        Ok(session)
    }

    /// Decline the ringing call.
    pub async fn reject(&mut self) -> AppResult<()> {
        let Some(incoming) = self.incoming.take() else {
            return Err(AppError::validation("No incoming call to reject"));
        };
        self.state = SessionState::Idle;
        self.sink
            .send(ClientRequest::RejectCall {
                call_id: incoming.call.id,
            })
            .await
    }

    /// Hang up the current call.
    pub async fn end(&mut self) -> AppResult<()> {
        let Some(call_id) = self.session.as_ref().and_then(|s| s.call_id) else {
            return Err(AppError::validation("No call to end"));
        };
        self.state = SessionState::Ended;
        self.sink.send(ClientRequest::EndCall { call_id }).await
    }

    /// Abort our outgoing call.
    ///
    /// If the server has not acknowledged the call yet, the cancel is sent
    /// as soon as it does.
    pub async fn cancel(&mut self) -> AppResult<()> {
        if self.state != SessionState::Outgoing {
            return Err(AppError::validation("No outgoing call to cancel"));
        }
        let call_id = self.session.as_ref().and_then(|s| s.call_id);
        self.clear();
        match call_id {
            Some(call_id) => self.sink.send(ClientRequest::CancelCall { call_id }).await,
            None => {
                self.cancel_requested = true;
                Ok(())
            }
        }
    }

    /// Leave `ended` for `idle`.
    pub fn reset(&mut self) {
        if self.state == SessionState::Ended {
            self.clear();
        }
    }

    /// Apply a server event. Returns the new state if it changed.
    pub async fn handle_event(&mut self, event: &ServerEvent) -> AppResult<Option<SessionState>> {
        let before = self.state;
        match event {
            ServerEvent::CallInitiated { call } if call.caller_id == self.self_id => {
                if self.cancel_requested {
                    self.cancel_requested = false;
                    self.sink
                        .send(ClientRequest::CancelCall { call_id: call.id })
                        .await?;
                } else if let Some(session) = self.session.as_mut() {
                    if self.state == SessionState::Outgoing && session.call_id.is_none() {
                        session.call_id = Some(call.id);
                    }
                }
            }
            ServerEvent::IncomingCall {
                call,
                caller,
                conversation_name,
            } => {
                if self.state == SessionState::Idle {
                    self.incoming = Some(IncomingCall {
                        call: call.clone(),
                        caller: caller.clone(),
                        conversation_name: conversation_name.clone(),
                    });
                    self.state = SessionState::Incoming;
                } else {
                    info!(call_id = %call.id, "Busy, declining incoming call");
                    self.sink
                        .send(ClientRequest::RejectCall { call_id: call.id })
                        .await?;
                }
            }
            ServerEvent::Accepted { call_id, user_id } => {
                if self.is_current(*call_id) {
                    self.joined(*user_id);
                    if self.state == SessionState::Outgoing {
                        self.state = SessionState::Connected;
                    }
                }
            }
            ServerEvent::ParticipantJoined { call_id, user_id } => {
                if self.is_current(*call_id) {
                    self.joined(*user_id);
                }
            }
            ServerEvent::Rejected { call_id, .. } => {
                let one_to_one = self.session.as_ref().is_some_and(|s| !s.is_group);
                if one_to_one && self.is_current(*call_id) {
                    self.state = SessionState::Ended;
                }
            }
            ServerEvent::Ended { call_id, .. } => {
                if self.is_current(*call_id) || self.is_incoming(*call_id) {
                    self.incoming = None;
                    self.state = SessionState::Ended;
                }
            }
            ServerEvent::Cancelled { call_id } => {
                if self.is_incoming(*call_id) {
                    self.clear();
                }
            }
            ServerEvent::Busy { .. } => {
                if self.state == SessionState::Outgoing {
                    self.state = SessionState::Ended;
                }
            }
            ServerEvent::Error { code, call_id, .. } => {
                let ours = match call_id {
                    Some(id) => self.is_current(*id),
                    None => self.state == SessionState::Outgoing,
                };
                if ours && matches!(self.state, SessionState::Outgoing | SessionState::Connected) {
                    debug!(code = %code, "Call request failed");
                    self.clear();
                }
            }
            _ => {}
        }
        Ok((self.state != before).then_some(self.state))
    }

    fn joined(&mut self, user_id: UserId) {
        if user_id == self.self_id {
            return;
        }
        if let Some(session) = self.session.as_mut() {
            if !session.remotes.contains(&user_id) {
                session.remotes.push(user_id);
            }
        }
    }

    fn is_current(&self, call_id: CallId) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.call_id == Some(call_id))
    }

    fn is_incoming(&self, call_id: CallId) -> bool {
        self.incoming.as_ref().is_some_and(|i| i.call.id == call_id)
    }

    fn clear(&mut self) {
        self.state = SessionState::Idle;
        self.session = None;
        self.incoming = None;
    }
}
