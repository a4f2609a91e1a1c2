//! Events sent by the server to clients.
//!
//! The set is closed: adding a variant forces every `match` at the
//! transport boundary and in the client to handle it.

use serde::{Deserialize, Serialize};

use super::view::{CallSummary, CallView, CallerProfile};
use crate::types::{CallId, CallStatus, ConversationId, EndReason, SignalKind, UserId};

/// Messages sent by the server to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Acknowledges `initiate-call` to the caller.
    CallInitiated {
        call: CallView,
    },
    /// A call is ringing for the recipient.
    IncomingCall {
        call: CallView,
        caller: CallerProfile,
        /// Group name for group calls.
        conversation_name: Option<String>,
    },
    /// A participant answered (sent to the caller).
    Accepted {
        call_id: CallId,
        user_id: UserId,
    },
    /// A 1:1 call was declined (sent to the caller).
    Rejected {
        call_id: CallId,
        user_id: UserId,
    },
    /// Someone joined a call you are on.
    ParticipantJoined {
        call_id: CallId,
        user_id: UserId,
    },
    /// One group participant declined; the call continues.
    ParticipantRejected {
        call_id: CallId,
        user_id: UserId,
    },
    /// The call is over for you.
    Ended {
        call_id: CallId,
        reason: EndReason,
        duration_seconds: i64,
    },
    /// The caller aborted before anyone answered.
    Cancelled {
        call_id: CallId,
    },
    /// Every participant is in another call; nothing was created.
    Busy {
        busy_participants: Vec<UserId>,
    },
    /// Some participants are in another call; the call rings the rest.
    SomeBusy {
        call_id: CallId,
        busy_participants: Vec<UserId>,
    },
    /// A request failed.
    Error {
        code: String,
        message: String,
        call_id: Option<CallId>,
    },
    /// Relayed negotiation message.
    Signal {
        call_id: CallId,
        sender_id: UserId,
        target_id: UserId,
        kind: SignalKind,
        payload: serde_json::Value,
    },
    /// Generic status change broadcast to the whole party.
    StatusUpdate {
        call_id: CallId,
        status: CallStatus,
        /// User whose action caused the change.
        user_id: Option<UserId>,
        /// Parties currently joined (caller plus acceptors).
        parties: Vec<UserId>,
    },
    /// A user came online or went offline.
    PresenceChanged {
        user_id: UserId,
        online: bool,
    },
    /// Answer to `active-call-status`.
    ActiveCallStatus {
        user_id: UserId,
        in_call: bool,
        call_id: Option<CallId>,
    },
    /// A call-history entry was appended to the conversation.
    CallHistory {
        conversation_id: ConversationId,
        entry: CallSummary,
    },
    /// Heartbeat ping.
    Ping {
        timestamp: i64,
    },
}

impl ServerEvent {
    /// Wire name of the event, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CallInitiated { .. } => "call-initiated",
            Self::IncomingCall { .. } => "incoming-call",
            Self::Accepted { .. } => "accepted",
            Self::Rejected { .. } => "rejected",
            Self::ParticipantJoined { .. } => "participant-joined",
            Self::ParticipantRejected { .. } => "participant-rejected",
            Self::Ended { .. } => "ended",
            Self::Cancelled { .. } => "cancelled",
            Self::Busy { .. } => "busy",
            Self::SomeBusy { .. } => "some-busy",
            Self::Error { .. } => "error",
            Self::Signal { .. } => "signal",
            Self::StatusUpdate { .. } => "status-update",
            Self::PresenceChanged { .. } => "presence-changed",
            Self::ActiveCallStatus { .. } => "active-call-status",
            Self::CallHistory { .. } => "call-history",
            Self::Ping { .. } => "ping",
        }
    }

    /// Build an `error` event from an application error.
    pub fn error(err: &crate::AppError, call_id: Option<CallId>) -> Self {
        Self::Error {
            code: err.kind.code().to_string(),
            message: err.message.clone(),
            call_id,
        }
    }

    /// Call this event refers to, if any.
    pub fn call_id(&self) -> Option<CallId> {
        match self {
            Self::CallInitiated { call } | Self::IncomingCall { call, .. } => Some(call.id),
            Self::Accepted { call_id, .. }
            | Self::Rejected { call_id, .. }
            | Self::ParticipantJoined { call_id, .. }
            | Self::ParticipantRejected { call_id, .. }
            | Self::Ended { call_id, .. }
            | Self::Cancelled { call_id }
            | Self::SomeBusy { call_id, .. }
            | Self::Signal { call_id, .. }
            | Self::StatusUpdate { call_id, .. } => Some(*call_id),
            Self::Error { call_id, .. } | Self::ActiveCallStatus { call_id, .. } => *call_id,
            Self::CallHistory { entry, .. } => Some(entry.call_id),
            Self::Busy { .. } | Self::PresenceChanged { .. } | Self::Ping { .. } => None,
        }
    }
}
