//! Requests sent by clients to the signaling server.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::types::{CallId, ConversationId, MediaKind, SignalKind, UserId};

/// Body of an `initiate-call` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct InitiateCallRequest {
    /// Conversation the call belongs to.
    pub conversation_id: ConversationId,
    /// Users to ring. The caller is excluded even if listed.
    #[validate(length(min = 1, max = 64, message = "A call needs between 1 and 64 participants"))]
    pub participant_ids: Vec<UserId>,
    /// Audio or video.
    pub media_kind: MediaKind,
    /// Group call flag.
    #[serde(default)]
    pub is_group: bool,
}

/// Messages sent by the client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientRequest {
    /// Start a call.
    InitiateCall(InitiateCallRequest),
    /// Answer a ringing call.
    AcceptCall {
        /// Call being answered.
        call_id: CallId,
    },
    /// Decline a ringing call.
    RejectCall {
        /// Call being declined.
        call_id: CallId,
    },
    /// Hang up.
    EndCall {
        /// Call being left.
        call_id: CallId,
    },
    /// Abort an outgoing call before anyone answered.
    CancelCall {
        /// Call being aborted.
        call_id: CallId,
    },
    /// Forward an opaque negotiation message to one party.
    Signal {
        /// Call the negotiation belongs to.
        call_id: CallId,
        /// Receiving user.
        target_id: UserId,
        /// Offer, answer or ICE candidate.
        kind: SignalKind,
        /// Opaque payload, forwarded verbatim.
        payload: serde_json::Value,
    },
    /// Ask whether a user currently holds an active call.
    ActiveCallStatus {
        /// User to query; defaults to the requester.
        #[serde(default)]
        user_id: Option<UserId>,
    },
    /// Pong response to server ping.
    Pong {
        /// Echoed timestamp.
        timestamp: i64,
    },
}

impl ClientRequest {
    /// Wire name of the request, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InitiateCall(_) => "initiate-call",
            Self::AcceptCall { .. } => "accept-call",
            Self::RejectCall { .. } => "reject-call",
            Self::EndCall { .. } => "end-call",
            Self::CancelCall { .. } => "cancel-call",
            Self::Signal { .. } => "signal",
            Self::ActiveCallStatus { .. } => "active-call-status",
            Self::Pong { .. } => "pong",
        }
    }
}
