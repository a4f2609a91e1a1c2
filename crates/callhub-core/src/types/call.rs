//! Call lifecycle enumerations and the status transition table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Media carried by a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Microphone only.
    Audio,
    /// Microphone and camera.
    Video,
}

impl MediaKind {
    /// Return the media kind as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    /// Whether a camera track must be captured.
    pub fn wants_video(&self) -> bool {
        matches!(self, Self::Video)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            _ => Err(AppError::validation(format!("Invalid media kind: '{s}'"))),
        }
    }
}

/// Lifecycle status of a call.
///
/// ```text
/// pending ──► ringing ──► ongoing ──► ended
///    │           │
///    └───────────┴──► missed | rejected | busy | ended
/// ```
///
/// No transition moves backward or leaves a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    /// Record created, nobody notified yet.
    Pending,
    /// Participants have been notified; nobody answered.
    Ringing,
    /// At least one participant accepted.
    Ongoing,
    /// Finished normally.
    Ended,
    /// Nobody answered before the caller cancelled.
    Missed,
    /// Declined by the participants.
    Rejected,
    /// Every participant was in another call.
    Busy,
}

impl CallStatus {
    /// Check if the call can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Ended | Self::Missed | Self::Rejected | Self::Busy
        )
    }

    /// Check whether `self → next` is a legal move.
    pub fn can_transition_to(&self, next: CallStatus) -> bool {
        use CallStatus::*;
        match self {
            Pending => matches!(next, Ringing | Ended | Missed | Rejected | Busy),
            Ringing => matches!(next, Ongoing | Ended | Missed | Rejected | Busy),
            Ongoing => matches!(next, Ended),
            Ended | Missed | Rejected | Busy => false,
        }
    }

    /// Return the status as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ringing => "ringing",
            Self::Ongoing => "ongoing",
            Self::Ended => "ended",
            Self::Missed => "missed",
            Self::Rejected => "rejected",
            Self::Busy => "busy",
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CallStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "ringing" => Ok(Self::Ringing),
            "ongoing" => Ok(Self::Ongoing),
            "ended" => Ok(Self::Ended),
            "missed" => Ok(Self::Missed),
            "rejected" => Ok(Self::Rejected),
            "busy" => Ok(Self::Busy),
            _ => Err(AppError::validation(format!("Invalid call status: '{s}'"))),
        }
    }
}

/// Why a call ended, as reported in the `ended` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndReason {
    /// A party hung up.
    Ended,
    /// Nobody answered.
    Missed,
    /// Declined.
    Rejected,
    /// Participants busy.
    Busy,
    /// Aborted by a failure.
    Error,
}

/// Kind of an opaque negotiation message passed through the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    /// Session description offer.
    Offer,
    /// Session description answer.
    Answer,
    /// Trickled ICE candidate.
    IceCandidate,
}
