//! Peer links: one media connection per remote party.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use callhub_core::result::AppResult;
use callhub_core::types::UserId;

use crate::media::LocalMedia;

/// Negotiation state of a peer link.
///
/// ```text
/// new ──► connecting ──► connected
///  │           │             │
///  └──► failed ◄┘             │
///  (any) ─────────────────────┴──► closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PeerState {
    /// Created, no description exchanged.
    New = 0,
    /// Offer or answer in flight.
    Connecting = 1,
    /// Media flowing.
    Connected = 2,
    /// Gave up before connecting; not retried.
    Failed = 3,
    /// Torn down.
    Closed = 4,
}

impl PeerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::New,
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Failed,
            _ => Self::Closed,
        }
    }

    /// Check whether `self → next` is a legal move.
    pub fn can_transition_to(&self, next: PeerState) -> bool {
        use PeerState::*;
        match self {
            New => matches!(next, Connecting | Failed | Closed),
            Connecting => matches!(next, Connected | Failed | Closed),
            Connected | Failed => matches!(next, Closed),
            Closed => false,
        }
    }

    /// Still waiting to connect.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::New | Self::Connecting)
    }
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Something a peer connection reports back to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    /// A local ICE candidate to trickle to the remote party.
    IceCandidate {
        /// Remote party of the connection.
        remote: UserId,
        /// Opaque candidate.
        candidate: Value,
    },
    /// Media is flowing.
    Connected {
        /// Remote party of the connection.
        remote: UserId,
    },
    /// The connection failed.
    Failed {
        /// Remote party of the connection.
        remote: UserId,
    },
}

/// A media connection to one remote party.
///
/// Descriptions and candidates are opaque JSON values.
#[async_trait]
pub trait PeerConnection: Send + Sync + fmt::Debug + 'static {
    /// Create an offer and install it as the local description.
    async fn create_offer(&self) -> AppResult<Value>;

    /// Create an answer and install it as the local description.
    async fn create_answer(&self) -> AppResult<Value>;

    /// Apply the remote party's offer or answer.
    async fn set_remote_description(&self, description: Value) -> AppResult<()>;

    /// Apply a trickled remote candidate.
    async fn add_ice_candidate(&self, candidate: Value) -> AppResult<()>;

    /// Release the connection.
    async fn close(&self);
}

/// Builds peer connections carrying the local media.
#[async_trait]
pub trait PeerConnectionFactory: Send + Sync + fmt::Debug + 'static {
    /// Connect to `remote`. Candidates and state changes are reported on
    /// `events`.
    async fn create(
        &self,
        remote: UserId,
        ice_servers: &[String],
        local: Arc<dyn LocalMedia>,
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> AppResult<Arc<dyn PeerConnection>>;
}

/// A peer connection plus its negotiation state.
#[derive(Debug)]
pub struct PeerLink {
    remote: UserId,
    connection: Arc<dyn PeerConnection>,
    state: AtomicU8,
}

impl PeerLink {
    /// Wrap a fresh connection in state `new`.
    pub fn new(remote: UserId, connection: Arc<dyn PeerConnection>) -> Self {
        Self {
            remote,
            connection,
            state: AtomicU8::new(PeerState::New as u8),
        }
    }

    /// Remote party.
    pub fn remote(&self) -> UserId {
        self.remote
    }

    /// Underlying connection.
    pub fn connection(&self) -> &Arc<dyn PeerConnection> {
        &self.connection
    }

    /// Current state.
    pub fn state(&self) -> PeerState {
        PeerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `next` if legal. Returns `false` if the move was refused.
    pub fn advance(&self, next: PeerState) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if !PeerState::from_u8(current).can_transition_to(next) {
                return false;
            }
            match self.state.compare_exchange(
                current,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Close the link. Only the first caller closes the connection.
    pub async fn close(&self) -> bool {
        if self.state.swap(PeerState::Closed as u8, Ordering::AcqRel) == PeerState::Closed as u8 {
            return false;
        }
        self.connection.close().await;
        true
    }
}
