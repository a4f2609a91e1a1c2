//! # callhub-client
//!
//! Client side of CallHub calls:
//!
//! - [`NegotiationEngine`] drives one peer link per remote party, handles
//!   offers, answers and candidates, and resolves offer glare
//! - [`CallController`] tracks the local call session and auto-rejects
//!   incoming calls while busy
//! - [`CallSession`] wires the two together with local media capture
//! - [`WsSignalingClient`] speaks the signaling protocol over WebSocket
//!
//! Media capture and the peer-connection implementation sit behind the
//! [`MediaDevices`] and [`PeerConnectionFactory`] traits.

pub mod call;
pub mod config;
pub mod engine;
pub mod media;
pub mod peer;
pub mod session;
pub mod timer;
pub mod transport;

pub use call::CallSession;
pub use config::{EngineConfig, GlareStrategy};
pub use engine::NegotiationEngine;
pub use media::{LocalMedia, MediaControls, MediaDevices};
pub use peer::{PeerConnection, PeerConnectionFactory, PeerEvent, PeerLink, PeerState};
pub use session::{ActiveSession, CallController, IncomingCall, SessionState};
pub use timer::DurationTicker;
pub use transport::{SignalSink, WsSignalingClient};
