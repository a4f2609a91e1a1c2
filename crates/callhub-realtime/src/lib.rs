//! # callhub-realtime
//!
//! Real-time signaling engine for CallHub. Provides:
//!
//! - WebSocket connection management with ping/pong heartbeat
//! - Presence registry (one live connection per user)
//! - Active-call pointers enforcing one call per user
//! - The call session state machine with per-call locking
//! - A pass-through signal relay for peer negotiation
//!
//! Presence and active-call state live in process. A deployment must run a
//! single signaling instance, or route every party of a call to the same
//! one, unless both registries are replaced by shared implementations.

pub mod call;
pub mod connection;
pub mod message;
pub mod presence;
pub mod server;

pub use call::{CallSessionManager, SignalRelay};
pub use connection::ConnectionManager;
pub use presence::PresenceRegistry;
pub use server::RealtimeEngine;
