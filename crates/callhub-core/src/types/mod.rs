//! Core type definitions used across the CallHub workspace.

pub mod call;
pub mod id;

pub use call::{CallStatus, EndReason, MediaKind, SignalKind};
pub use id::*;
