//! # callhub-core
//!
//! Core crate for CallHub. Contains configuration schemas, typed
//! identifiers, the call status/media enums with their transition table,
//! the WebSocket wire protocol shared by server and client, and the
//! unified error system.
//!
//! This crate has **no** internal dependencies on other CallHub crates.

pub mod config;
pub mod error;
pub mod protocol;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
