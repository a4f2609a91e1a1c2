//! Inbound message validation.

pub mod validator;

pub use validator::validate_inbound;
