//! Route handlers.

pub mod call;
pub mod health;
pub mod ws;
