//! # callhub-database
//!
//! Durable collaborators consumed by the call session manager: the call
//! record store, the conversation-history sink, and the directory used for
//! display names. Each has a PostgreSQL implementation and an in-memory one;
//! [`StoreManager`] picks the provider from configuration.

pub mod connection;
pub mod manager;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod traits;

pub use connection::DatabasePool;
pub use manager::StoreManager;
pub use traits::{CallHistorySink, CallStore, Directory};
