//! # callhub-api
//!
//! HTTP API layer for CallHub built on Axum.
//!
//! Provides the `/ws` signaling upgrade, health endpoints, call-history and
//! active-call queries, request logging and CORS middleware, and the
//! mapping from `AppError` to HTTP responses.

pub mod app;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::build_app;
pub use state::AppState;
