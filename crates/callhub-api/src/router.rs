//! Route definitions for the CallHub HTTP API.
//!
//! REST queries are mounted under `/api`; the signaling socket lives at
//! `/ws`.

use axum::{Router, middleware as axum_middleware, routing::get};

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the router with all routes and the request-logging middleware.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(health_routes())
        .merge(call_routes());

    let ws_routes = Router::new().route("/ws", get(handlers::ws::ws_upgrade));

    Router::new()
        .nest("/api", api_routes)
        .merge(ws_routes)
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

/// Health endpoints
fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/detailed", get(handlers::health::health_detailed))
}

/// Call history and active-call queries
fn call_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/conversations/{id}/calls",
            get(handlers::call::list_conversation_calls),
        )
        .route("/users/{id}/active-call", get(handlers::call::active_call))
}
