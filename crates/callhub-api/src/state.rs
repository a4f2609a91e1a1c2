//! Application state shared across all handlers and middleware.

use std::sync::Arc;
use std::time::Instant;

use callhub_core::config::AppConfig;
use callhub_database::StoreManager;
use callhub_realtime::RealtimeEngine;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Call store, history sink and directory
    pub stores: StoreManager,
    /// WebSocket realtime engine
    pub realtime: RealtimeEngine,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Assemble state from already-initialized subsystems.
    pub fn new(config: AppConfig, stores: StoreManager, realtime: RealtimeEngine) -> Self {
        Self {
            config: Arc::new(config),
            stores,
            realtime,
            started_at: Instant::now(),
        }
    }
}
