//! Response DTOs.

use serde::{Deserialize, Serialize};

use callhub_core::types::{CallId, UserId};

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Liveness probe body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Readiness probe body: store reachability plus signaling load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedHealthResponse {
    /// `"ok"` or `"degraded"`.
    pub status: String,
    /// `"connected"`, `"degraded"` or `"unavailable"`.
    pub database: String,
    pub ws_connections: usize,
    pub online_users: usize,
}

/// Whether a user currently holds a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveCallResponse {
    /// Queried user.
    pub user_id: UserId,
    /// Whether the user is a party to a live call.
    pub in_call: bool,
    /// The call, when `in_call`.
    pub call_id: Option<CallId>,
}
