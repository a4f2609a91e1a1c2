//! Call session configuration.

use serde::{Deserialize, Serialize};

/// Call session manager settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallConfig {
    /// Seconds a call may stay ringing before it is cancelled as missed.
    /// `0` disables the ring timeout.
    #[serde(default = "default_ring_timeout")]
    pub ring_timeout_seconds: u64,
    /// Maximum number of calls returned by a conversation history listing.
    #[serde(default = "default_history_limit")]
    pub history_limit: u32,
    /// Drop relayed signals whose sender or target is not a party of the call.
    #[serde(default)]
    pub verify_relay_membership: bool,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            ring_timeout_seconds: default_ring_timeout(),
            history_limit: default_history_limit(),
            verify_relay_membership: false,
        }
    }
}

fn default_ring_timeout() -> u64 {
    45
}

fn default_history_limit() -> u32 {
    50
}
