//! Negotiation engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How simultaneous offers between two parties are avoided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GlareStrategy {
    /// For every pair the smaller user id sends the offer; the other waits.
    #[default]
    Deterministic,
    /// The caller offers at once; everyone else waits a grace period and
    /// offers only to parties that have not offered to them meanwhile.
    GracePeriod,
}

/// Client negotiation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Glare avoidance strategy.
    #[serde(default)]
    pub glare_strategy: GlareStrategy,
    /// Wait before a non-caller offers under [`GlareStrategy::GracePeriod`].
    #[serde(default = "default_grace_period")]
    pub grace_period_ms: u64,
    /// A peer link not connected after this long is marked failed.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// ICE server URLs handed to every peer connection.
    #[serde(default = "default_ice_servers")]
    pub ice_servers: Vec<String>,
}

impl EngineConfig {
    /// Grace period as a duration.
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Connect timeout as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            glare_strategy: GlareStrategy::default(),
            grace_period_ms: default_grace_period(),
            connect_timeout_seconds: default_connect_timeout(),
            ice_servers: default_ice_servers(),
        }
    }
}

fn default_grace_period() -> u64 {
    1000
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_ice_servers() -> Vec<String> {
    (0..5)
        .map(|i| match i {
            0 => "stun:stun.l.google.com:19302".to_string(),
            n => format!("stun:stun{n}.l.google.com:19302"),
        })
        .collect()
}
