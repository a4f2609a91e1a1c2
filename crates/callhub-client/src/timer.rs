//! Call duration ticker for display.
//!
//! Counts whole seconds since the call connected. The authoritative
//! duration is computed by the server when the call ends.

use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Ticks once per second until stopped or dropped.
#[derive(Debug)]
pub struct DurationTicker {
    seconds: watch::Receiver<u64>,
    stop: CancellationToken,
}

impl DurationTicker {
    /// Start counting from zero.
    pub fn start() -> Self {
        let (tx, rx) = watch::channel(0u64);
        let stop = CancellationToken::new();
        let token = stop.clone();

        tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        tx.send_modify(|s| *s += 1);
                    }
                }
            }
        });

        Self { seconds: rx, stop }
    }

    /// Seconds elapsed so far.
    pub fn seconds(&self) -> u64 {
        *self.seconds.borrow()
    }

    /// Elapsed time as `m:ss`.
    pub fn display(&self) -> String {
        let secs = self.seconds();
        format!("{}:{:02}", secs / 60, secs % 60)
    }

    /// Receiver notified on every tick.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.seconds.clone()
    }

    /// Stop ticking.
    pub fn stop(&self) {
        self.stop.cancel();
    }
}

impl Drop for DurationTicker {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}
