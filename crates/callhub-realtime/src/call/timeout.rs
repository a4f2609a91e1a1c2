//! Ring timeout watchdog.
//!
//! Each ringing call gets one sleeping task; leaving `ringing` aborts it.

use std::future::Future;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;

use callhub_core::types::CallId;

/// Pending ring timeouts keyed by call.
#[derive(Debug)]
pub struct RingTimeouts {
    after: Option<Duration>,
    tasks: DashMap<CallId, JoinHandle<()>>,
}

impl RingTimeouts {
    /// `seconds == 0` disables the watchdog.
    pub fn new(seconds: u64) -> Self {
        Self {
            after: (seconds > 0).then(|| Duration::from_secs(seconds)),
            tasks: DashMap::new(),
        }
    }

    /// Run `on_expiry` once the timeout elapses, unless disarmed first.
    pub fn arm<F>(&self, call_id: CallId, on_expiry: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Some(after) = self.after else {
            return;
        };
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            on_expiry.await;
        });
        if let Some(previous) = self.tasks.insert(call_id, task) {
            previous.abort();
        }
    }

    /// Cancel the timeout of a call that stopped ringing.
    pub fn disarm(&self, call_id: CallId) {
        if let Some((_, task)) = self.tasks.remove(&call_id) {
            task.abort();
        }
    }

    /// Forget a fired timeout without aborting the running task.
    pub fn forget(&self, call_id: CallId) {
        self.tasks.remove(&call_id);
    }

    /// Number of armed timeouts.
    pub fn armed(&self) -> usize {
        self.tasks.len()
    }
}
