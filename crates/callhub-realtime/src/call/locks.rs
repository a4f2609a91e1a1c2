//! Per-call mutual exclusion.
//!
//! Operations on the same call serialize; operations on different calls
//! never contend. Entries are dropped once nobody holds or awaits them.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use callhub_core::types::CallId;

/// Lazily created mutex per call.
#[derive(Debug, Default)]
pub struct CallLocks {
    locks: Arc<DashMap<CallId, Arc<Mutex<()>>>>,
}

/// Held while a call's state is read and written.
#[derive(Debug)]
pub struct CallGuard {
    call_id: CallId,
    locks: Arc<DashMap<CallId, Arc<Mutex<()>>>>,
    _guard: OwnedMutexGuard<()>,
}

impl CallLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `call_id`.
    pub async fn lock(&self, call_id: CallId) -> CallGuard {
        let mutex = self
            .locks
            .entry(call_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = mutex.lock_owned().await;
        CallGuard {
            call_id,
            locks: Arc::clone(&self.locks),
            _guard: guard,
        }
    }

    /// Number of calls with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no lock entry exists.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        // Map plus this guard: nobody else is waiting.
        self.locks
            .remove_if(&self.call_id, |_, mutex| Arc::strong_count(mutex) <= 2);
    }
}
