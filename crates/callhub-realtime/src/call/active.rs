//! Active-call pointers: at most one non-terminal call per user.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use callhub_core::types::{CallId, UserId};

/// Per-user marker of the call the user is currently a party to.
#[async_trait]
pub trait ActiveCallRegistry: Send + Sync + std::fmt::Debug + 'static {
    /// Point `user_id` at `call_id` unless it already points elsewhere.
    ///
    /// Succeeds if the user was free or already on this call; otherwise
    /// returns the call the user is on.
    async fn try_claim(&self, user_id: UserId, call_id: CallId) -> Result<(), CallId>;

    /// Call `user_id` is on, if any.
    async fn current(&self, user_id: UserId) -> Option<CallId>;

    /// Clear the pointer only if it still points at `call_id`.
    async fn release(&self, user_id: UserId, call_id: CallId) -> bool;
}

/// Active-call registry held in a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryActiveCalls {
    pointers: DashMap<UserId, CallId>,
}

impl InMemoryActiveCalls {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of users currently on a call.
    pub fn len(&self) -> usize {
        self.pointers.len()
    }

    /// Whether nobody is on a call.
    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty()
    }
}

#[async_trait]
impl ActiveCallRegistry for InMemoryActiveCalls {
    async fn try_claim(&self, user_id: UserId, call_id: CallId) -> Result<(), CallId> {
        match self.pointers.entry(user_id) {
            Entry::Vacant(slot) => {
                slot.insert(call_id);
                Ok(())
            }
            Entry::Occupied(slot) if *slot.get() == call_id => Ok(()),
            Entry::Occupied(slot) => Err(*slot.get()),
        }
    }

    async fn current(&self, user_id: UserId) -> Option<CallId> {
        self.pointers.get(&user_id).map(|entry| *entry.value())
    }

    async fn release(&self, user_id: UserId, call_id: CallId) -> bool {
        self.pointers
            .remove_if(&user_id, |_, current| *current == call_id)
            .is_some()
    }
}
