//! Signal relay: forwards opaque negotiation messages between two parties.

use std::sync::Arc;

use tracing::{debug, warn};

use callhub_core::protocol::ServerEvent;
use callhub_core::types::{CallId, SignalKind, UserId};
use callhub_database::CallStore;

use crate::connection::ConnectionManager;

/// Stateless pass-through routed by presence.
///
/// Payloads are never inspected. A missing target drops the message
/// silently; the client's connect timeout surfaces the failure.
#[derive(Debug)]
pub struct SignalRelay {
    connections: Arc<ConnectionManager>,
    store: Arc<dyn CallStore>,
    verify_membership: bool,
}

impl SignalRelay {
    /// Create a relay. With `verify_membership`, both ends must be parties
    /// of a live call.
    pub fn new(
        connections: Arc<ConnectionManager>,
        store: Arc<dyn CallStore>,
        verify_membership: bool,
    ) -> Self {
        Self {
            connections,
            store,
            verify_membership,
        }
    }

    /// Forward one message. Returns `true` if it was queued to the target.
    pub async fn relay(
        &self,
        call_id: CallId,
        sender_id: UserId,
        target_id: UserId,
        kind: SignalKind,
        payload: serde_json::Value,
    ) -> bool {
        if self.verify_membership && !self.are_parties(call_id, sender_id, target_id).await {
            debug!(
                call_id = %call_id,
                sender_id = %sender_id,
                target_id = %target_id,
                "Signal dropped, not parties of a live call"
            );
            return false;
        }

        let delivered = self
            .connections
            .send_to_user(
                target_id,
                ServerEvent::Signal {
                    call_id,
                    sender_id,
                    target_id,
                    kind,
                    payload,
                },
            )
            .await;
        if !delivered {
            debug!(call_id = %call_id, target_id = %target_id, ?kind, "Signal dropped, target absent");
        }
        delivered
    }

    async fn are_parties(&self, call_id: CallId, sender_id: UserId, target_id: UserId) -> bool {
        match self.store.find_by_id(call_id).await {
            Ok(Some(call)) => {
                sender_id != target_id
                    && !call.status.is_terminal()
                    && call.is_party(sender_id)
                    && call.is_party(target_id)
            }
            Ok(None) => false,
            Err(e) => {
                warn!(call_id = %call_id, error = %e, "Relay membership check failed");
                false
            }
        }
    }
}
