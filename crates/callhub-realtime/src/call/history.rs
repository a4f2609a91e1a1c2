//! Call-history recording after a call terminates.

use std::sync::Arc;

use tracing::{debug, warn};

use callhub_core::protocol::ServerEvent;
use callhub_database::CallHistorySink;
use callhub_entity::call::{Call, summarize};

use crate::connection::ConnectionManager;

/// Appends a summary for every terminated call and tells its parties.
#[derive(Debug, Clone)]
pub struct HistoryRecorder {
    sink: Arc<dyn CallHistorySink>,
    connections: Arc<ConnectionManager>,
}

impl HistoryRecorder {
    /// Create a recorder writing to `sink`.
    pub fn new(sink: Arc<dyn CallHistorySink>, connections: Arc<ConnectionManager>) -> Self {
        Self { sink, connections }
    }

    /// Fire and forget: the caller never waits for the sink.
    pub fn record(&self, call: &Call) {
        let entry = summarize(call);
        let parties = call.parties();
        let recorder = self.clone();

        tokio::spawn(async move {
            if let Err(e) = recorder.sink.append(&entry).await {
                warn!(call_id = %entry.call_id, error = %e, "Failed to append call history");
                return;
            }
            debug!(call_id = %entry.call_id, text = %entry.text, "Call history appended");

            let event = ServerEvent::CallHistory {
                conversation_id: entry.conversation_id,
                entry,
            };
            for user_id in parties {
                recorder.connections.send_to_user(user_id, event.clone()).await;
            }
        });
    }
}
