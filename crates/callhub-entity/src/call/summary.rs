//! Conversation-history entries synthesized from terminated calls.

use callhub_core::protocol::CallSummary;
use callhub_core::types::{CallStatus, MediaKind};

use super::model::Call;

/// Label for a call's final status as shown in conversation history.
pub fn format_status(status: CallStatus) -> &'static str {
    match status {
        CallStatus::Ended | CallStatus::Ongoing => "Ended",
        CallStatus::Missed | CallStatus::Pending | CallStatus::Ringing => "Missed",
        CallStatus::Rejected => "Declined",
        CallStatus::Busy => "Busy",
    }
}

/// `m:ss`, minutes unbounded.
pub fn format_duration(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Build the history entry for a call.
pub fn summarize(call: &Call) -> CallSummary {
    let media = match call.media_kind {
        MediaKind::Video => "Video",
        MediaKind::Audio => "Audio",
    };
    let duration = call.duration_seconds.unwrap_or(0);
    let mut text = format!("{media} call - {}", format_status(call.status));
    if duration > 0 {
        text.push_str(&format!(" ({})", format_duration(duration)));
    }

    CallSummary {
        call_id: call.id,
        conversation_id: call.conversation_id,
        media_kind: call.media_kind,
        status: call.status,
        duration_seconds: duration,
        started_at: call.started_at,
        ended_at: call.ended_at,
        text,
    }
}
