//! Call query handlers.

use axum::Json;
use axum::extract::{Path, State};

use callhub_core::protocol::CallView;
use callhub_core::types::{ConversationId, UserId};

use crate::dto::response::{ActiveCallResponse, ApiResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/conversations/{id}/calls
///
/// Most recent calls of the conversation, newest first.
pub async fn list_conversation_calls(
    State(state): State<AppState>,
    Path(conversation_id): Path<ConversationId>,
) -> Result<Json<ApiResponse<Vec<CallView>>>, ApiError> {
    let calls = state.realtime.calls.history(conversation_id).await?;
    let views = calls.iter().map(CallView::from).collect();
    Ok(Json(ApiResponse::ok(views)))
}

/// GET /api/users/{id}/active-call
pub async fn active_call(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Json<ApiResponse<ActiveCallResponse>> {
    let call_id = state.realtime.calls.active_call(user_id).await;
    Json(ApiResponse::ok(ActiveCallResponse {
        user_id,
        in_call: call_id.is_some(),
        call_id,
    }))
}
