//! WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{info, warn};

use callhub_core::protocol::encode_event;
use callhub_core::types::UserId;

use crate::state::AppState;

/// Query parameters of the upgrade request.
///
/// The user is authenticated upstream; the gateway forwards the id.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Authenticated user opening the connection.
    pub user_id: UserId,
}

/// GET /ws?user_id={id}
pub async fn ws_upgrade(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
) -> Response {
    ws.on_upgrade(move |socket| handle_ws_connection(state, query.user_id, socket))
}

/// Handles an established WebSocket connection.
async fn handle_ws_connection(state: AppState, user_id: UserId, socket: WebSocket) {
    let engine = state.realtime;
    let (mut ws_tx, mut ws_rx) = socket.split();

    let (handle, mut outbound_rx) = engine.connect(user_id).await;
    let conn_id = handle.id;
    let closed = handle.closed();
    let heartbeat = engine.spawn_heartbeat(Arc::clone(&handle));

    info!(conn_id = %conn_id, user_id = %user_id, "WebSocket connection established");

    let outbound_task = tokio::spawn(async move {
        while let Some(event) = outbound_rx.recv().await {
            let text = match encode_event(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!(event = event.kind(), error = %e, "Failed to encode event");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    loop {
        tokio::select! {
            _ = closed.cancelled() => {
                info!(conn_id = %conn_id, "Connection closed by server");
                break;
            }
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    engine.handle_inbound(&conn_id, text.as_str()).await;
                }
                Some(Ok(Message::Pong(_))) => handle.record_pong(),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(conn_id = %conn_id, error = %e, "WebSocket error");
                    break;
                }
            }
        }
    }

    heartbeat.abort();
    outbound_task.abort();
    engine.disconnect(&conn_id).await;

    info!(conn_id = %conn_id, user_id = %user_id, "WebSocket connection closed");
}
