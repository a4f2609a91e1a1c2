//! Signaling transport: how the client reaches the server.

use std::fmt;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use callhub_core::error::AppError;
use callhub_core::protocol::{ClientRequest, ServerEvent, decode_event, encode_request};
use callhub_core::result::AppResult;
use callhub_core::types::UserId;

/// Outbound half of a signaling connection.
#[async_trait]
pub trait SignalSink: Send + Sync + fmt::Debug + 'static {
    /// Queue a request for the server.
    async fn send(&self, request: ClientRequest) -> AppResult<()>;
}

/// Signaling connection over a WebSocket.
///
/// Server pings are answered automatically. Every decoded event, pings
/// included, is forwarded to the receiver returned by [`connect`].
///
/// [`connect`]: WsSignalingClient::connect
#[derive(Debug)]
pub struct WsSignalingClient {
    user_id: UserId,
    outbound: mpsc::UnboundedSender<ClientRequest>,
    shutdown: CancellationToken,
}

impl WsSignalingClient {
    /// Connect to `{base_url}/ws` as `user_id`.
    pub async fn connect(
        base_url: &str,
        user_id: UserId,
    ) -> AppResult<(Self, mpsc::UnboundedReceiver<ServerEvent>)> {
        let url = format!("{}/ws?user_id={user_id}", base_url.trim_end_matches('/'));
        let (stream, _) = connect_async(url.as_str()).await.map_err(|e| {
            AppError::service_unavailable(format!("Signaling connect to {url} failed: {e}"))
        })?;
        info!(url = %url, user_id = %user_id, "Signaling connected");

        let (mut ws_write, mut ws_read) = stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<ClientRequest>();
        let (events_tx, events_rx) = mpsc::unbounded_channel::<ServerEvent>();
        let shutdown = CancellationToken::new();

        let writer_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = writer_shutdown.cancelled() => break,
                    request = outbound_rx.recv() => {
                        let Some(request) = request else { break };
                        let text = match encode_request(&request) {
                            Ok(text) => text,
                            Err(e) => {
                                warn!(request = request.kind(), error = %e, "Failed to encode request");
                                continue;
                            }
                        };
                        if ws_write.send(Message::text(text)).await.is_err() {
                            break;
                        }
                    }
                }
            }
            let _ = ws_write.close().await;
        });

        let reader_shutdown = shutdown.clone();
        let pong = outbound.clone();
        tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    _ = reader_shutdown.cancelled() => break,
                    frame = ws_read.next() => frame,
                };
                match frame {
                    Some(Ok(Message::Text(text))) => match decode_event(text.as_str()) {
                        Ok(event) => {
                            if let ServerEvent::Ping { timestamp } = &event {
                                let _ = pong.send(ClientRequest::Pong {
                                    timestamp: *timestamp,
                                });
                            }
                            if events_tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(e) => debug!(error = %e, "Undecodable server frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Signaling socket error");
                        break;
                    }
                }
            }
            reader_shutdown.cancel();
            debug!("Signaling reader stopped");
        });

        Ok((
            Self {
                user_id,
                outbound,
                shutdown,
            },
            events_rx,
        ))
    }

    /// User this connection speaks for.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Whether the socket is still open.
    pub fn is_open(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    /// Close the socket.
    pub fn close(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for WsSignalingClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl SignalSink for WsSignalingClient {
    async fn send(&self, request: ClientRequest) -> AppResult<()> {
        if !self.is_open() {
            return Err(AppError::service_unavailable("Signaling connection closed"));
        }
        self.outbound
            .send(request)
            .map_err(|_| AppError::service_unavailable("Signaling connection closed"))
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::sync::Mutex;

    use super::*;

    /// Records every request instead of sending it.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub sent: Mutex<Vec<ClientRequest>>,
    }

    impl RecordingSink {
        pub fn take(&self) -> Vec<ClientRequest> {
            std::mem::take(&mut *self.sent.lock().expect("lock"))
        }
    }

    #[async_trait]
    impl SignalSink for RecordingSink {
        async fn send(&self, request: ClientRequest) -> AppResult<()> {
            self.sent.lock().expect("lock").push(request);
            Ok(())
        }
    }
}
