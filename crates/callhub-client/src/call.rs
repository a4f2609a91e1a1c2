//! A whole client call: session controller, local media and negotiation
//! engine wired together.
//!
//! Local media is captured before anything is signaled. When capture fails
//! the action returns `MediaUnavailable` and no request leaves the client.

use std::sync::Arc;

use tracing::{debug, info};

use callhub_core::error::AppError;
use callhub_core::protocol::ServerEvent;
use callhub_core::result::AppResult;
use callhub_core::types::{CallId, ConversationId, MediaKind, UserId};

use crate::config::EngineConfig;
use crate::engine::NegotiationEngine;
use crate::media::{MediaControls, MediaDevices};
use crate::peer::PeerConnectionFactory;
use crate::session::{ActiveSession, CallController, SessionState};
use crate::transport::SignalSink;

/// The local user's side of calls, one at a time.
///
/// Feed every [`ServerEvent`] to [`handle_event`](Self::handle_event); the
/// session keeps the controller and the media engine in step.
#[derive(Debug)]
pub struct CallSession {
    self_id: UserId,
    controller: CallController,
    devices: Arc<dyn MediaDevices>,
    factory: Arc<dyn PeerConnectionFactory>,
    sink: Arc<dyn SignalSink>,
    config: EngineConfig,
    /// Captured for an outgoing call, handed to the engine on first answer.
    pending_media: Option<MediaControls>,
    engine: Option<Arc<NegotiationEngine>>,
}

impl CallSession {
    /// Idle session for `self_id`.
    pub fn new(
        self_id: UserId,
        sink: Arc<dyn SignalSink>,
        devices: Arc<dyn MediaDevices>,
        factory: Arc<dyn PeerConnectionFactory>,
        config: EngineConfig,
    ) -> Self {
        Self {
            self_id,
            controller: CallController::new(self_id, Arc::clone(&sink)),
            devices,
            factory,
            sink,
            config,
            pending_media: None,
            engine: None,
        }
    }

    /// The underlying session controller.
    pub fn controller(&self) -> &CallController {
        &self.controller
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.controller.state()
    }

    /// Media engine of the current call, once media negotiation started.
    pub fn engine(&self) -> Option<&Arc<NegotiationEngine>> {
        self.engine.as_ref()
    }

    /// Mute and camera controls for the captured media, if any.
    pub fn media(&self) -> Option<&MediaControls> {
        match &self.engine {
            Some(engine) => Some(engine.media()),
            None => self.pending_media.as_ref(),
        }
    }

    /// Capture media and place a call.
    pub async fn initiate(
        &mut self,
        conversation_id: ConversationId,
        participant_ids: Vec<UserId>,
        media_kind: MediaKind,
        is_group: bool,
    ) -> AppResult<()> {
        if self.controller.state() != SessionState::Idle {
            return Err(AppError::already_in_call());
        }
        let media = MediaControls::acquire(self.devices.as_ref(), media_kind).await?;

        if let Err(e) = self
            .controller
            .initiate(conversation_id, participant_ids, media_kind, is_group)
            .await
        {
            media.stop();
            return Err(e);
        }
        self.pending_media = Some(media);
        Ok(())
    }

    /// Capture media, answer the ringing call and start negotiating with
    /// the parties already on it.
    ///
    /// If capture fails the call keeps ringing and nothing is sent.
    pub async fn accept(&mut self) -> AppResult<ActiveSession> {
        let Some(incoming) = self.controller.incoming() else {
            return Err(AppError::validation("No incoming call to accept"));
        };
        let media_kind = incoming.call.media_kind;
        let media = MediaControls::acquire(self.devices.as_ref(), media_kind).await?;

        let session = match self.controller.accept().await {
            Ok(session) => session,
            Err(e) => {
                media.stop();
                return Err(e);
            }
        };
        let Some(call_id) = session.call_id else {
            media.stop();
            return Err(AppError::internal("Accepted call has no id"));
        };

        let engine = self.engine_for(call_id, session.caller_id, media);
        engine.start(session.remotes.iter().copied()).await;
        Ok(session)
    }

    /// Decline the ringing call.
    pub async fn reject(&mut self) -> AppResult<()> {
        self.controller.reject().await
    }

    /// Hang up and release local media.
    pub async fn end(&mut self) -> AppResult<()> {
        let result = self.controller.end().await;
        self.release().await;
        result
    }

    /// Abort our outgoing call and release local media.
    pub async fn cancel(&mut self) -> AppResult<()> {
        let result = self.controller.cancel().await;
        self.release().await;
        result
    }

    /// Leave `ended` for `idle`.
    pub fn reset(&mut self) {
        self.controller.reset();
    }

    /// Apply a server event to the controller and the media engine.
    ///
    /// Returns the new session state if it changed.
    pub async fn handle_event(&mut self, event: &ServerEvent) -> AppResult<Option<SessionState>> {
        let changed = self.controller.handle_event(event).await?;

        if let ServerEvent::Accepted { call_id, user_id } = event {
            self.answered(*call_id, *user_id).await;
        }

        if let Some(engine) = &self.engine {
            if engine.handle_event(event).await {
                debug!(call_id = %engine.call_id(), "Call media released");
                self.engine = None;
            }
        }

        if matches!(self.controller.state(), SessionState::Idle | SessionState::Ended) {
            self.release().await;
        }
        Ok(changed)
    }

    /// Someone answered our outgoing call.
    async fn answered(&mut self, call_id: CallId, user_id: UserId) {
        let ours = self
            .controller
            .session()
            .is_some_and(|s| s.caller_id == self.self_id && s.call_id == Some(call_id));
        if !ours {
            return;
        }

        let engine = match &self.engine {
            Some(engine) => Arc::clone(engine),
            None => {
                let Some(media) = self.pending_media.take() else {
                    debug!(call_id = %call_id, "No captured media for answered call");
                    return;
                };
                let engine = self.engine_for(call_id, self.self_id, media);
                info!(call_id = %call_id, "Starting call media");
                engine
            }
        };
        engine.participant_joined(user_id).await;
    }

    fn engine_for(
        &mut self,
        call_id: CallId,
        caller_id: UserId,
        media: MediaControls,
    ) -> Arc<NegotiationEngine> {
        let engine = NegotiationEngine::new(
            self.self_id,
            call_id,
            caller_id,
            self.config.clone(),
            Arc::clone(&self.sink),
            Arc::clone(&self.factory),
            media,
        );
        self.engine = Some(Arc::clone(&engine));
        engine
    }

    /// Tear down the engine and stop media not yet handed to one.
    async fn release(&mut self) {
        if let Some(engine) = self.engine.take() {
            engine.teardown().await;
        }
        if let Some(media) = self.pending_media.take() {
            media.stop();
        }
    }
}
