//! Client negotiation engine.
//!
//! One engine per joined call. It keeps exactly one [`PeerLink`] per remote
//! party, created lazily the first time it is needed, and decides which side
//! of each pair sends the offer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use callhub_core::error::AppError;
use callhub_core::protocol::{ClientRequest, ServerEvent};
use callhub_core::result::AppResult;
use callhub_core::types::{CallId, SignalKind, UserId};

use crate::config::{EngineConfig, GlareStrategy};
use crate::media::MediaControls;
use crate::peer::{PeerConnectionFactory, PeerEvent, PeerLink, PeerState};
use crate::transport::SignalSink;

/// Peer negotiation for one call.
#[derive(Debug)]
pub struct NegotiationEngine {
    self_id: UserId,
    call_id: CallId,
    caller_id: UserId,
    config: EngineConfig,
    sink: Arc<dyn SignalSink>,
    factory: Arc<dyn PeerConnectionFactory>,
    media: MediaControls,
    links: DashMap<UserId, Arc<PeerLink>>,
    /// Serializes link creation so each remote gets a single link.
    creating: Mutex<()>,
    grace: DashMap<UserId, CancellationToken>,
    events_tx: mpsc::UnboundedSender<PeerEvent>,
    shutdown: CancellationToken,
    torn_down: AtomicBool,
    this: Weak<Self>,
}

impl NegotiationEngine {
    /// Create the engine for `call_id` once local media is captured.
    ///
    /// Must be called inside a Tokio runtime: peer events are pumped by a
    /// background task until [`teardown`](Self::teardown).
    pub fn new(
        self_id: UserId,
        call_id: CallId,
        caller_id: UserId,
        config: EngineConfig,
        sink: Arc<dyn SignalSink>,
        factory: Arc<dyn PeerConnectionFactory>,
        media: MediaControls,
    ) -> Arc<Self> {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let engine = Arc::new_cyclic(|this| Self {
            self_id,
            call_id,
            caller_id,
            config,
            sink,
            factory,
            media,
            links: DashMap::new(),
            creating: Mutex::new(()),
            grace: DashMap::new(),
            events_tx,
            shutdown: CancellationToken::new(),
            torn_down: AtomicBool::new(false),
            this: this.clone(),
        });

        let weak = Arc::downgrade(&engine);
        let shutdown = engine.shutdown.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = shutdown.cancelled() => break,
                    event = events_rx.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };
                let Some(engine) = weak.upgrade() else { break };
                engine.on_peer_event(event).await;
            }
        });

        engine
    }

    /// Call this engine negotiates media for.
    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    /// Local mute and camera controls.
    pub fn media(&self) -> &MediaControls {
        &self.media
    }

    /// State of the link to `remote`, if one exists.
    pub fn link_state(&self, remote: UserId) -> Option<PeerState> {
        self.links.get(&remote).map(|link| link.state())
    }

    /// Number of peer links currently held, whatever their state.
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Whether [`teardown`](Self::teardown) has run.
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    /// Whether this side sends the offer for the pair with `remote`.
    pub fn is_initiator(&self, remote: UserId) -> bool {
        match self.config.glare_strategy {
            GlareStrategy::Deterministic => self.self_id < remote,
            GlareStrategy::GracePeriod => self.self_id == self.caller_id,
        }
    }

    /// Begin negotiating with the parties that already joined the call.
    ///
    /// Parties still ringing are reached later through
    /// [`participant_joined`](Self::participant_joined).
    pub async fn start(&self, remotes: impl IntoIterator<Item = UserId>) {
        for remote in remotes {
            if remote == self.self_id {
                continue;
            }
            match self.config.glare_strategy {
                GlareStrategy::Deterministic => {
                    if self.is_initiator(remote) {
                        self.offer_to(remote).await;
                    }
                }
                GlareStrategy::GracePeriod => {
                    if self.is_initiator(remote) {
                        self.offer_to(remote).await;
                    } else {
                        self.defer_offer(remote);
                    }
                }
            }
        }
    }

    /// A newcomer joined the call.
    ///
    /// When this side offers for the pair, any link to the newcomer that
    /// never connected is closed and a fresh offer is sent.
    pub async fn participant_joined(&self, user_id: UserId) {
        if user_id == self.self_id || self.is_torn_down() {
            return;
        }
        let offer = match self.config.glare_strategy {
            GlareStrategy::Deterministic => self.is_initiator(user_id),
            GlareStrategy::GracePeriod => true,
        };
        if offer {
            self.replace_unconnected(user_id, |state| state != PeerState::Connected)
                .await;
            self.offer_to(user_id).await;
        }
    }

    /// Route a server event that concerns this call.
    ///
    /// Returns `true` when the event ended the call and the engine has been
    /// torn down.
    pub async fn handle_event(&self, event: &ServerEvent) -> bool {
        match event {
            ServerEvent::Signal {
                call_id,
                sender_id,
                target_id,
                kind,
                payload,
            } if *call_id == self.call_id => {
                self.handle_signal(*sender_id, *target_id, *kind, payload.clone())
                    .await;
            }
            ServerEvent::ParticipantJoined { call_id, user_id } if *call_id == self.call_id => {
                self.participant_joined(*user_id).await;
            }
            ServerEvent::StatusUpdate {
                call_id, parties, ..
            } if *call_id == self.call_id
                && self.config.glare_strategy == GlareStrategy::Deterministic =>
            {
                for &party in parties {
                    if party != self.self_id && self.is_initiator(party) {
                        self.replace_unconnected(party, |state| {
                            matches!(state, PeerState::Failed | PeerState::Closed)
                        })
                        .await;
                        self.offer_to(party).await;
                    }
                }
            }
            ServerEvent::Ended { call_id, .. } | ServerEvent::Cancelled { call_id }
                if *call_id == self.call_id =>
            {
                self.teardown().await;
                return true;
            }
            _ => {}
        }
        false
    }

    /// Apply a relayed offer, answer or candidate from `sender`.
    pub async fn handle_signal(
        &self,
        sender: UserId,
        target: UserId,
        kind: SignalKind,
        payload: Value,
    ) {
        if target != self.self_id || sender == self.self_id || self.is_torn_down() {
            return;
        }

        match kind {
            SignalKind::Offer => self.on_offer(sender, payload).await,
            SignalKind::Answer => match self.link(sender) {
                Some(link) => {
                    if let Err(e) = link.connection().set_remote_description(payload).await {
                        self.fail(&link, &e);
                    }
                }
                None => debug!(remote = %sender, "Answer without peer link dropped"),
            },
            SignalKind::IceCandidate => match self.link(sender) {
                Some(link) => {
                    if let Err(e) = link.connection().add_ice_candidate(payload).await {
                        debug!(remote = %sender, error = %e, "Remote candidate rejected");
                    }
                }
                None => debug!(remote = %sender, "Candidate before peer link dropped"),
            },
        }
    }

    /// Close every link and stop local media.
    ///
    /// Safe to call from racing triggers; only the first call does work.
    pub async fn teardown(&self) -> bool {
        if self.torn_down.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.shutdown.cancel();
        self.grace.clear();

        let links: Vec<Arc<PeerLink>> = {
            let _guard = self.creating.lock().await;
            let links = self.links.iter().map(|l| Arc::clone(l.value())).collect();
            self.links.clear();
            links
        };
        for link in &links {
            link.close().await;
        }
        self.media.stop();

        info!(call_id = %self.call_id, links = links.len(), "Call media torn down");
        true
    }

    async fn on_offer(&self, sender: UserId, payload: Value) {
        if let Some((_, token)) = self.grace.remove(&sender) {
            token.cancel();
        }
        let Some((link, _)) = self.link_for(sender).await else {
            return;
        };
        link.advance(PeerState::Connecting);

        let result = async {
            let connection = link.connection();
            connection.set_remote_description(payload).await?;
            let answer = connection.create_answer().await?;
            self.signal(sender, SignalKind::Answer, answer).await
        }
        .await;
        if let Err(e) = result {
            self.fail(&link, &e);
        }
    }

    async fn offer_to(&self, remote: UserId) {
        let Some((link, created)) = self.link_for(remote).await else {
            return;
        };
        if !created {
            debug!(remote = %remote, "Peer link already exists, not offering");
            return;
        }
        link.advance(PeerState::Connecting);

        let result = async {
            let offer = link.connection().create_offer().await?;
            self.signal(remote, SignalKind::Offer, offer).await
        }
        .await;
        if let Err(e) = result {
            self.fail(&link, &e);
        }
    }

    /// Drop the link to `remote` if its state matches `stale`.
    async fn replace_unconnected(&self, remote: UserId, stale: impl Fn(PeerState) -> bool) {
        let removed = {
            let _guard = self.creating.lock().await;
            let existing = self.links.get(&remote).map(|l| Arc::clone(l.value()));
            match existing {
                Some(link) if stale(link.state()) => {
                    self.links.remove(&remote);
                    Some(link)
                }
                _ => None,
            }
        };
        if let Some(link) = removed {
            debug!(remote = %remote, state = %link.state(), "Replacing peer link");
            link.close().await;
        }
    }

    fn defer_offer(&self, remote: UserId) {
        if self.links.contains_key(&remote) {
            return;
        }
        let token = self.shutdown.child_token();
        self.grace.insert(remote, token.clone());

        let delay = self.config.grace_period();
        let this = self.this.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            let Some(engine) = this.upgrade() else { return };
            engine.grace.remove(&remote);
            if !engine.links.contains_key(&remote) {
                debug!(remote = %remote, "No offer within grace period, offering");
                engine.offer_to(remote).await;
            }
        });
    }

    /// Existing link to `remote`, or a new one. The flag is `true` when the
    /// link was created by this call.
    async fn link_for(&self, remote: UserId) -> Option<(Arc<PeerLink>, bool)> {
        let _guard = self.creating.lock().await;
        if let Some(link) = self.links.get(&remote) {
            return Some((Arc::clone(link.value()), false));
        }
        if self.is_torn_down() {
            return None;
        }

        let connection = match self
            .factory
            .create(
                remote,
                &self.config.ice_servers,
                self.media.tracks(),
                self.events_tx.clone(),
            )
            .await
        {
            Ok(connection) => connection,
            Err(e) => {
                warn!(remote = %remote, error = %e, "Failed to create peer connection");
                return None;
            }
        };

        let link = Arc::new(PeerLink::new(remote, connection));
        self.links.insert(remote, Arc::clone(&link));
        self.arm_watchdog(&link);
        debug!(call_id = %self.call_id, remote = %remote, "Peer link created");
        Some((link, true))
    }

    fn link(&self, remote: UserId) -> Option<Arc<PeerLink>> {
        self.links.get(&remote).map(|l| Arc::clone(l.value()))
    }

    /// A link still pending after the connect timeout is failed.
    fn arm_watchdog(&self, link: &Arc<PeerLink>) {
        let link = Arc::clone(link);
        let shutdown = self.shutdown.clone();
        let timeout = self.config.connect_timeout();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    if link.state().is_pending() && link.advance(PeerState::Failed) {
                        warn!(
                            remote = %link.remote(),
                            timeout_seconds = timeout.as_secs(),
                            "Peer link did not connect in time"
                        );
                    }
                }
            }
        });
    }

    async fn on_peer_event(&self, event: PeerEvent) {
        match event {
            PeerEvent::IceCandidate { remote, candidate } => {
                let open = self
                    .link(remote)
                    .is_some_and(|l| l.state() != PeerState::Closed);
                if open {
                    if let Err(e) = self.signal(remote, SignalKind::IceCandidate, candidate).await {
                        debug!(remote = %remote, error = %e, "Candidate not sent");
                    }
                }
            }
            PeerEvent::Connected { remote } => {
                if let Some(link) = self.link(remote) {
                    if link.advance(PeerState::Connected) {
                        info!(call_id = %self.call_id, remote = %remote, "Peer link connected");
                    }
                }
            }
            PeerEvent::Failed { remote } => {
                if let Some(link) = self.link(remote) {
                    if link.advance(PeerState::Failed) {
                        warn!(call_id = %self.call_id, remote = %remote, "Peer link failed");
                    }
                }
            }
        }
    }

    fn fail(&self, link: &PeerLink, error: &AppError) {
        if link.advance(PeerState::Failed) {
            warn!(
                call_id = %self.call_id,
                remote = %link.remote(),
                error = %error,
                "Peer negotiation failed"
            );
        }
    }

    async fn signal(&self, remote: UserId, kind: SignalKind, payload: Value) -> AppResult<()> {
        self.sink
            .send(ClientRequest::Signal {
                call_id: self.call_id,
                target_id: remote,
                kind,
                payload,
            })
            .await
    }
}
