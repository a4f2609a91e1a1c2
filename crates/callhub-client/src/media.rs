//! Local media capture and the mute / camera controls.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::debug;

use callhub_core::error::{AppError, ErrorKind};
use callhub_core::result::AppResult;
use callhub_core::types::MediaKind;

/// Captured local tracks.
pub trait LocalMedia: Send + Sync + fmt::Debug + 'static {
    /// Enable or silence the microphone track.
    fn set_audio_enabled(&self, enabled: bool);
    /// Enable or blank the camera track.
    fn set_video_enabled(&self, enabled: bool);
    /// Whether a camera track was captured.
    fn has_video(&self) -> bool;
    /// Stop every track and release the devices.
    fn stop(&self);
}

/// Access to capture devices.
#[async_trait]
pub trait MediaDevices: Send + Sync + fmt::Debug + 'static {
    /// Capture microphone, plus camera for video calls.
    async fn capture(&self, kind: MediaKind) -> AppResult<Arc<dyn LocalMedia>>;
}

/// Local presentation state over captured media.
///
/// Toggles act on the local tracks only; nothing is renegotiated.
#[derive(Debug)]
pub struct MediaControls {
    media: Arc<dyn LocalMedia>,
    muted: AtomicBool,
    video_enabled: AtomicBool,
    stopped: AtomicBool,
}

impl MediaControls {
    /// Capture media for a call. Any capture failure is `MediaUnavailable`.
    pub async fn acquire(devices: &dyn MediaDevices, kind: MediaKind) -> AppResult<Self> {
        let media = devices.capture(kind).await.map_err(|e| {
            if e.kind == ErrorKind::MediaUnavailable {
                e
            } else {
                AppError::media_unavailable(format!("Could not capture {kind} media: {}", e.message))
            }
        })?;
        Ok(Self::new(media))
    }

    /// Wrap already captured media.
    pub fn new(media: Arc<dyn LocalMedia>) -> Self {
        let video_enabled = media.has_video();
        Self {
            media,
            muted: AtomicBool::new(false),
            video_enabled: AtomicBool::new(video_enabled),
            stopped: AtomicBool::new(false),
        }
    }

    /// Tracks handed to peer connections.
    pub fn tracks(&self) -> Arc<dyn LocalMedia> {
        Arc::clone(&self.media)
    }

    /// Flip mute. Returns the new muted state.
    pub fn toggle_mute(&self) -> bool {
        let muted = !self.muted.fetch_xor(true, Ordering::AcqRel);
        self.media.set_audio_enabled(!muted);
        muted
    }

    /// Flip the camera. Returns whether video is now enabled.
    ///
    /// Audio-only media has no camera to toggle.
    pub fn toggle_video(&self) -> bool {
        if !self.media.has_video() {
            return false;
        }
        let enabled = !self.video_enabled.fetch_xor(true, Ordering::AcqRel);
        self.media.set_video_enabled(enabled);
        enabled
    }

    /// Whether the microphone is muted.
    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }

    /// Whether the camera track is on.
    pub fn is_video_enabled(&self) -> bool {
        self.video_enabled.load(Ordering::Acquire)
    }

    /// Release the devices. Only the first call stops the tracks.
    pub fn stop(&self) -> bool {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.media.stop();
        debug!("Local media stopped");
        true
    }
}
