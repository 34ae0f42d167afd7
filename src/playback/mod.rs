//! Playback synchronization
//!
//! Keeps the display surface's play/pause, mute, and fullscreen state
//! consistent with the user-facing toggles, tolerating the gap between
//! a toggle and the stream actually being ready to play.

pub mod headless;

pub use headless::HeadlessSurface;

use crate::capture::stream::StreamHandle;
use crate::capture::traits::{Resolution, VideoFrame};
use crate::notify::Notifier;
use crate::session::state::PlaybackState;
use crate::utils::error::CaptureResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// The rendering surface the stream is bound to. Hosting UIs implement
/// this for their video element/widget; `HeadlessSurface` covers hosts
/// with no display.
#[async_trait]
pub trait DisplaySurface: Send + Sync {
    /// Bind a stream to the surface.
    fn attach(&self, stream: Arc<StreamHandle>);

    /// Drop the bound stream.
    fn detach(&self);

    fn has_stream(&self) -> bool;

    /// Forwarded unconditionally; valid before the stream is ready.
    fn set_muted(&self, muted: bool);

    fn is_playing(&self) -> bool;

    /// Begin playback. May be rejected by the host (autoplay policy).
    async fn play(&self) -> CaptureResult<()>;

    /// Pausing an already-paused surface is harmless.
    fn pause(&self);

    /// The current frame at native camera resolution, independent of
    /// how the surface scales it for display.
    fn current_frame(&self) -> Option<VideoFrame>;

    /// Native pixel dimensions of the bound stream.
    fn frame_size(&self) -> Option<Resolution>;

    fn set_fullscreen(&self, fullscreen: bool) -> CaptureResult<()>;
}

struct PlaybackInner {
    is_playing: bool,
    is_muted: bool,
    metadata_ready: bool,
    fullscreen: bool,
    position_secs: f64,
}

/// Mirrors user toggles onto the surface.
pub struct PlaybackSync {
    surface: Arc<dyn DisplaySurface>,
    notifier: Notifier,
    inner: Mutex<PlaybackInner>,
}

impl PlaybackSync {
    pub fn new(surface: Arc<dyn DisplaySurface>, notifier: Notifier) -> Self {
        Self {
            surface,
            notifier,
            inner: Mutex::new(PlaybackInner {
                // Preview starts playing, unmuted, as soon as it can.
                is_playing: true,
                is_muted: false,
                metadata_ready: false,
                fullscreen: false,
                position_secs: 0.0,
            }),
        }
    }

    pub fn state(&self) -> PlaybackState {
        let inner = self.inner.lock();
        PlaybackState {
            is_playing: inner.is_playing,
            is_muted: inner.is_muted,
        }
    }

    pub(crate) fn surface(&self) -> &Arc<dyn DisplaySurface> {
        &self.surface
    }

    /// Whether the bound stream has delivered a frame yet.
    pub fn has_frame(&self) -> bool {
        self.surface.current_frame().is_some()
    }

    /// Bind a freshly acquired stream: attach, apply the current mute
    /// flag, and hold playback until the metadata-ready signal.
    pub(crate) fn bind_stream(&self, stream: &Arc<StreamHandle>) {
        self.surface.attach(stream.clone());
        let muted = {
            let mut inner = self.inner.lock();
            inner.metadata_ready = false;
            inner.is_muted
        };
        self.surface.set_muted(muted);
    }

    /// Set the desired play state. Operations issued before the stream
    /// reports ready are deferred and applied on the ready signal.
    pub async fn set_playing(&self, playing: bool) {
        let ready = {
            let mut inner = self.inner.lock();
            inner.is_playing = playing;
            inner.metadata_ready
        };
        if !ready {
            tracing::debug!(playing, "stream not ready, deferring playback change");
            return;
        }

        if playing {
            self.play_guarded().await;
        } else {
            self.surface.pause();
        }
    }

    /// Unconditional and synchronous: the mute flag always reaches the
    /// surface, ready or not.
    pub fn set_muted(&self, muted: bool) {
        self.inner.lock().is_muted = muted;
        self.surface.set_muted(muted);
    }

    /// The stream reported its metadata; apply any deferred play state.
    pub async fn on_metadata_ready(&self) {
        let play = {
            let mut inner = self.inner.lock();
            inner.metadata_ready = true;
            inner.is_playing
        };
        if play {
            self.play_guarded().await;
        }
    }

    /// Position callback from the surface.
    pub fn on_time_update(&self, secs: f64) {
        self.inner.lock().position_secs = secs;
    }

    pub fn position_secs(&self) -> f64 {
        self.inner.lock().position_secs
    }

    pub fn is_fullscreen(&self) -> bool {
        self.inner.lock().fullscreen
    }

    /// Toggle fullscreen; a denied request becomes an error
    /// notification, never a fault.
    pub fn toggle_fullscreen(&self) {
        let target = !self.inner.lock().fullscreen;
        match self.surface.set_fullscreen(target) {
            Ok(()) => {
                self.inner.lock().fullscreen = target;
            }
            Err(err) => {
                tracing::warn!("fullscreen change rejected: {err}");
                self.notifier.error(format!("{err}"));
            }
        }
    }

    /// Play only if the surface is not already playing; a redundant
    /// play call racing an in-flight one is skipped entirely.
    async fn play_guarded(&self) {
        if self.surface.is_playing() {
            return;
        }
        if let Err(err) = self.surface.play().await {
            tracing::warn!("playback start rejected: {err}");
            self.notifier
                .error(format!("Could not start playback: {err}"));
        }
    }
}
