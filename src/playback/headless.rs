//! Display-less surface binding
//!
//! Hosts that have no window to render into (capture rigs, the demo
//! shell) still need a surface for the stream to bind to. This one
//! tracks play/mute state and serves frames straight from the stream.

use crate::capture::stream::StreamHandle;
use crate::capture::traits::{Resolution, VideoFrame};
use crate::playback::DisplaySurface;
use crate::utils::error::{CaptureError, CaptureResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub struct HeadlessSurface {
    stream: RwLock<Option<Arc<StreamHandle>>>,
    playing: AtomicBool,
    muted: AtomicBool,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DisplaySurface for HeadlessSurface {
    fn attach(&self, stream: Arc<StreamHandle>) {
        *self.stream.write() = Some(stream);
    }

    fn detach(&self) {
        *self.stream.write() = None;
        self.playing.store(false, Ordering::SeqCst);
    }

    fn has_stream(&self) -> bool {
        self.stream.read().is_some()
    }

    fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    async fn play(&self) -> CaptureResult<()> {
        if !self.has_stream() {
            return Err(CaptureError::StreamNotActive);
        }
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&self) {
        self.playing.store(false, Ordering::SeqCst);
    }

    fn current_frame(&self) -> Option<VideoFrame> {
        self.stream
            .read()
            .as_ref()
            .and_then(|s| s.video().latest_frame())
    }

    fn frame_size(&self) -> Option<Resolution> {
        self.stream
            .read()
            .as_ref()
            .map(|s| s.video().native_resolution())
    }

    fn set_fullscreen(&self, _fullscreen: bool) -> CaptureResult<()> {
        Err(CaptureError::FullscreenDenied(
            "no display attached to surface".into(),
        ))
    }
}
