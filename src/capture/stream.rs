//! Stream handle and track ownership
//!
//! A `StreamHandle` owns the live camera/microphone tracks for the
//! duration of a session. Acquisition is the only component allowed to
//! stop or replace tracks; everything else holds a shared reference
//! and reads through the narrow track API.

use crate::capture::traits::{AudioSource, FrameSource, Resolution, VideoFrame};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// The video track of an acquired stream.
pub struct VideoTrack {
    source: Box<dyn FrameSource>,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl VideoTrack {
    fn new(source: Box<dyn FrameSource>) -> Self {
        Self {
            source,
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Whether the track is still producing frames.
    pub fn is_live(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }

    pub fn native_resolution(&self) -> Resolution {
        self.source.native_resolution()
    }

    pub fn frame_rate(&self) -> u32 {
        self.source.frame_rate()
    }

    pub fn latest_frame(&self) -> Option<VideoFrame> {
        if self.is_live() {
            self.source.latest_frame()
        } else {
            None
        }
    }

    pub(crate) fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.source.stop();
        }
    }
}

/// The audio track of an acquired stream.
pub struct AudioTrack {
    source: Box<dyn AudioSource>,
    enabled: AtomicBool,
    stopped: AtomicBool,
}

impl AudioTrack {
    fn new(source: Box<dyn AudioSource>) -> Self {
        Self {
            source,
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_live(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }

    pub fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    pub fn channels(&self) -> u16 {
        self.source.channels()
    }

    pub fn samples_captured(&self) -> u64 {
        self.source.samples_captured()
    }

    pub(crate) fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.source.stop();
        }
    }
}

/// Exclusive owner of the acquired tracks.
pub struct StreamHandle {
    id: Uuid,
    video: VideoTrack,
    audio: Option<AudioTrack>,
}

impl StreamHandle {
    pub(crate) fn new(video: Box<dyn FrameSource>, audio: Option<Box<dyn AudioSource>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            video: VideoTrack::new(video),
            audio: audio.map(AudioTrack::new),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn video(&self) -> &VideoTrack {
        &self.video
    }

    pub fn audio(&self) -> Option<&AudioTrack> {
        self.audio.as_ref()
    }

    /// A stream is active while its video track is live.
    pub fn is_active(&self) -> bool {
        self.video.is_live()
    }

    /// Stop every track. Called from acquisition teardown only.
    pub(crate) fn stop_all(&self) {
        self.video.stop();
        if let Some(audio) = &self.audio {
            audio.stop();
        }
        tracing::debug!(stream = %self.id, "all tracks stopped");
    }
}
