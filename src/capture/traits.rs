//! Capture device seams
//!
//! Platform-agnostic traits and info types for capture sources. The
//! session core only talks to these traits; the nokhwa and cpal
//! backends implement them for real hardware.

use crate::session::state::CaptureMode;
use crate::utils::error::CaptureResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Information about a camera/webcam
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Supported resolutions
    pub supported_resolutions: Vec<Resolution>,
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Information about an audio input device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioDeviceInfo {
    /// Unique device ID
    pub id: String,

    /// Device name
    pub name: String,

    /// Whether this is the default input device
    pub is_default: bool,
}

/// Which way the requested camera faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    User,
    Environment,
}

/// Constraints for a stream request. The ideal resolution is a target,
/// not a guarantee; backends report the format they actually opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    pub ideal: Resolution,
    pub facing: CameraFacing,
    pub audio: bool,
    pub frame_rate: u32,
}

impl StreamConstraints {
    /// Mode-dependent constraints: selfies ask for a higher target
    /// resolution than continuous recording.
    pub fn for_mode(mode: CaptureMode) -> Self {
        let ideal = match mode {
            CaptureMode::Video => Resolution {
                width: 1280,
                height: 720,
            },
            CaptureMode::Selfie => Resolution {
                width: 1920,
                height: 1080,
            },
        };
        Self {
            ideal,
            facing: CameraFacing::User,
            audio: true,
            frame_rate: 30,
        }
    }
}

/// One decoded video frame, RGBA8 at the camera's native resolution.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA bytes, `width * height * 4` long
    pub data: Arc<Vec<u8>>,
    /// Capture order within the owning source
    pub sequence: u64,
}

/// Live producer of video frames. A source runs until stopped; callers
/// read the most recent frame rather than queueing every one.
pub trait FrameSource: Send + Sync {
    fn native_resolution(&self) -> Resolution;

    fn frame_rate(&self) -> u32;

    /// The most recently captured frame, if any has arrived yet.
    fn latest_frame(&self) -> Option<VideoFrame>;

    /// Stop producing frames and release the device. Idempotent.
    fn stop(&self);
}

/// Live producer of audio input.
pub trait AudioSource: Send + Sync {
    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16;

    /// Total samples captured so far; a moving value proves the
    /// device is actually delivering audio.
    fn samples_captured(&self) -> u64;

    /// Stop capturing and release the device. Idempotent.
    fn stop(&self);
}

/// A camera that can be opened into a running frame source.
#[async_trait]
pub trait CameraDevice: Send + Sync {
    async fn open(&self, constraints: &StreamConstraints) -> CaptureResult<Box<dyn FrameSource>>;
}

/// A microphone that can be opened into a running audio source.
#[async_trait]
pub trait AudioInputDevice: Send + Sync {
    async fn open(&self) -> CaptureResult<Box<dyn AudioSource>>;
}
