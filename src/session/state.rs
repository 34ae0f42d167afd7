//! Session state model
//!
//! Defines the capture session's state machine types. The individual
//! playing/muted/recording/selfie flags of earlier builds are folded
//! into one explicit state so invalid combinations cannot be
//! represented by accident.

use serde::{Deserialize, Serialize};

/// Capture discipline: continuous video recording or single-shot selfie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    Video,
    Selfie,
}

impl CaptureMode {
    /// The other mode.
    pub fn toggled(self) -> Self {
        match self {
            CaptureMode::Video => CaptureMode::Selfie,
            CaptureMode::Selfie => CaptureMode::Video,
        }
    }
}

impl Default for CaptureMode {
    fn default() -> Self {
        Self::Video
    }
}

/// Camera device lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "status")]
pub enum CameraStatus {
    /// No acquisition attempted yet
    Uninitialized,
    /// Permission negotiation in flight
    Acquiring,
    /// Stream is up and bound to the display surface
    Live,
    /// Acquisition failed; terminal until the session is remounted
    Failed { reason: String },
}

impl Default for CameraStatus {
    fn default() -> Self {
        Self::Uninitialized
    }
}

/// Recording lifecycle within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingPhase {
    /// No recording in progress
    Idle,
    /// Currently recording
    Recording,
    /// Stop requested, waiting for the pipeline to finalize
    Stopping,
}

impl Default for RecordingPhase {
    fn default() -> Self {
        Self::Idle
    }
}

/// Playback toggles mirrored onto the display surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub is_playing: bool,
    pub is_muted: bool,
}

/// Snapshot of the whole session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub camera: CameraStatus,
    pub playback: PlaybackState,
    pub recording: RecordingPhase,
    pub mode: CaptureMode,
}

impl SessionState {
    /// A recording may only exist over a live camera.
    pub fn is_consistent(&self) -> bool {
        self.recording == RecordingPhase::Idle || self.camera == CameraStatus::Live
    }
}
