//! Error types and handling
//!
//! Common error types used across the capture core. Every fallible
//! operation converts into a user-facing notification at the session
//! boundary; nothing propagates past the session manager.

use thiserror::Error;

/// Capture-wide error type
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("stream is not active")]
    StreamNotActive,

    #[error("no data was recorded")]
    EmptyRecording,

    #[error("capture failed: {0}")]
    CaptureFailed(String),

    #[error("camera not available")]
    CameraNotAvailable,

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("fullscreen request denied: {0}")]
    FullscreenDenied(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    /// Stable code for event payloads and log correlation.
    pub fn code(&self) -> &'static str {
        match self {
            CaptureError::PermissionDenied(_) => "PERMISSION_DENIED",
            CaptureError::DeviceUnavailable(_) => "DEVICE_UNAVAILABLE",
            CaptureError::StreamNotActive => "STREAM_NOT_ACTIVE",
            CaptureError::EmptyRecording => "EMPTY_RECORDING",
            CaptureError::CaptureFailed(_) => "CAPTURE_FAILED",
            CaptureError::CameraNotAvailable => "CAMERA_NOT_AVAILABLE",
            CaptureError::StorageError(_) => "STORAGE_ERROR",
            CaptureError::FullscreenDenied(_) => "FULLSCREEN_DENIED",
            CaptureError::Io(_) => "IO_ERROR",
        }
    }
}

/// Result type alias using CaptureError
pub type CaptureResult<T> = Result<T, CaptureError>;
