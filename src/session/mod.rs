//! Capture session
//!
//! The session state model and the manager that drives it.

pub mod manager;
pub mod state;

pub use manager::{CaptureSessionManager, SessionEvent};
pub use state::{CameraStatus, CaptureMode, PlaybackState, RecordingPhase, SessionState};
