//! Flair - camera capture with flair.
//!
//! The capture core behind a camera app: it acquires the camera and
//! microphone, keeps playback state in sync with a display surface,
//! runs the record/selfie state machine, and persists finished
//! captures to a remote object store. Hosting UIs plug in a
//! `DisplaySurface`, subscribe to session and notification events, and
//! drive the `CaptureSessionManager`.

pub mod capture;
pub mod notify;
pub mod playback;
pub mod recorder;
pub mod session;
pub mod snapshot;
pub mod storage;
pub mod utils;

pub use capture::MediaAcquisition;
pub use notify::{Notifier, NotifyEvent, Severity};
pub use playback::{DisplaySurface, PlaybackSync};
pub use recorder::FfmpegRecorder;
pub use session::{CaptureMode, CaptureSessionManager, SessionEvent, SessionState};
pub use storage::{RecentCaptureFeed, SupabaseStorage, UploadGateway};
pub use utils::error::{CaptureError, CaptureResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging for binaries and examples.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flair=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
