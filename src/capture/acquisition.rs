//! Media acquisition
//!
//! Negotiates camera/microphone access and owns the resulting stream
//! for the lifetime of the mounted session. Acquisition happens at
//! most once: repeated calls return the existing handle without
//! prompting again, and a concurrent second negotiation is refused.

use crate::capture::stream::StreamHandle;
use crate::capture::traits::{
    AudioInputDevice, AudioSource, CameraDevice, FrameSource, StreamConstraints,
};
use crate::notify::Notifier;
use crate::playback::PlaybackSync;
use crate::session::state::{CameraStatus, CaptureMode};
use crate::utils::error::{CaptureError, CaptureResult};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct MediaAcquisition {
    camera: Arc<dyn CameraDevice>,
    microphone: Arc<dyn AudioInputDevice>,
    playback: Arc<PlaybackSync>,
    notifier: Notifier,
    status: RwLock<CameraStatus>,
    handle: RwLock<Option<Arc<StreamHandle>>>,
    /// Cleared on teardown; deferred completions check it before
    /// touching state so a stale negotiation cannot resurrect a
    /// dismantled session.
    alive: AtomicBool,
}

impl MediaAcquisition {
    pub fn new(
        camera: Arc<dyn CameraDevice>,
        microphone: Arc<dyn AudioInputDevice>,
        playback: Arc<PlaybackSync>,
        notifier: Notifier,
    ) -> Self {
        Self {
            camera,
            microphone,
            playback,
            notifier,
            status: RwLock::new(CameraStatus::Uninitialized),
            handle: RwLock::new(None),
            alive: AtomicBool::new(true),
        }
    }

    pub fn status(&self) -> CameraStatus {
        self.status.read().clone()
    }

    pub fn handle(&self) -> Option<Arc<StreamHandle>> {
        self.handle.read().clone()
    }

    /// Acquire the stream for `mode`. Idempotent per session: once a
    /// handle exists it is returned as-is, keeping the constraints
    /// negotiated at first acquisition even if the mode changed since.
    pub async fn acquire(&self, mode: CaptureMode) -> CaptureResult<Arc<StreamHandle>> {
        if let Some(existing) = self.handle() {
            return Ok(existing);
        }

        {
            let mut status = self.status.write();
            match &*status {
                CameraStatus::Acquiring => {
                    return Err(CaptureError::DeviceUnavailable(
                        "acquisition already in progress".into(),
                    ));
                }
                // Failure is terminal until the session is remounted;
                // no in-place retry.
                CameraStatus::Failed { reason } => {
                    return Err(CaptureError::DeviceUnavailable(reason.clone()));
                }
                _ => {}
            }
            *status = CameraStatus::Acquiring;
        }

        let constraints = StreamConstraints::for_mode(mode);
        tracing::info!(
            ?mode,
            width = constraints.ideal.width,
            height = constraints.ideal.height,
            "requesting capture stream"
        );

        let video = match self.camera.open(&constraints).await {
            Ok(source) => source,
            Err(err) => return Err(self.fail(err)),
        };

        let audio = if constraints.audio {
            match self.microphone.open().await {
                Ok(source) => Some(source),
                Err(err) => {
                    video.stop();
                    return Err(self.fail(err));
                }
            }
        } else {
            None
        };

        // The session may have been torn down while we negotiated.
        if !self.alive.load(Ordering::SeqCst) {
            video.stop();
            if let Some(audio) = &audio {
                audio.stop();
            }
            return Err(CaptureError::DeviceUnavailable(
                "session torn down during acquisition".into(),
            ));
        }

        let handle = Arc::new(StreamHandle::new(video, audio));
        let resolution = handle.video().native_resolution();
        *self.handle.write() = Some(handle.clone());
        *self.status.write() = CameraStatus::Live;
        tracing::info!(
            stream = %handle.id(),
            width = resolution.width,
            height = resolution.height,
            "capture stream live"
        );

        // Bind to the display surface; playback waits for the stream's
        // ready signal, the mute flag applies immediately.
        self.playback.bind_stream(&handle);

        Ok(handle)
    }

    /// Stop every track and clear the handle. A later acquisition
    /// re-runs the full negotiation.
    pub fn teardown(&self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.write().take() {
            handle.stop_all();
            tracing::info!(stream = %handle.id(), "capture stream released");
        }
        *self.status.write() = CameraStatus::Uninitialized;
    }

    fn fail(&self, err: CaptureError) -> CaptureError {
        tracing::error!("camera acquisition failed: {err}");
        if self.alive.load(Ordering::SeqCst) {
            *self.status.write() = CameraStatus::Failed {
                reason: err.to_string(),
            };
            self.notifier.error(format!("Camera error: {err}"));
        }
        err
    }
}
