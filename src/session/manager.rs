//! Capture session manager
//!
//! Orchestrates the capture session: camera lifecycle, the video/selfie
//! mode switch, recording start/stop, one-shot selfies, and the
//! notification contract around every fallible step. All state changes
//! funnel through here so the UI-visible session can never disagree
//! with the underlying media primitives.

use crate::capture::acquisition::MediaAcquisition;
use crate::capture::stream::StreamHandle;
use crate::notify::Notifier;
use crate::playback::{DisplaySurface, PlaybackSync};
use crate::recorder::pipeline::{RecorderBackend, RecordingPipeline};
use crate::session::state::{CameraStatus, CaptureMode, RecordingPhase, SessionState};
use crate::snapshot;
use crate::storage::gateway::{StoredObject, UploadGateway};
use crate::utils::error::{CaptureError, CaptureResult};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Events emitted over the session's lifetime
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Camera stream is up and bound
    CameraLive,
    /// Camera acquisition failed; terminal until remount
    CameraFailed { reason: String },
    /// Capture mode flipped
    ModeChanged(CaptureMode),
    /// Recording started
    RecordingStarted,
    /// Stop requested, pipeline finalizing
    RecordingStopping,
    /// Recording finalized and stored
    RecordingSaved { object: StoredObject },
    /// Recording could not be finalized or stored
    RecordingFailed { code: &'static str, reason: String },
    /// Selfie captured and stored
    SelfieSaved { object: StoredObject },
    /// Selfie could not be captured or stored
    SelfieFailed { code: &'static str, reason: String },
}

struct ActiveRecording {
    pipeline: RecordingPipeline,
    started: Instant,
}

/// The session core. Shared behind an `Arc`; all mutability is
/// internal.
pub struct CaptureSessionManager {
    acquisition: Arc<MediaAcquisition>,
    playback: Arc<PlaybackSync>,
    recorder: Arc<dyn RecorderBackend>,
    gateway: Arc<dyn UploadGateway>,
    notifier: Notifier,
    mode: RwLock<CaptureMode>,
    phase: RwLock<RecordingPhase>,
    active: Mutex<Option<ActiveRecording>>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl CaptureSessionManager {
    pub fn new(
        acquisition: Arc<MediaAcquisition>,
        playback: Arc<PlaybackSync>,
        recorder: Arc<dyn RecorderBackend>,
        gateway: Arc<dyn UploadGateway>,
        notifier: Notifier,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(100);
        Arc::new(Self {
            acquisition,
            playback,
            recorder,
            gateway,
            notifier,
            mode: RwLock::new(CaptureMode::default()),
            phase: RwLock::new(RecordingPhase::Idle),
            active: Mutex::new(None),
            event_tx,
        })
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn playback(&self) -> &Arc<PlaybackSync> {
        &self.playback
    }

    pub fn mode(&self) -> CaptureMode {
        *self.mode.read()
    }

    /// Snapshot of the whole session.
    pub fn state(&self) -> SessionState {
        SessionState {
            camera: self.acquisition.status(),
            playback: self.playback.state(),
            recording: *self.phase.read(),
            mode: *self.mode.read(),
        }
    }

    /// Acquire the camera for the current mode. Terminal on failure:
    /// the error is reported and the camera stays `Failed` until the
    /// session is remounted.
    pub async fn initialize(&self) -> CaptureResult<()> {
        let mode = self.mode();
        match self.acquisition.acquire(mode).await {
            Ok(_) => {
                let _ = self.event_tx.send(SessionEvent::CameraLive);
                Ok(())
            }
            Err(err) => {
                let _ = self.event_tx.send(SessionEvent::CameraFailed {
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Flip video/selfie. Rejected with an error notification while a
    /// recording is underway; the mode is left unchanged.
    pub fn toggle_mode(&self) -> CaptureMode {
        if *self.phase.read() != RecordingPhase::Idle {
            tracing::warn!("mode change rejected while recording");
            self.notifier.error("Cannot change mode while recording");
            return *self.mode.read();
        }

        let mut mode = self.mode.write();
        let next = mode.toggled();
        *mode = next;
        drop(mode);

        tracing::info!(?next, "capture mode changed");
        let _ = self.event_tx.send(SessionEvent::ModeChanged(next));
        next
    }

    /// Start recording. Only valid in video mode while idle, over a
    /// live stream with an enabled video track; anything else is a
    /// reported no-op.
    pub async fn start_recording(&self) -> CaptureResult<()> {
        if *self.mode.read() != CaptureMode::Video {
            tracing::debug!("start ignored: not in video mode");
            return Ok(());
        }
        if *self.phase.read() != RecordingPhase::Idle {
            tracing::debug!("start ignored: recording already in progress");
            return Ok(());
        }

        let stream = match self.live_stream() {
            Some(stream) => stream,
            None => {
                tracing::warn!("recording rejected: stream is not active");
                self.notifier
                    .error("Recording failed to start. Please try again.");
                return Err(CaptureError::StreamNotActive);
            }
        };

        let pipeline = match RecordingPipeline::begin(self.recorder.as_ref(), stream).await {
            Ok(pipeline) => pipeline,
            Err(err) => {
                tracing::error!("failed to start recorder: {err}");
                self.notifier
                    .error(format!("Recording failed to start: {err}"));
                return Err(err);
            }
        };

        *self.active.lock() = Some(ActiveRecording {
            pipeline,
            started: Instant::now(),
        });
        *self.phase.write() = RecordingPhase::Recording;
        debug_assert!(self.state().is_consistent());

        let _ = self.event_tx.send(SessionEvent::RecordingStarted);
        Ok(())
    }

    /// Stop recording. The phase moves to `Stopping` immediately;
    /// finalize and upload run on a completion task, and only that
    /// task's end brings the session back to `Idle`.
    pub fn stop_recording(self: &Arc<Self>) {
        {
            let mut phase = self.phase.write();
            if *phase != RecordingPhase::Recording {
                tracing::debug!("stop ignored: no recording in progress");
                return;
            }
            *phase = RecordingPhase::Stopping;
        }

        let Some(active) = self.active.lock().take() else {
            // Phase said recording but no pipeline was held; recover.
            tracing::error!("recording phase had no active pipeline");
            *self.phase.write() = RecordingPhase::Idle;
            return;
        };

        let _ = self.event_tx.send(SessionEvent::RecordingStopping);
        self.notifier.success("Saving recording...");

        let this = self.clone();
        tokio::spawn(async move {
            this.finish_recording(active).await;
        });
    }

    async fn finish_recording(self: Arc<Self>, active: ActiveRecording) {
        let elapsed = active.started.elapsed();
        let outcome = async {
            let artifact = active.pipeline.finalize().await?;
            let bucket = artifact.bucket();
            let filename = artifact.filename();
            let content_type = artifact.content_type();
            self.gateway
                .upload(bucket, &filename, content_type, artifact.bytes)
                .await
        }
        .await;

        // Completion callback: this, not the stop call, re-arms Idle.
        *self.phase.write() = RecordingPhase::Idle;

        match outcome {
            Ok(object) => {
                tracing::info!(
                    name = %object.name,
                    secs = elapsed.as_secs_f64(),
                    "recording saved"
                );
                self.notifier.success("Recording saved");
                let _ = self.event_tx.send(SessionEvent::RecordingSaved { object });
            }
            Err(err) => {
                tracing::error!("recording not saved: {err}");
                let message = match err {
                    CaptureError::EmptyRecording => "No data was recorded".to_string(),
                    ref other => format!("Could not save recording: {other}"),
                };
                self.notifier.error(message);
                let _ = self.event_tx.send(SessionEvent::RecordingFailed {
                    code: err.code(),
                    reason: err.to_string(),
                });
            }
        }
    }

    /// Take and store a selfie. One-shot: the recording phase never
    /// changes, no state survives the call.
    pub async fn capture_selfie(&self) -> CaptureResult<StoredObject> {
        if *self.mode.read() != CaptureMode::Selfie {
            tracing::debug!("selfie ignored: not in selfie mode");
            return Err(CaptureError::CaptureFailed(
                "selfie mode is not active".into(),
            ));
        }

        let surface = self.playback.surface();
        if !surface.has_stream() {
            tracing::warn!("selfie rejected: no live surface");
            self.notifier.error("Camera not available");
            let _ = self.event_tx.send(SessionEvent::SelfieFailed {
                code: CaptureError::CameraNotAvailable.code(),
                reason: CaptureError::CameraNotAvailable.to_string(),
            });
            return Err(CaptureError::CameraNotAvailable);
        }

        let artifact = match snapshot::capture(surface.as_ref()).await {
            Ok(artifact) => artifact,
            Err(err) => {
                tracing::error!("selfie capture failed: {err}");
                let message = match err {
                    CaptureError::CameraNotAvailable => "Camera not available".to_string(),
                    ref other => format!("Selfie capture failed: {other}"),
                };
                self.notifier.error(message);
                let _ = self.event_tx.send(SessionEvent::SelfieFailed {
                    code: err.code(),
                    reason: err.to_string(),
                });
                return Err(err);
            }
        };

        self.notifier.success("Saving selfie...");
        let bucket = artifact.bucket();
        let filename = artifact.filename();
        let content_type = artifact.content_type();
        match self
            .gateway
            .upload(bucket, &filename, content_type, artifact.bytes)
            .await
        {
            Ok(object) => {
                tracing::info!(name = %object.name, "selfie saved");
                self.notifier.success("Selfie saved");
                let _ = self.event_tx.send(SessionEvent::SelfieSaved {
                    object: object.clone(),
                });
                Ok(object)
            }
            Err(err) => {
                tracing::error!("selfie not saved: {err}");
                self.notifier.error(format!("Could not save selfie: {err}"));
                let _ = self.event_tx.send(SessionEvent::SelfieFailed {
                    code: err.code(),
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Elapsed time of the in-flight recording.
    pub fn recording_duration(&self) -> Duration {
        self.active
            .lock()
            .as_ref()
            .map(|active| active.started.elapsed())
            .unwrap_or_default()
    }

    /// Playback toggles, forwarded to the sync layer.
    pub async fn set_playing(&self, playing: bool) {
        self.playback.set_playing(playing).await;
    }

    pub fn set_muted(&self, muted: bool) {
        self.playback.set_muted(muted);
    }

    /// The bound surface reported its stream metadata.
    pub async fn on_metadata_ready(&self) {
        self.playback.on_metadata_ready().await;
    }

    pub fn toggle_fullscreen(&self) {
        self.playback.toggle_fullscreen();
    }

    /// Unmount the session: abandon any in-flight recording, release
    /// the surface binding, and stop every track.
    pub fn teardown(&self) {
        if let Some(active) = self.active.lock().take() {
            tracing::warn!("session torn down with a recording in progress");
            active.pipeline.abort();
        }
        *self.phase.write() = RecordingPhase::Idle;
        self.playback.surface().detach();
        self.acquisition.teardown();
        tracing::info!("session torn down");
    }

    fn live_stream(&self) -> Option<Arc<StreamHandle>> {
        if self.acquisition.status() != CameraStatus::Live {
            return None;
        }
        let stream = self.acquisition.handle()?;
        if stream.is_active() && stream.video().enabled() {
            Some(stream)
        } else {
            None
        }
    }
}
