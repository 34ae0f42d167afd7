//! End-to-end session tests over mock devices, surface, recorder, and
//! gateway. These exercise the full path from user toggles down to the
//! upload boundary without touching real hardware.

use async_trait::async_trait;
use flair::capture::stream::StreamHandle;
use flair::capture::traits::{
    AudioInputDevice, AudioSource, CameraDevice, FrameSource, Resolution, StreamConstraints,
    VideoFrame,
};
use flair::capture::MediaAcquisition;
use flair::notify::{Notifier, Severity};
use flair::playback::{DisplaySurface, PlaybackSync};
use flair::recorder::pipeline::{RecorderBackend, RecorderControl};
use flair::session::{
    CameraStatus, CaptureMode, CaptureSessionManager, RecordingPhase, SessionEvent,
};
use flair::storage::gateway::{StoredObject, UploadGateway};
use flair::{CaptureError, CaptureResult};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

// ---------------------------------------------------------------------------
// Mock collaborators

struct MockFrameSource {
    native: Resolution,
    latest: RwLock<Option<VideoFrame>>,
    stopped: Arc<AtomicBool>,
}

impl FrameSource for MockFrameSource {
    fn native_resolution(&self) -> Resolution {
        self.native
    }

    fn frame_rate(&self) -> u32 {
        30
    }

    fn latest_frame(&self) -> Option<VideoFrame> {
        self.latest.read().clone()
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

struct MockCamera {
    native: Resolution,
    fail_with: Option<fn() -> CaptureError>,
    opens: Arc<AtomicUsize>,
    stopped: Arc<AtomicBool>,
}

impl MockCamera {
    fn ok(width: u32, height: u32) -> Self {
        Self {
            native: Resolution { width, height },
            fail_with: None,
            opens: Arc::new(AtomicUsize::new(0)),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    fn denied() -> Self {
        Self {
            fail_with: Some(|| CaptureError::PermissionDenied("user declined".into())),
            ..Self::ok(640, 480)
        }
    }
}

#[async_trait]
impl CameraDevice for MockCamera {
    async fn open(&self, _constraints: &StreamConstraints) -> CaptureResult<Box<dyn FrameSource>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(fail) = self.fail_with {
            return Err(fail());
        }
        let pixels = (self.native.width * self.native.height * 4) as usize;
        Ok(Box::new(MockFrameSource {
            native: self.native,
            latest: RwLock::new(Some(VideoFrame {
                width: self.native.width,
                height: self.native.height,
                data: Arc::new(vec![0x7F; pixels]),
                sequence: 1,
            })),
            stopped: self.stopped.clone(),
        }))
    }
}

struct MockAudioSource;

impl AudioSource for MockAudioSource {
    fn sample_rate(&self) -> u32 {
        44_100
    }

    fn channels(&self) -> u16 {
        1
    }

    fn samples_captured(&self) -> u64 {
        0
    }

    fn stop(&self) {}
}

struct MockMicrophone;

#[async_trait]
impl AudioInputDevice for MockMicrophone {
    async fn open(&self) -> CaptureResult<Box<dyn AudioSource>> {
        Ok(Box::new(MockAudioSource))
    }
}

#[derive(Default)]
struct MockSurface {
    stream: RwLock<Option<Arc<StreamHandle>>>,
    playing: AtomicBool,
    muted: AtomicBool,
    play_calls: AtomicUsize,
    pause_calls: AtomicUsize,
    reject_play: AtomicBool,
}

#[async_trait]
impl DisplaySurface for MockSurface {
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
        self.play_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_play.load(Ordering::SeqCst) {
            return Err(CaptureError::CaptureFailed("autoplay policy".into()));
        }
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&self) {
        self.pause_calls.fetch_add(1, Ordering::SeqCst);
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
        Ok(())
    }
}

struct MockRecorder {
    supported: Vec<&'static str>,
    script: Vec<Vec<u8>>,
    begins: AtomicUsize,
}

impl MockRecorder {
    fn new(supported: Vec<&'static str>, script: Vec<Vec<u8>>) -> Self {
        Self {
            supported,
            script,
            begins: AtomicUsize::new(0),
        }
    }
}

struct MockControl {
    _tx: mpsc::Sender<Vec<u8>>,
}

#[async_trait]
impl RecorderControl for MockControl {
    async fn stop(self: Box<Self>) -> CaptureResult<()> {
        // Dropping the sender closes the chunk channel.
        Ok(())
    }
}

#[async_trait]
impl RecorderBackend for MockRecorder {
    fn is_type_supported(&self, mime: &str) -> bool {
        self.supported.contains(&mime)
    }

    async fn begin(
        &self,
        _stream: Arc<StreamHandle>,
        _mime: Option<&str>,
        _timeslice: Duration,
    ) -> CaptureResult<(Box<dyn RecorderControl>, mpsc::Receiver<Vec<u8>>)> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(64);
        for chunk in self.script.clone() {
            tx.send(chunk).await.expect("scripted chunk fits buffer");
        }
        Ok((Box::new(MockControl { _tx: tx }), rx))
    }
}

#[derive(Debug, Clone)]
struct UploadRecord {
    bucket: String,
    filename: String,
    content_type: String,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct MockGateway {
    records: Mutex<Vec<UploadRecord>>,
    attempts: AtomicUsize,
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

#[async_trait]
impl UploadGateway for MockGateway {
    async fn upload(
        &self,
        bucket: &str,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> CaptureResult<StoredObject> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(CaptureError::StorageError("bucket offline".into()));
        }
        self.records.lock().push(UploadRecord {
            bucket: bucket.to_string(),
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            bytes,
        });
        Ok(StoredObject {
            bucket: bucket.to_string(),
            name: filename.to_string(),
            public_url: format!("https://store.example/{bucket}/{filename}"),
            created_at: None,
        })
    }

    async fn list_newest(&self, _bucket: &str) -> CaptureResult<Option<StoredObject>> {
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Harness

struct Harness {
    manager: Arc<CaptureSessionManager>,
    acquisition: Arc<MediaAcquisition>,
    surface: Arc<MockSurface>,
    recorder: Arc<MockRecorder>,
    gateway: Arc<MockGateway>,
    notifier: Notifier,
}

fn harness(camera: MockCamera, recorder: MockRecorder) -> Harness {
    let notifier = Notifier::new();
    let surface = Arc::new(MockSurface::default());
    let playback = Arc::new(PlaybackSync::new(surface.clone(), notifier.clone()));
    let acquisition = Arc::new(MediaAcquisition::new(
        Arc::new(camera),
        Arc::new(MockMicrophone),
        playback.clone(),
        notifier.clone(),
    ));
    let recorder = Arc::new(recorder);
    let gateway = Arc::new(MockGateway::default());
    let manager = CaptureSessionManager::new(
        acquisition.clone(),
        playback,
        recorder.clone(),
        gateway.clone(),
        notifier.clone(),
    );
    Harness {
        manager,
        acquisition,
        surface,
        recorder,
        gateway,
        notifier,
    }
}

fn vp9_recorder(script: Vec<Vec<u8>>) -> MockRecorder {
    MockRecorder::new(vec!["video/webm;codecs=vp9", "video/mp4"], script)
}

async fn live_harness(script: Vec<Vec<u8>>) -> Harness {
    let h = harness(MockCamera::ok(640, 480), vp9_recorder(script));
    h.manager.initialize().await.expect("camera comes up");
    h.manager.on_metadata_ready().await;
    h
}

async fn wait_for_terminal(rx: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await.expect("event stream open") {
                event @ (SessionEvent::RecordingSaved { .. }
                | SessionEvent::RecordingFailed { .. }) => return event,
                _ => {}
            }
        }
    })
    .await
    .expect("recording settles in time")
}

fn error_message(notifier: &Notifier) -> String {
    notifier
        .current(Severity::Error)
        .map(|n| n.message)
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Mode switching

#[tokio::test]
async fn toggle_mode_flips_with_call_parity() {
    let h = harness(MockCamera::ok(640, 480), vp9_recorder(vec![]));
    assert_eq!(h.manager.mode(), CaptureMode::Video);

    for round in 1..=5 {
        let mode = h.manager.toggle_mode();
        let expected = if round % 2 == 1 {
            CaptureMode::Selfie
        } else {
            CaptureMode::Video
        };
        assert_eq!(mode, expected);
    }
}

#[tokio::test]
async fn toggle_mode_rejected_while_recording() {
    let h = live_harness(vec![vec![1, 2, 3]]).await;
    h.manager.start_recording().await.unwrap();

    let mode = h.manager.toggle_mode();

    assert_eq!(mode, CaptureMode::Video);
    assert_eq!(h.manager.mode(), CaptureMode::Video);
    assert_eq!(error_message(&h.notifier), "Cannot change mode while recording");
}

// ---------------------------------------------------------------------------
// Recording gating

#[tokio::test]
async fn start_recording_is_a_noop_in_selfie_mode() {
    let h = live_harness(vec![vec![1]]).await;
    h.manager.toggle_mode();

    h.manager.start_recording().await.unwrap();

    assert_eq!(h.recorder.begins.load(Ordering::SeqCst), 0);
    assert_eq!(h.manager.state().recording, RecordingPhase::Idle);
}

#[tokio::test]
async fn start_recording_fails_without_a_live_stream() {
    let h = harness(MockCamera::ok(640, 480), vp9_recorder(vec![vec![1]]));

    let err = h.manager.start_recording().await.unwrap_err();

    assert!(matches!(err, CaptureError::StreamNotActive));
    assert_eq!(h.recorder.begins.load(Ordering::SeqCst), 0);
    assert!(error_message(&h.notifier).starts_with("Recording failed to start"));
}

#[tokio::test]
async fn start_recording_fails_with_disabled_video_track() {
    let h = live_harness(vec![vec![1]]).await;
    h.acquisition
        .handle()
        .expect("stream is live")
        .video()
        .set_enabled(false);

    let err = h.manager.start_recording().await.unwrap_err();

    assert!(matches!(err, CaptureError::StreamNotActive));
    assert_eq!(h.recorder.begins.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn start_recording_is_a_noop_while_already_recording() {
    let h = live_harness(vec![vec![1]]).await;
    h.manager.start_recording().await.unwrap();

    h.manager.start_recording().await.unwrap();

    assert_eq!(h.recorder.begins.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Stop and finalize

#[tokio::test]
async fn empty_recording_is_reported_and_never_uploaded() {
    let h = live_harness(vec![]).await;
    let mut events = h.manager.subscribe();

    h.manager.start_recording().await.unwrap();
    h.manager.stop_recording();

    match wait_for_terminal(&mut events).await {
        SessionEvent::RecordingFailed { code, .. } => assert_eq!(code, "EMPTY_RECORDING"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(h.gateway.attempts.load(Ordering::SeqCst), 0);
    assert_eq!(error_message(&h.notifier), "No data was recorded");
    assert_eq!(h.manager.state().recording, RecordingPhase::Idle);
}

#[tokio::test]
async fn chunks_concatenate_in_arrival_order() {
    let script = vec![vec![1u8; 10], vec![2u8; 20], vec![3u8; 15]];
    let h = live_harness(script).await;
    let mut events = h.manager.subscribe();

    h.manager.start_recording().await.unwrap();
    h.manager.stop_recording();

    match wait_for_terminal(&mut events).await {
        SessionEvent::RecordingSaved { .. } => {}
        other => panic!("expected save, got {other:?}"),
    }

    let records = h.gateway.records.lock().clone();
    assert_eq!(records.len(), 1, "exactly one upload call");
    let record = &records[0];
    assert_eq!(record.bucket, "videos");
    assert_eq!(record.bytes.len(), 45);

    let mut expected = vec![1u8; 10];
    expected.extend(vec![2u8; 20]);
    expected.extend(vec![3u8; 15]);
    assert_eq!(record.bytes, expected);

    assert!(record.filename.starts_with("video-"));
    assert!(record.filename.ends_with(".webm"));
    assert_eq!(record.content_type, "video/mp4");
}

#[tokio::test]
async fn extension_follows_negotiated_mime() {
    let recorder = MockRecorder::new(vec!["video/mp4"], vec![vec![9u8; 4]]);
    let h = harness(MockCamera::ok(640, 480), recorder);
    h.manager.initialize().await.unwrap();
    let mut events = h.manager.subscribe();

    h.manager.start_recording().await.unwrap();
    h.manager.stop_recording();
    wait_for_terminal(&mut events).await;

    let records = h.gateway.records.lock().clone();
    assert!(records[0].filename.ends_with(".mp4"));
}

#[tokio::test]
async fn stop_transitions_through_stopping_to_idle() {
    let h = live_harness(vec![vec![1, 2, 3]]).await;
    *h.gateway.delay.lock() = Some(Duration::from_millis(100));
    let mut events = h.manager.subscribe();

    h.manager.start_recording().await.unwrap();
    assert_eq!(h.manager.state().recording, RecordingPhase::Recording);

    h.manager.stop_recording();
    // The phase flips immediately; Idle only arrives with the
    // pipeline's completion.
    assert_eq!(h.manager.state().recording, RecordingPhase::Stopping);

    wait_for_terminal(&mut events).await;
    assert_eq!(h.manager.state().recording, RecordingPhase::Idle);
}

#[tokio::test]
async fn upload_failure_is_reported_but_not_retried() {
    let h = live_harness(vec![vec![5u8; 8]]).await;
    h.gateway.fail.store(true, Ordering::SeqCst);
    let mut events = h.manager.subscribe();

    h.manager.start_recording().await.unwrap();
    h.manager.stop_recording();

    match wait_for_terminal(&mut events).await {
        SessionEvent::RecordingFailed { code, .. } => assert_eq!(code, "STORAGE_ERROR"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(error_message(&h.notifier).starts_with("Could not save recording"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.gateway.attempts.load(Ordering::SeqCst), 1, "no retry");
}

// ---------------------------------------------------------------------------
// Selfies

#[tokio::test]
async fn selfie_is_stored_at_native_resolution() {
    let h = live_harness(vec![]).await;
    h.manager.toggle_mode();

    h.manager.capture_selfie().await.unwrap();

    let records = h.gateway.records.lock().clone();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.bucket, "selfies");
    assert_eq!(record.content_type, "image/jpeg");
    assert!(record.filename.starts_with("selfie-"));
    assert!(record.filename.ends_with(".jpg"));

    let decoded = image::load_from_memory(&record.bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (640, 480));

    let success = h.notifier.current(Severity::Success).unwrap();
    assert_eq!(success.message, "Selfie saved");
}

#[tokio::test]
async fn selfie_without_surface_fails_and_never_uploads() {
    let h = harness(MockCamera::ok(640, 480), vp9_recorder(vec![]));
    h.manager.toggle_mode();

    let err = h.manager.capture_selfie().await.unwrap_err();

    assert!(matches!(err, CaptureError::CameraNotAvailable));
    assert_eq!(h.gateway.attempts.load(Ordering::SeqCst), 0);
    assert_eq!(error_message(&h.notifier), "Camera not available");
}

#[tokio::test]
async fn selfie_is_a_noop_in_video_mode() {
    let h = live_harness(vec![]).await;

    let err = h.manager.capture_selfie().await.unwrap_err();

    assert!(matches!(err, CaptureError::CaptureFailed(_)));
    assert_eq!(h.gateway.attempts.load(Ordering::SeqCst), 0);
}

// ---------------------------------------------------------------------------
// Acquisition and playback

#[tokio::test]
async fn permission_denied_leaves_camera_failed() {
    let h = harness(MockCamera::denied(), vp9_recorder(vec![]));

    let err = h.manager.initialize().await.unwrap_err();

    assert!(matches!(err, CaptureError::PermissionDenied(_)));
    assert!(matches!(
        h.manager.state().camera,
        CameraStatus::Failed { .. }
    ));
    assert!(h.acquisition.handle().is_none(), "no handle retained");
    assert!(!h.surface.has_stream(), "nothing bound to the surface");
    assert!(error_message(&h.notifier).starts_with("Camera error"));
}

#[tokio::test]
async fn acquisition_is_idempotent_per_session() {
    let camera = MockCamera::ok(640, 480);
    let opens = camera.opens.clone();
    let h = harness(camera, vp9_recorder(vec![]));

    h.manager.initialize().await.unwrap();
    h.manager.initialize().await.unwrap();

    assert_eq!(opens.load(Ordering::SeqCst), 1, "permission asked once");
}

#[tokio::test]
async fn metadata_ready_plays_exactly_once() {
    let h = harness(MockCamera::ok(640, 480), vp9_recorder(vec![]));
    h.manager.initialize().await.unwrap();

    // Playback defaults to playing but defers until the stream is
    // ready.
    assert_eq!(h.surface.play_calls.load(Ordering::SeqCst), 0);
    h.manager.set_playing(true).await;
    assert_eq!(h.surface.play_calls.load(Ordering::SeqCst), 0);

    h.manager.on_metadata_ready().await;
    assert_eq!(h.surface.play_calls.load(Ordering::SeqCst), 1);

    // Already playing: the redundant call is skipped entirely.
    h.manager.set_playing(true).await;
    assert_eq!(h.surface.play_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn pause_and_resume_issue_fresh_play_calls() {
    let h = live_harness(vec![]).await;
    assert_eq!(h.surface.play_calls.load(Ordering::SeqCst), 1);

    h.manager.set_playing(false).await;
    assert_eq!(h.surface.pause_calls.load(Ordering::SeqCst), 1);
    assert!(!h.surface.is_playing());

    h.manager.set_playing(true).await;
    assert_eq!(h.surface.play_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn mute_reaches_the_surface_before_readiness() {
    let h = harness(MockCamera::ok(640, 480), vp9_recorder(vec![]));
    h.manager.initialize().await.unwrap();

    h.manager.set_muted(true);
    assert!(h.surface.muted.load(Ordering::SeqCst));
    h.manager.set_muted(false);
    assert!(!h.surface.muted.load(Ordering::SeqCst));
}

#[tokio::test]
async fn rejected_play_becomes_an_error_notification() {
    let h = harness(MockCamera::ok(640, 480), vp9_recorder(vec![]));
    h.manager.initialize().await.unwrap();
    h.surface.reject_play.store(true, Ordering::SeqCst);

    h.manager.on_metadata_ready().await;

    assert!(error_message(&h.notifier).starts_with("Could not start playback"));
}

#[tokio::test]
async fn fullscreen_toggle_tracks_surface_acceptance() {
    let h = live_harness(vec![]).await;

    h.manager.toggle_fullscreen();
    assert!(h.manager.playback().is_fullscreen());

    h.manager.toggle_fullscreen();
    assert!(!h.manager.playback().is_fullscreen());
}

#[tokio::test]
async fn time_updates_flow_to_playback_position() {
    let h = live_harness(vec![]).await;

    h.manager.playback().on_time_update(12.5);

    assert_eq!(h.manager.playback().position_secs(), 12.5);
}

#[tokio::test]
async fn teardown_stops_tracks_and_clears_the_surface() {
    let camera = MockCamera::ok(640, 480);
    let stopped = camera.stopped.clone();
    let h = harness(camera, vp9_recorder(vec![]));
    h.manager.initialize().await.unwrap();

    h.manager.teardown();

    assert!(stopped.load(Ordering::SeqCst), "camera released");
    assert!(!h.surface.has_stream());
    assert_eq!(h.manager.state().camera, CameraStatus::Uninitialized);
    assert!(h.acquisition.handle().is_none());
}
