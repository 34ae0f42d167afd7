//! Demo shell: wires the real device backends into a capture session,
//! records a short clip, then flips to selfie mode for a still.
//!
//! Needs a camera, a microphone, ffmpeg on PATH, and `SUPABASE_URL` /
//! `SUPABASE_ANON_KEY` in the environment.

use anyhow::{bail, Context, Result};
use flair::capture::{enumerate_audio_inputs, enumerate_cameras, CpalMicrophone, NokhwaCamera};
use flair::playback::HeadlessSurface;
use flair::storage::VIDEO_BUCKET;
use flair::{
    CaptureSessionManager, FfmpegRecorder, MediaAcquisition, Notifier, PlaybackSync,
    RecentCaptureFeed, SessionEvent, SupabaseStorage, UploadGateway,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    flair::init_tracing();

    if !FfmpegRecorder::is_available() {
        bail!("ffmpeg not found on PATH; install it to record");
    }

    let cameras = enumerate_cameras();
    if cameras.is_empty() {
        bail!("no cameras found");
    }
    for camera in &cameras {
        tracing::info!("camera: {} ({})", camera.name, camera.id);
    }
    for mic in enumerate_audio_inputs() {
        tracing::info!(
            "microphone: {}{}",
            mic.name,
            if mic.is_default { " [default]" } else { "" }
        );
    }

    let base_url = std::env::var("SUPABASE_URL").context("SUPABASE_URL is not set")?;
    let api_key = std::env::var("SUPABASE_ANON_KEY").context("SUPABASE_ANON_KEY is not set")?;
    let gateway: Arc<dyn UploadGateway> = Arc::new(SupabaseStorage::new(base_url, api_key));

    let notifier = Notifier::new();
    let surface = Arc::new(HeadlessSurface::new());
    let playback = Arc::new(PlaybackSync::new(surface.clone(), notifier.clone()));
    let acquisition = Arc::new(MediaAcquisition::new(
        Arc::new(NokhwaCamera::default_device()),
        Arc::new(CpalMicrophone::default_device()),
        playback.clone(),
        notifier.clone(),
    ));
    let manager = CaptureSessionManager::new(
        acquisition,
        playback,
        Arc::new(FfmpegRecorder::new()),
        gateway.clone(),
        notifier.clone(),
    );

    // Print notifications the way a banner would show them.
    let mut notifications = notifier.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = notifications.recv().await {
            if let flair::NotifyEvent::Posted(n) = event {
                tracing::info!("[{:?}] {}", n.severity, n.message);
            }
        }
    });

    manager.initialize().await?;

    // The headless surface is ready as soon as frames arrive.
    wait_for_first_frame(&manager).await?;
    manager.on_metadata_ready().await;

    let mut events = manager.subscribe();

    tracing::info!("recording for 3 seconds");
    manager.start_recording().await?;
    tokio::time::sleep(Duration::from_secs(3)).await;
    manager.stop_recording();
    wait_for_recording_result(&mut events).await?;

    manager.toggle_mode();
    manager.capture_selfie().await?;

    let feed = RecentCaptureFeed::spawn(gateway, VIDEO_BUCKET);
    tokio::time::sleep(Duration::from_secs(1)).await;
    if let Some(newest) = feed.latest() {
        tracing::info!("newest recording: {}", newest.public_url);
    }

    manager.teardown();
    Ok(())
}

async fn wait_for_first_frame(manager: &CaptureSessionManager) -> Result<()> {
    for _ in 0..100 {
        if manager.playback().has_frame() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    bail!("camera produced no frames");
}

async fn wait_for_recording_result(
    events: &mut tokio::sync::broadcast::Receiver<SessionEvent>,
) -> Result<()> {
    loop {
        match events.recv().await {
            Ok(SessionEvent::RecordingSaved { object }) => {
                tracing::info!("saved as {}", object.public_url);
                return Ok(());
            }
            Ok(SessionEvent::RecordingFailed { reason, .. }) => {
                bail!("recording failed: {reason}");
            }
            Ok(_) => {}
            Err(err) => bail!("event stream closed: {err}"),
        }
    }
}
