//! Webcam backend using nokhwa
//!
//! Frames are captured on a dedicated thread, decoded to RGBA, and
//! published through a latest-frame slot that the recorder and
//! snapshot paths read from.

use crate::capture::traits::{
    CameraDevice, CameraInfo, FrameSource, Resolution, StreamConstraints, VideoFrame,
};
use crate::utils::error::{CaptureError, CaptureResult};
use async_trait::async_trait;
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution as NokhwaResolution,
};
use nokhwa::Camera;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Get list of available cameras
pub fn enumerate_cameras() -> Vec<CameraInfo> {
    match nokhwa::query(ApiBackend::Auto) {
        Ok(cameras) => cameras
            .into_iter()
            .map(|info| {
                let id = match info.index() {
                    CameraIndex::Index(i) => i.to_string(),
                    CameraIndex::String(s) => s.to_string(),
                };
                let name = info.human_name().to_string();

                // Common resolutions
                let resolutions = vec![
                    Resolution {
                        width: 1920,
                        height: 1080,
                    },
                    Resolution {
                        width: 1280,
                        height: 720,
                    },
                    Resolution {
                        width: 640,
                        height: 480,
                    },
                ];

                CameraInfo {
                    id,
                    name,
                    supported_resolutions: resolutions,
                }
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate cameras: {:?}", e);
            Vec::new()
        }
    }
}

/// A physical webcam addressed by device ID (None = default camera).
pub struct NokhwaCamera {
    device_id: Option<String>,
}

impl NokhwaCamera {
    pub fn new(device_id: Option<String>) -> Self {
        Self { device_id }
    }

    pub fn default_device() -> Self {
        Self::new(None)
    }

    /// Get camera index from device_id
    fn camera_index(&self) -> CameraIndex {
        match &self.device_id {
            Some(id) => {
                // Try to parse as integer first
                if let Ok(idx) = id.parse::<u32>() {
                    CameraIndex::Index(idx)
                } else {
                    CameraIndex::String(id.clone())
                }
            }
            None => CameraIndex::Index(0),
        }
    }
}

#[async_trait]
impl CameraDevice for NokhwaCamera {
    async fn open(&self, constraints: &StreamConstraints) -> CaptureResult<Box<dyn FrameSource>> {
        let camera_index = self.camera_index();
        let requested = RequestedFormat::new::<RgbAFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                NokhwaResolution::new(constraints.ideal.width, constraints.ideal.height),
                FrameFormat::MJPEG,
                constraints.frame_rate,
            ),
        ));

        let running = Arc::new(AtomicBool::new(true));
        let latest: Arc<RwLock<Option<VideoFrame>>> = Arc::new(RwLock::new(None));
        let (meta_tx, meta_rx) = oneshot::channel::<CaptureResult<(Resolution, u32)>>();

        let thread_running = running.clone();
        let thread_latest = latest.clone();
        let thread = std::thread::Builder::new()
            .name("flair-camera".into())
            .spawn(move || {
                let mut camera = match Camera::new(camera_index.clone(), requested) {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::error!("Failed to open camera {:?}: {:?}", camera_index, e);
                        let _ = meta_tx.send(Err(map_camera_error(&e)));
                        return;
                    }
                };

                if let Err(e) = camera.open_stream() {
                    tracing::error!("Failed to open camera stream: {:?}", e);
                    let _ = meta_tx.send(Err(map_camera_error(&e)));
                    return;
                }

                let format = camera.camera_format();
                let native = Resolution {
                    width: format.resolution().width(),
                    height: format.resolution().height(),
                };
                let fps = format.frame_rate();
                tracing::info!(
                    "Camera opened: {}x{} @ {}fps, format={:?}",
                    native.width,
                    native.height,
                    fps,
                    format.format()
                );
                let _ = meta_tx.send(Ok((native, fps)));

                let mut sequence: u64 = 0;
                while thread_running.load(Ordering::SeqCst) {
                    // Blocks until the camera delivers the next frame;
                    // the device controls the pacing.
                    match camera.frame() {
                        Ok(frame) => match frame.decode_image::<RgbAFormat>() {
                            Ok(decoded) => {
                                sequence += 1;
                                let video_frame = VideoFrame {
                                    width: decoded.width(),
                                    height: decoded.height(),
                                    data: Arc::new(decoded.into_raw()),
                                    sequence,
                                };
                                *thread_latest.write() = Some(video_frame);
                            }
                            Err(e) => {
                                tracing::debug!("Failed to decode frame: {:?}", e);
                            }
                        },
                        Err(e) => {
                            tracing::debug!("Failed to capture frame: {:?}", e);
                        }
                    }
                }

                if let Err(e) = camera.stop_stream() {
                    tracing::warn!("Error stopping camera stream: {:?}", e);
                }
                tracing::info!("Camera capture thread stopped after {} frames", sequence);
            })
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

        let (native, fps) = match meta_rx.await {
            Ok(result) => result?,
            Err(_) => {
                return Err(CaptureError::DeviceUnavailable(
                    "camera thread exited before reporting a format".into(),
                ))
            }
        };

        Ok(Box::new(NokhwaSource {
            native,
            fps,
            latest,
            running,
            thread: Mutex::new(Some(thread)),
        }))
    }
}

struct NokhwaSource {
    native: Resolution,
    fps: u32,
    latest: Arc<RwLock<Option<VideoFrame>>>,
    running: Arc<AtomicBool>,
    thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl FrameSource for NokhwaSource {
    fn native_resolution(&self) -> Resolution {
        self.native
    }

    fn frame_rate(&self) -> u32 {
        self.fps
    }

    fn latest_frame(&self) -> Option<VideoFrame> {
        self.latest.read().clone()
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }
}

/// The device layer reports permission problems and missing hardware
/// with the same error type; split them on the message.
fn map_camera_error(err: &nokhwa::NokhwaError) -> CaptureError {
    let message = err.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("permission") || lowered.contains("denied") || lowered.contains("authoriz")
    {
        CaptureError::PermissionDenied(message)
    } else {
        CaptureError::DeviceUnavailable(message)
    }
}
