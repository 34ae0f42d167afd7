//! Snapshot pipeline
//!
//! Grabs the display surface's current frame at the camera's native
//! resolution and encodes it as a high-quality JPEG. One frame, one
//! artifact; no state survives the call.

use crate::capture::traits::VideoFrame;
use crate::playback::DisplaySurface;
use crate::storage::gateway::CapturedArtifact;
use crate::utils::error::{CaptureError, CaptureResult};
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

/// Lossy but close to it.
pub const JPEG_QUALITY: u8 = 95;

/// Capture a still from the surface. Fails with `CameraNotAvailable`
/// when no frame (or no usable dimensions) is there to take, and
/// `CaptureFailed` when the encoder yields nothing.
pub async fn capture(surface: &dyn DisplaySurface) -> CaptureResult<CapturedArtifact> {
    let frame = surface
        .current_frame()
        .ok_or(CaptureError::CameraNotAvailable)?;
    if frame.width == 0 || frame.height == 0 {
        return Err(CaptureError::CameraNotAvailable);
    }

    let (width, height) = (frame.width, frame.height);
    let bytes = tokio::task::spawn_blocking(move || encode_jpeg(&frame))
        .await
        .map_err(|e| CaptureError::CaptureFailed(format!("encode task failed: {e}")))??;

    if bytes.is_empty() {
        return Err(CaptureError::CaptureFailed(
            "encoder produced no data".into(),
        ));
    }

    tracing::info!(width, height, bytes = bytes.len(), "selfie captured");
    Ok(CapturedArtifact::selfie(bytes))
}

/// Encode one RGBA frame as JPEG at native resolution.
fn encode_jpeg(frame: &VideoFrame) -> CaptureResult<Vec<u8>> {
    // JPEG has no alpha channel; repack to RGB.
    let mut rgb = Vec::with_capacity((frame.width * frame.height * 3) as usize);
    for pixel in frame.data.chunks_exact(4) {
        rgb.extend_from_slice(&pixel[..3]);
    }

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
        .encode(&rgb, frame.width, frame.height, ExtendedColorType::Rgb8)
        .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;
    Ok(out)
}
