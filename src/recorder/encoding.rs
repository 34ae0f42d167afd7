//! Encoding negotiation
//!
//! The recording pipeline probes a fixed, ordered preference list of
//! container/codec pairs and takes the first one the backend supports.
//! When nothing on the list is available the recorder falls back to
//! its platform default with no explicit type; that is a degrade, not
//! an error.

use crate::recorder::pipeline::RecorderBackend;

/// Preferred mime types, best first.
pub const MIME_PREFERENCE: [&str; 4] = [
    "video/webm;codecs=vp9",
    "video/webm;codecs=vp8",
    "video/webm",
    "video/mp4",
];

/// Mime type a finalized blob is tagged with when none was negotiated.
pub const DEFAULT_VIDEO_MIME: &str = "video/webm";

/// Pick the first supported mime type; None means platform default.
pub fn negotiate(backend: &dyn RecorderBackend) -> Option<&'static str> {
    for mime in MIME_PREFERENCE {
        if backend.is_type_supported(mime) {
            tracing::info!("Using mime type: {mime}");
            return Some(mime);
        }
    }
    tracing::warn!("No preferred mime type supported, using platform default encoding");
    None
}

/// File extension for a recording. WebM keeps its name; everything
/// else is labeled mp4, even though the actual container follows the
/// negotiated mime type rather than the extension.
pub fn extension_for(mime: Option<&str>) -> &'static str {
    match mime {
        Some(m) if m.starts_with("video/webm") => "webm",
        _ => "mp4",
    }
}

/// FFmpeg encoder needed to honor a mime type.
pub fn encoder_for(mime: &str) -> Option<&'static str> {
    match mime {
        "video/webm;codecs=vp9" => Some("libvpx-vp9"),
        "video/webm;codecs=vp8" | "video/webm" => Some("libvpx"),
        "video/mp4" => Some("libx264"),
        _ => None,
    }
}
