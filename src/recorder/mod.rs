//! Recording pipeline
//!
//! Encoding negotiation, chunk buffering, and finalization around a
//! pluggable recorder backend. The FFmpeg backend is the stock
//! implementation.

pub mod encoding;
pub mod ffmpeg;
pub mod pipeline;

pub use encoding::{DEFAULT_VIDEO_MIME, MIME_PREFERENCE};
pub use ffmpeg::FfmpegRecorder;
pub use pipeline::{RecorderBackend, RecorderControl, RecordingPipeline, CHUNK_TIMESLICE};
