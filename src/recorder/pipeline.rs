//! Recording pipeline
//!
//! Wraps a recorder backend: negotiates the encoding, collects the
//! chunks the encoder emits, and finalizes them into a single blob on
//! stop. The chunk buffer is owned here exclusively; one recording,
//! one buffer, consumed exactly once.

use crate::capture::stream::StreamHandle;
use crate::recorder::encoding::{self, DEFAULT_VIDEO_MIME};
use crate::storage::gateway::CapturedArtifact;
use crate::utils::error::{CaptureError, CaptureResult};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// How often the recorder is asked to emit buffered data. Short enough
/// that a forced stop loses at most one interval's worth.
pub const CHUNK_TIMESLICE: Duration = Duration::from_millis(200);

/// A platform recorder the pipeline can drive.
#[async_trait]
pub trait RecorderBackend: Send + Sync {
    /// Whether the backend can encode the given mime type.
    fn is_type_supported(&self, mime: &str) -> bool;

    /// Start encoding `stream`. Encoded chunks arrive on the returned
    /// receiver in emission order; the channel closes after
    /// `RecorderControl::stop` once the final chunk is out. `mime` of
    /// None means platform default encoding.
    async fn begin(
        &self,
        stream: Arc<StreamHandle>,
        mime: Option<&str>,
        timeslice: Duration,
    ) -> CaptureResult<(Box<dyn RecorderControl>, mpsc::Receiver<Vec<u8>>)>;
}

/// Handle to a running recorder.
#[async_trait]
pub trait RecorderControl: Send {
    /// Signal end of recording; resolves once the encoder has flushed.
    async fn stop(self: Box<Self>) -> CaptureResult<()>;
}

/// One active recording: a running backend plus its chunk buffer.
pub struct RecordingPipeline {
    mime: Option<&'static str>,
    control: Box<dyn RecorderControl>,
    collector: JoinHandle<Vec<Vec<u8>>>,
}

impl RecordingPipeline {
    /// Negotiate an encoding and start the backend. The buffer starts
    /// empty on every begin.
    pub async fn begin(
        backend: &dyn RecorderBackend,
        stream: Arc<StreamHandle>,
    ) -> CaptureResult<Self> {
        let mime = encoding::negotiate(backend);
        let (control, mut chunk_rx) = backend.begin(stream, mime, CHUNK_TIMESLICE).await?;

        let collector = tokio::spawn(async move {
            let mut chunks: Vec<Vec<u8>> = Vec::new();
            while let Some(chunk) = chunk_rx.recv().await {
                if !chunk.is_empty() {
                    chunks.push(chunk);
                }
            }
            chunks
        });

        tracing::info!(mime = mime.unwrap_or("default"), "recording started");
        Ok(Self {
            mime,
            control,
            collector,
        })
    }

    /// The negotiated mime type, if any.
    pub fn mime(&self) -> Option<&'static str> {
        self.mime
    }

    /// Stop the recorder, drain the buffer, and concatenate the chunks
    /// into one artifact in arrival order.
    pub async fn finalize(self) -> CaptureResult<CapturedArtifact> {
        self.control.stop().await?;

        let chunks = self
            .collector
            .await
            .map_err(|e| CaptureError::CaptureFailed(format!("chunk collector failed: {e}")))?;

        if chunks.is_empty() {
            return Err(CaptureError::EmptyRecording);
        }

        let total: usize = chunks.iter().map(Vec::len).sum();
        let mut bytes = Vec::with_capacity(total);
        for chunk in &chunks {
            bytes.extend_from_slice(chunk);
        }

        tracing::info!(
            chunks = chunks.len(),
            bytes = bytes.len(),
            "recording finalized"
        );
        Ok(CapturedArtifact::video(
            bytes,
            self.mime.unwrap_or(DEFAULT_VIDEO_MIME),
        ))
    }

    /// Abandon the recording without finalizing. The backend is torn
    /// down by dropping its control handle.
    pub fn abort(self) {
        self.collector.abort();
        tracing::warn!("recording aborted");
    }
}
