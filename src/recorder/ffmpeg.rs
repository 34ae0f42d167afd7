//! FFmpeg recorder backend
//!
//! Encodes the live stream by piping raw RGBA frames into an FFmpeg
//! process and reading the encoded container back from its stdout in
//! timeslice-sized chunks. Codec support is probed once from
//! `ffmpeg -encoders`.

use crate::capture::stream::StreamHandle;
use crate::recorder::encoding;
use crate::recorder::pipeline::{RecorderBackend, RecorderControl};
use crate::utils::error::{CaptureError, CaptureResult};
use async_trait::async_trait;
use std::collections::HashSet;
use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

pub struct FfmpegRecorder {
    encoders: OnceLock<HashSet<String>>,
}

impl FfmpegRecorder {
    pub fn new() -> Self {
        Self {
            encoders: OnceLock::new(),
        }
    }

    /// Check that the ffmpeg binary is reachable at all.
    pub fn is_available() -> bool {
        Command::new("ffmpeg").arg("-version").output().is_ok()
    }

    fn encoders(&self) -> &HashSet<String> {
        self.encoders.get_or_init(|| {
            let output = Command::new("ffmpeg")
                .args(["-hide_banner", "-encoders"])
                .output();
            match output {
                Ok(out) if out.status.success() => {
                    parse_encoders(&String::from_utf8_lossy(&out.stdout))
                }
                Ok(out) => {
                    tracing::warn!("ffmpeg -encoders exited with {}", out.status);
                    HashSet::new()
                }
                Err(e) => {
                    tracing::warn!("failed to probe ffmpeg encoders: {e}");
                    HashSet::new()
                }
            }
        })
    }
}

impl Default for FfmpegRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecorderBackend for FfmpegRecorder {
    fn is_type_supported(&self, mime: &str) -> bool {
        match encoding::encoder_for(mime) {
            Some(encoder) => self.encoders().contains(encoder),
            None => false,
        }
    }

    async fn begin(
        &self,
        stream: Arc<StreamHandle>,
        mime: Option<&str>,
        timeslice: Duration,
    ) -> CaptureResult<(Box<dyn RecorderControl>, mpsc::Receiver<Vec<u8>>)> {
        let resolution = stream.video().native_resolution();
        let fps = stream.video().frame_rate().max(1);

        let mut args: Vec<String> = vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pixel_format".into(),
            "rgba".into(),
            "-video_size".into(),
            format!("{}x{}", resolution.width, resolution.height),
            "-framerate".into(),
            fps.to_string(),
            "-i".into(),
            "-".into(),
        ];
        args.extend(codec_args(mime).into_iter().map(String::from));
        args.push("-".into());

        tracing::info!(
            "Starting FFmpeg recorder: {}x{} @ {}fps, mime={}",
            resolution.width,
            resolution.height,
            fps,
            mime.unwrap_or("default")
        );

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| CaptureError::CaptureFailed("failed to open encoder stdin".into()))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::CaptureFailed("failed to open encoder stdout".into()))?;

        let running = Arc::new(AtomicBool::new(true));
        let (chunk_tx, chunk_rx) = mpsc::channel::<Vec<u8>>(64);

        // Frame pump: ticks at the capture rate, feeding the latest
        // frame into the encoder. Closing stdin on exit is what tells
        // FFmpeg to flush and finish.
        let pump_running = running.clone();
        let pump_stream = stream.clone();
        let frame_interval = Duration::from_secs_f64(1.0 / fps as f64);
        let expected_len = (resolution.width * resolution.height * 4) as usize;
        let pump = std::thread::Builder::new()
            .name("flair-frame-pump".into())
            .spawn(move || {
                let mut written: u64 = 0;
                while pump_running.load(Ordering::SeqCst) {
                    let tick = Instant::now();
                    if let Some(frame) = pump_stream.video().latest_frame() {
                        if frame.data.len() == expected_len {
                            if stdin.write_all(&frame.data).is_err() {
                                tracing::warn!("encoder closed its input after {written} frames");
                                break;
                            }
                            written += 1;
                        } else {
                            tracing::debug!(
                                got = frame.data.len(),
                                expected = expected_len,
                                "skipping frame with unexpected size"
                            );
                        }
                    }
                    if let Some(rest) = frame_interval.checked_sub(tick.elapsed()) {
                        std::thread::sleep(rest);
                    }
                }
                drop(stdin);
                tracing::debug!("frame pump stopped after {written} frames");
            })
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;

        // Chunk reader: groups encoder output into timeslice-sized
        // chunks; dropping the sender closes the pipeline's channel.
        let reader = std::thread::Builder::new()
            .name("flair-chunk-reader".into())
            .spawn(move || {
                let mut pending: Vec<u8> = Vec::new();
                let mut last_emit = Instant::now();
                let mut buf = [0u8; 8192];
                loop {
                    match stdout.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            pending.extend_from_slice(&buf[..n]);
                            if last_emit.elapsed() >= timeslice && !pending.is_empty() {
                                if chunk_tx.blocking_send(std::mem::take(&mut pending)).is_err() {
                                    return;
                                }
                                last_emit = Instant::now();
                            }
                        }
                        Err(e) => {
                            tracing::warn!("failed to read encoder output: {e}");
                            break;
                        }
                    }
                }
                if !pending.is_empty() {
                    let _ = chunk_tx.blocking_send(pending);
                }
            })
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))?;

        let control = FfmpegControl {
            running,
            child: Some(child),
            pump: Some(pump),
            reader: Some(reader),
        };
        Ok((Box::new(control), chunk_rx))
    }
}

struct FfmpegControl {
    running: Arc<AtomicBool>,
    child: Option<Child>,
    pump: Option<std::thread::JoinHandle<()>>,
    reader: Option<std::thread::JoinHandle<()>>,
}

#[async_trait]
impl RecorderControl for FfmpegControl {
    async fn stop(mut self: Box<Self>) -> CaptureResult<()> {
        self.running.store(false, Ordering::SeqCst);
        let pump = self.pump.take();
        let reader = self.reader.take();
        let child = self.child.take();

        tokio::task::spawn_blocking(move || -> CaptureResult<()> {
            if let Some(handle) = pump {
                let _ = handle.join();
            }
            if let Some(mut child) = child {
                let status = child.wait()?;
                if !status.success() {
                    tracing::warn!("encoder exited with {status}");
                }
            }
            if let Some(handle) = reader {
                let _ = handle.join();
            }
            Ok(())
        })
        .await
        .map_err(|e| CaptureError::CaptureFailed(format!("encoder shutdown failed: {e}")))??;

        Ok(())
    }
}

impl Drop for FfmpegControl {
    fn drop(&mut self) {
        // Only reached when the recording was abandoned rather than
        // stopped; a clean stop() already took the child.
        if let Some(mut child) = self.child.take() {
            self.running.store(false, Ordering::SeqCst);
            let _ = child.kill();
        }
    }
}

/// Container/codec arguments for the negotiated mime type. No
/// negotiated type means FFmpeg picks its own defaults.
fn codec_args(mime: Option<&str>) -> Vec<&'static str> {
    match mime {
        Some("video/webm;codecs=vp9") => vec![
            "-c:v",
            "libvpx-vp9",
            "-deadline",
            "realtime",
            "-cpu-used",
            "8",
            "-b:v",
            "0",
            "-crf",
            "32",
            "-f",
            "webm",
        ],
        Some("video/webm;codecs=vp8") | Some("video/webm") => vec![
            "-c:v",
            "libvpx",
            "-deadline",
            "realtime",
            "-cpu-used",
            "8",
            "-b:v",
            "1M",
            "-f",
            "webm",
        ],
        Some("video/mp4") => vec![
            "-c:v",
            "libx264",
            "-preset",
            "veryfast",
            "-crf",
            "18",
            "-pix_fmt",
            "yuv420p",
            // A plain mp4 cannot be written to a pipe; fragmenting
            // keeps the stream seekless-friendly.
            "-movflags",
            "frag_keyframe+empty_moov",
            "-f",
            "mp4",
        ],
        _ => vec!["-f", "matroska"],
    }
}

/// Parse `ffmpeg -encoders` output into the set of encoder names.
/// Lines look like ` V....D libx264    H.264 / AVC ...`; the name is
/// the second column after the capability flags.
fn parse_encoders(listing: &str) -> HashSet<String> {
    listing
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let flags = parts.next()?;
            let name = parts.next()?;
            // Legend lines ("V..... = Video") share the flag shape.
            if flags.len() == 6 && flags.starts_with('V') && name != "=" {
                Some(name.to_string())
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_LISTING: &str = "\
Encoders:
 V..... = Video
 A..... = Audio
 ------
 V....D libx264              H.264 / AVC / MPEG-4 AVC
 V....D libvpx               libvpx VP8
 V....D libvpx-vp9           libvpx VP9
 A....D aac                  AAC (Advanced Audio Coding)
";

    #[test]
    fn test_parse_encoders_picks_video_encoders() {
        let encoders = parse_encoders(SAMPLE_LISTING);
        assert!(encoders.contains("libx264"));
        assert!(encoders.contains("libvpx"));
        assert!(encoders.contains("libvpx-vp9"));
    }

    #[test]
    fn test_parse_encoders_skips_audio_and_headers() {
        let encoders = parse_encoders(SAMPLE_LISTING);
        assert!(!encoders.contains("aac"));
        assert!(!encoders.contains("Video"));
        assert!(!encoders.contains("="));
    }

    #[test]
    fn test_codec_args_match_negotiated_container() {
        assert!(codec_args(Some("video/webm;codecs=vp9")).contains(&"libvpx-vp9"));
        assert!(codec_args(Some("video/webm")).contains(&"libvpx"));
        assert!(codec_args(Some("video/mp4")).contains(&"libx264"));
        // Platform default: no explicit codec at all.
        let default_args = codec_args(None);
        assert!(!default_args.contains(&"-c:v"));
    }
}
