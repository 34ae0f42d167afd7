//! Microphone backend using cpal
//!
//! The cpal stream is not Send, so each open microphone lives on its
//! own thread; the rest of the crate sees it through the AudioSource
//! trait.

use crate::capture::traits::{AudioDeviceInfo, AudioInputDevice, AudioSource};
use crate::utils::error::{CaptureError, CaptureResult};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Get list of available audio input devices (microphones)
pub fn enumerate_audio_inputs() -> Vec<AudioDeviceInfo> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    match host.input_devices() {
        Ok(devices) => devices
            .filter_map(|device| device.name().ok())
            .map(|name| AudioDeviceInfo {
                id: name.clone(),
                is_default: default_name.as_deref() == Some(name.as_str()),
                name,
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to enumerate audio devices: {:?}", e);
            Vec::new()
        }
    }
}

/// A microphone addressed by device name (None = default input).
pub struct CpalMicrophone {
    device_id: Option<String>,
}

impl CpalMicrophone {
    pub fn new(device_id: Option<String>) -> Self {
        Self { device_id }
    }

    pub fn default_device() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl AudioInputDevice for CpalMicrophone {
    async fn open(&self) -> CaptureResult<Box<dyn AudioSource>> {
        let device_id = self.device_id.clone();
        let running = Arc::new(AtomicBool::new(true));
        let samples = Arc::new(AtomicU64::new(0));
        let (meta_tx, meta_rx) = oneshot::channel::<CaptureResult<(u32, u16)>>();

        let thread_running = running.clone();
        let thread_samples = samples.clone();
        let thread = std::thread::Builder::new()
            .name("flair-mic".into())
            .spawn(move || {
                let host = cpal::default_host();
                let device = match &device_id {
                    Some(id) => host.input_devices().ok().and_then(|mut devices| {
                        devices.find(|d| d.name().map(|n| &n == id).unwrap_or(false))
                    }),
                    None => host.default_input_device(),
                };
                let Some(device) = device else {
                    let _ = meta_tx.send(Err(CaptureError::DeviceUnavailable(
                        "no audio input device found".into(),
                    )));
                    return;
                };

                let config = match device.default_input_config() {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = meta_tx.send(Err(CaptureError::DeviceUnavailable(format!(
                            "no usable input config: {e}"
                        ))));
                        return;
                    }
                };
                let sample_rate = config.sample_rate().0;
                let channels = config.channels();
                let sample_format = config.sample_format();

                let counter = thread_samples;
                let err_fn = |err| tracing::warn!("audio input error: {err}");
                let stream = match sample_format {
                    cpal::SampleFormat::F32 => device.build_input_stream(
                        &config.into(),
                        move |data: &[f32], _: &cpal::InputCallbackInfo| {
                            counter.fetch_add(data.len() as u64, Ordering::Relaxed);
                        },
                        err_fn,
                        None,
                    ),
                    cpal::SampleFormat::I16 => device.build_input_stream(
                        &config.into(),
                        move |data: &[i16], _: &cpal::InputCallbackInfo| {
                            counter.fetch_add(data.len() as u64, Ordering::Relaxed);
                        },
                        err_fn,
                        None,
                    ),
                    cpal::SampleFormat::U16 => device.build_input_stream(
                        &config.into(),
                        move |data: &[u16], _: &cpal::InputCallbackInfo| {
                            counter.fetch_add(data.len() as u64, Ordering::Relaxed);
                        },
                        err_fn,
                        None,
                    ),
                    other => {
                        let _ = meta_tx.send(Err(CaptureError::DeviceUnavailable(format!(
                            "unsupported sample format: {other}"
                        ))));
                        return;
                    }
                };

                let stream = match stream {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = meta_tx.send(Err(CaptureError::DeviceUnavailable(format!(
                            "failed to open input stream: {e}"
                        ))));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = meta_tx.send(Err(CaptureError::DeviceUnavailable(format!(
                        "failed to start input stream: {e}"
                    ))));
                    return;
                }

                tracing::info!("Microphone opened: {}Hz, {}ch", sample_rate, channels);
                let _ = meta_tx.send(Ok((sample_rate, channels)));

                // The stream stays alive as long as this thread holds it.
                while thread_running.load(Ordering::SeqCst) {
                    std::thread::sleep(Duration::from_millis(50));
                }
                drop(stream);
                tracing::debug!("Microphone capture thread stopped");
            })
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

        let (sample_rate, channels) = match meta_rx.await {
            Ok(result) => result?,
            Err(_) => {
                return Err(CaptureError::DeviceUnavailable(
                    "audio thread exited before reporting a format".into(),
                ))
            }
        };

        Ok(Box::new(CpalSource {
            sample_rate,
            channels,
            samples,
            running,
            thread: Mutex::new(Some(thread)),
        }))
    }
}

struct CpalSource {
    sample_rate: u32,
    channels: u16,
    samples: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl AudioSource for CpalSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn samples_captured(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }
}
