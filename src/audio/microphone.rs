//! Microphone capture using CPAL (Cross-Platform Audio Library).

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::backend::{AudioBackend, AudioFrame, CaptureConfig};
use super::encoder::FrameEncoder;
use crate::error::DeviceError;

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is only touched behind the Mutex in MicrophoneBackend,
/// one caller at a time, and its methods are invoked synchronously.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Microphone capture backend.
///
/// Requests a mono stream at the target rate first (PipeWire/PulseAudio and
/// CoreAudio convert transparently); falls back to the device's native
/// config with software downmix and block-average downsampling.
pub struct MicrophoneBackend {
    config: CaptureConfig,
    stream: Arc<Mutex<Option<SendableStream>>>,
    sender: Arc<Mutex<Option<mpsc::Sender<AudioFrame>>>>,
    capturing: bool,
}

impl MicrophoneBackend {
    pub fn new(config: CaptureConfig) -> Result<Self, DeviceError> {
        info!(
            "microphone backend initialized ({}Hz, {} samples/frame)",
            config.sample_rate, config.frame_samples
        );

        Ok(Self {
            config,
            stream: Arc::new(Mutex::new(None)),
            sender: Arc::new(Mutex::new(None)),
            capturing: false,
        })
    }

    fn resolve_device(&self) -> Result<cpal::Device, DeviceError> {
        let host = cpal::default_host();

        if let Some(name) = &self.config.device {
            let devices = host
                .input_devices()
                .map_err(|e| DeviceError::Unavailable(format!("device enumeration failed: {}", e)))?;
            for device in devices {
                if let Ok(device_name) = device.name() {
                    if device_name == *name {
                        return Ok(device);
                    }
                }
            }
            return Err(DeviceError::Unavailable(format!(
                "input device {:?} not found",
                name
            )));
        }

        host.default_input_device()
            .ok_or_else(|| DeviceError::Unavailable("no default input device".to_string()))
    }

    /// Build the input stream, preferring mono at the target rate so the
    /// encoder runs with a window of one.
    fn build_stream(
        &self,
        device: &cpal::Device,
        tx: mpsc::Sender<AudioFrame>,
    ) -> Result<cpal::Stream, DeviceError> {
        let preferred = cpal::StreamConfig {
            channels: self.config.channels,
            sample_rate: cpal::SampleRate(self.config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        if let Ok(encoder) = FrameEncoder::new(
            self.config.sample_rate,
            self.config.sample_rate,
            self.config.frame_samples,
        ) {
            let callback = self.frame_callback(encoder, self.config.channels as usize, tx.clone());
            if let Ok(stream) =
                device.build_input_stream(&preferred, callback, stream_error_hook(&self.sender), None)
            {
                return Ok(stream);
            }
        }

        // Native fallback: capture at the device's own rate and channel
        // count, convert in software.
        let native = device
            .default_input_config()
            .map_err(|e| DeviceError::Unavailable(format!("no usable input config: {}", e)))?;
        let native_rate = native.sample_rate().0;
        let native_channels = native.channels() as usize;
        let stream_config: cpal::StreamConfig = native.clone().into();

        debug!(
            "using native capture format ({}ch/{}Hz/{:?})",
            native_channels,
            native_rate,
            native.sample_format()
        );

        let encoder = FrameEncoder::new(
            native_rate,
            self.config.sample_rate,
            self.config.frame_samples,
        )?;

        match native.sample_format() {
            cpal::SampleFormat::F32 => {
                let callback = self.frame_callback(encoder, native_channels, tx);
                device
                    .build_input_stream(&stream_config, callback, stream_error_hook(&self.sender), None)
                    .map_err(map_build_error)
            }
            cpal::SampleFormat::I16 => {
                let mut callback = self.frame_callback(encoder, native_channels, tx);
                device
                    .build_input_stream(
                        &stream_config,
                        move |data: &[i16], info: &cpal::InputCallbackInfo| {
                            let floats: Vec<f32> =
                                data.iter().map(|&s| s as f32 / 32768.0).collect();
                            callback(&floats, info);
                        },
                        stream_error_hook(&self.sender),
                        None,
                    )
                    .map_err(map_build_error)
            }
            fmt => Err(DeviceError::UnsupportedFormat(format!(
                "native sample format {:?}",
                fmt
            ))),
        }
    }

    /// Data callback: downmix to mono, feed the encoder, forward every
    /// completed frame with a timestamp derived from the frame count.
    fn frame_callback(
        &self,
        mut encoder: FrameEncoder,
        channels: usize,
        tx: mpsc::Sender<AudioFrame>,
    ) -> impl FnMut(&[f32], &cpal::InputCallbackInfo) + Send + 'static {
        let sample_rate = self.config.sample_rate;
        let frame_ms = self.config.frame_duration().as_millis() as u64;
        let mut frames_emitted: u64 = 0;

        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            let mono = downmix(data, channels);
            for samples in encoder.push(&mono) {
                let frame = AudioFrame {
                    samples,
                    sample_rate,
                    channels: 1,
                    timestamp_ms: frames_emitted * frame_ms,
                };
                frames_emitted += 1;
                // Receiver lagging means the session is wedged; dropping
                // here beats blocking the audio thread.
                let _ = tx.try_send(frame);
            }
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for MicrophoneBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, DeviceError> {
        if self.capturing {
            return Err(DeviceError::Busy);
        }

        if !self.config.echo_cancellation || !self.config.noise_suppression {
            // Input processing is configured at the OS level; cpal has no
            // per-stream toggle, so the flags are advisory on this backend.
            debug!("echo cancellation/noise suppression flags are advisory");
        }

        let device = self.resolve_device()?;
        let (tx, rx) = mpsc::channel(64);

        {
            let mut sender = lock_or_unavailable(&self.sender)?;
            *sender = Some(tx.clone());
        }

        let stream = self.build_stream(&device, tx)?;
        stream.play().map_err(map_play_error)?;

        {
            let mut guard = lock_or_unavailable(&self.stream)?;
            *guard = Some(SendableStream(stream));
        }
        self.capturing = true;

        info!("microphone capture started");
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), DeviceError> {
        if !self.capturing {
            return Ok(());
        }

        if let Some(stream) = lock_or_unavailable(&self.stream)?.take() {
            if let Err(e) = stream.0.pause() {
                warn!("failed to pause input stream: {}", e);
            }
        }
        // Dropping the sender closes the frame channel, which is how
        // consumers learn that capture ended.
        lock_or_unavailable(&self.sender)?.take();
        self.capturing = false;

        info!("microphone capture stopped");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "cpal microphone"
    }
}

/// Mix interleaved multi-channel samples down to mono by averaging.
fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Error hook for the running stream. A device failure drops the frame
/// sender so the consumer observes end-of-capture instead of silence.
fn stream_error_hook(
    sender: &Arc<Mutex<Option<mpsc::Sender<AudioFrame>>>>,
) -> impl FnMut(cpal::StreamError) + Send + 'static {
    let sender = Arc::clone(sender);
    move |err| {
        warn!("input stream error: {}", err);
        if let Ok(mut guard) = sender.lock() {
            guard.take();
        }
    }
}

fn lock_or_unavailable<T>(
    mutex: &Arc<Mutex<T>>,
) -> Result<std::sync::MutexGuard<'_, T>, DeviceError> {
    mutex
        .lock()
        .map_err(|_| DeviceError::Unavailable("capture state poisoned".to_string()))
}

fn map_build_error(e: cpal::BuildStreamError) -> DeviceError {
    match e {
        cpal::BuildStreamError::DeviceNotAvailable => {
            DeviceError::Unavailable("input device disappeared".to_string())
        }
        cpal::BuildStreamError::StreamConfigNotSupported => {
            DeviceError::UnsupportedFormat("requested stream config not supported".to_string())
        }
        other => {
            let message = other.to_string();
            if message.to_lowercase().contains("permission")
                || message.to_lowercase().contains("denied")
            {
                DeviceError::PermissionDenied
            } else {
                DeviceError::Unavailable(message)
            }
        }
    }
}

fn map_play_error(e: cpal::PlayStreamError) -> DeviceError {
    match e {
        cpal::PlayStreamError::DeviceNotAvailable => {
            DeviceError::Unavailable("input device disappeared".to_string())
        }
        other => DeviceError::Unavailable(other.to_string()),
    }
}
