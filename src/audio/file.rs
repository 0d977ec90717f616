use anyhow::{Context, Result};
use hound::WavReader;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use super::backend::{AudioBackend, AudioFrame, CaptureConfig};
use super::encoder::FrameEncoder;
use crate::error::DeviceError;

/// A WAV file loaded into memory, used for voice enrollment uploads and as
/// deterministic capture input in tests.
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let reader = WavReader::open(path)
            .with_context(|| format!("failed to open WAV file {:?}", path))?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to read audio samples")?;

        let duration_seconds =
            samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "loaded {:?}: {:.1}s, {}Hz, {} channel(s)",
            path, duration_seconds, spec.sample_rate, spec.channels
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Downmix to mono and normalize into [-1, 1] floats for the encoder.
    pub fn mono_f32(&self) -> Vec<f32> {
        if self.channels <= 1 {
            return self.samples.iter().map(|&s| s as f32 / 32768.0).collect();
        }
        self.samples
            .chunks_exact(self.channels as usize)
            .map(|frame| {
                let sum: f32 = frame.iter().map(|&s| s as f32 / 32768.0).sum();
                sum / self.channels as f32
            })
            .collect()
    }
}

/// Capture backend that replays a WAV file at real frame cadence.
///
/// After the file runs out the frame channel stays open until `stop`, the
/// way a silent microphone would behave.
pub struct FileBackend {
    path: PathBuf,
    config: CaptureConfig,
    task: Option<JoinHandle<()>>,
    capturing: bool,
}

impl FileBackend {
    pub fn new(path: PathBuf, config: CaptureConfig) -> Self {
        Self {
            path,
            config,
            task: None,
            capturing: false,
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for FileBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, DeviceError> {
        if self.capturing {
            return Err(DeviceError::Busy);
        }

        let audio = AudioFile::open(&self.path)
            .map_err(|e| DeviceError::Unavailable(format!("{:#}", e)))?;

        let mut encoder = FrameEncoder::new(
            audio.sample_rate,
            self.config.sample_rate,
            self.config.frame_samples,
        )?;
        let frames = encoder.push(&audio.mono_f32());

        let (tx, rx) = mpsc::channel(16);
        let sample_rate = self.config.sample_rate;
        let frame_duration = self.config.frame_duration();
        let frame_ms = frame_duration.as_millis() as u64;

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(frame_duration);
            for (index, samples) in frames.into_iter().enumerate() {
                ticker.tick().await;
                let frame = AudioFrame {
                    samples,
                    sample_rate,
                    channels: 1,
                    timestamp_ms: index as u64 * frame_ms,
                };
                if tx.send(frame).await.is_err() {
                    return;
                }
            }
            // File exhausted. Hold the sender so the consumer keeps waiting
            // as it would on a quiet microphone.
            std::future::pending::<()>().await;
        }));
        self.capturing = true;

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<(), DeviceError> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "wav file"
    }
}
