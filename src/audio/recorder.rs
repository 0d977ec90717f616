use anyhow::{Context, Result};
use std::io::Cursor;
use std::path::Path;
use tokio::sync::mpsc;
use tracing::info;

use super::backend::AudioFrame;

/// Accumulating recorder for the enrollment/bulk-upload path.
///
/// Unlike the live streaming pipeline, which drops audio produced while the
/// socket is down, this recorder keeps every captured chunk and yields one
/// artifact when capture ends.
pub struct VoiceRecorder {
    sample_rate: u32,
    channels: u16,
    samples: Vec<i16>,
}

impl VoiceRecorder {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            samples: Vec::new(),
        }
    }

    /// Append one captured frame.
    pub fn push(&mut self, frame: &AudioFrame) {
        self.samples.extend_from_slice(&frame.samples);
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }

    /// Consume frames until the channel closes, then finish.
    pub async fn record(mut self, mut rx: mpsc::Receiver<AudioFrame>) -> RecordedAudio {
        info!("recording started");

        while let Some(frame) = rx.recv().await {
            self.push(&frame);
        }

        info!(
            "recording complete: {:.1}s captured",
            self.duration_seconds()
        );
        self.finish()
    }

    /// Seal the recording into a retrievable artifact.
    pub fn finish(self) -> RecordedAudio {
        RecordedAudio {
            samples: self.samples,
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }
}

/// A completed recording, retrievable for playback or upload.
#[derive(Debug, Clone)]
pub struct RecordedAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl RecordedAudio {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }

    fn wav_spec(&self) -> hound::WavSpec {
        hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    /// Encode the recording as an in-memory WAV file, the shape the voice
    /// enrollment endpoint accepts.
    pub fn wav_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, self.wav_spec())
                .context("failed to create WAV writer")?;
            for &sample in &self.samples {
                writer
                    .write_sample(sample)
                    .context("failed to write sample to WAV")?;
            }
            writer.finalize().context("failed to finalize WAV data")?;
        }
        Ok(cursor.into_inner())
    }

    /// Write the recording to disk as a WAV file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = hound::WavWriter::create(path, self.wav_spec())
            .with_context(|| format!("failed to create WAV file {:?}", path))?;
        for &sample in &self.samples {
            writer
                .write_sample(sample)
                .context("failed to write sample to WAV")?;
        }
        writer.finalize().context("failed to finalize WAV file")?;

        info!("saved recording to {:?} ({:.1}s)", path, self.duration_seconds());
        Ok(())
    }
}
