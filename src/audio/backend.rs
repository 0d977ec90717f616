use tokio::sync::mpsc;

use crate::error::DeviceError;

/// Audio sample data (16-bit PCM, mono)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Frame duration derived from the sample count.
    pub fn duration_ms(&self) -> u64 {
        self.samples.len() as u64 * 1000 / (self.sample_rate as u64 * self.channels as u64)
    }
}

/// Configuration for audio capture
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate (the device stream is downsampled if faster)
    pub sample_rate: u32,
    /// Target channel count (the wire format is mono)
    pub channels: u16,
    /// Samples per outbound frame
    pub frame_samples: usize,
    /// Ask the platform for echo cancellation where supported
    pub echo_cancellation: bool,
    /// Ask the platform for noise suppression where supported
    pub noise_suppression: bool,
    /// Capture device name; `None` selects the default input
    pub device: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // what the transcription backend expects
            channels: 1,        // Mono
            frame_samples: 320, // 20ms frames
            echo_cancellation: true,
            noise_suppression: true,
            device: None,
        }
    }
}

impl CaptureConfig {
    /// Duration of one outbound frame at the target rate.
    pub fn frame_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(
            self.frame_samples as u64 * 1000 / self.sample_rate as u64,
        )
    }
}

/// Audio capture backend trait
///
/// Implementations:
/// - Microphone: cpal input stream (the live visit path)
/// - File: WAV playback at frame cadence (tests, offline processing)
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive fixed-size frames.
    /// Device failures surface as `DeviceError`, kept distinct from anything
    /// the transport can produce.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, DeviceError>;

    /// Stop capturing audio and release the device
    async fn stop(&mut self) -> Result<(), DeviceError>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Audio source type
#[derive(Debug, Clone)]
pub enum AudioSource {
    /// Microphone input
    Microphone,
    /// File input (for testing/batch processing)
    File(std::path::PathBuf),
}

/// Audio backend factory
pub struct AudioBackendFactory;

impl AudioBackendFactory {
    /// Create the backend for a source. The microphone is owned by at most
    /// one active capture at a time; callers tear down the previous backend
    /// before creating a new one.
    pub fn create(
        source: AudioSource,
        config: CaptureConfig,
    ) -> Result<Box<dyn AudioBackend>, DeviceError> {
        match source {
            AudioSource::Microphone => {
                let backend = super::microphone::MicrophoneBackend::new(config)?;
                Ok(Box::new(backend))
            }
            AudioSource::File(path) => {
                let backend = super::file::FileBackend::new(path, config);
                Ok(Box::new(backend))
            }
        }
    }
}
