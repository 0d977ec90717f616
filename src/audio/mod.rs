pub mod backend;
pub mod encoder;
pub mod file;
pub mod microphone;
pub mod recorder;

pub use backend::{AudioBackend, AudioBackendFactory, AudioFrame, AudioSource, CaptureConfig};
pub use encoder::{encode_sample, FrameEncoder};
pub use file::AudioFile;
pub use recorder::{RecordedAudio, VoiceRecorder};
