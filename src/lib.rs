pub mod api;
pub mod audio;
pub mod config;
pub mod error;
pub mod session;
pub mod transcript;
pub mod transport;

pub use api::{BackendApi, SpeakerRole, VisitSummary};
pub use audio::{
    AudioBackend, AudioBackendFactory, AudioFrame, AudioSource, CaptureConfig, FrameEncoder,
    RecordedAudio, VoiceRecorder,
};
pub use config::Config;
pub use error::{ClientError, DeviceError};
pub use session::{SessionConfig, SessionFeed, SessionPhase, SessionStats, VisitSession};
pub use transcript::{ConversationEntry, TranscriptAssembler, TranscriptSnapshot};
pub use transport::{ConnectionState, Inbound, ServerEvent, Transport, TransportConfig};
