use thiserror::Error;

/// Failure taxonomy for the transcription client.
///
/// `Protocol` is recovered internally: a server frame that fails structured
/// parsing falls back to plain-text classification and keeps flowing, so this
/// variant should never cross the library boundary in practice.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed server message: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Microphone failures, kept separate from transport failures so callers can
/// tell "no mic" from "no network" and prompt the user accordingly.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("microphone access denied")]
    PermissionDenied,

    #[error("no usable input device: {0}")]
    Unavailable(String),

    #[error("unsupported capture format: {0}")]
    UnsupportedFormat(String),

    #[error("capture already running")]
    Busy,
}

pub type Result<T> = std::result::Result<T, ClientError>;
