//! Streaming transport to the transcription backend
//!
//! One persistent WebSocket per visit carries PCM16 audio frames out and
//! transcript/status/error messages in. The transport owns the connection
//! lifecycle (heartbeat, normal/abnormal close, single-shot reconnect) and
//! hands callers inbound frames already split into the structured or
//! unstructured classification.

mod client;
pub mod messages;

pub use client::{ConnectionState, Transport, TransportConfig};
pub use messages::{classify_text, parse_frame, ControlMessage, Inbound, ServerEvent, TextClass};
