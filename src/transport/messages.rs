use serde::{Deserialize, Serialize};

/// Structured transcription event received from the backend as a JSON text
/// frame, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// A finalized speech turn attributed by the backend's diarization.
    TurnFinal {
        speaker: Option<String>,
        #[serde(alias = "msg")]
        text: String,
        t0: Option<f64>,
        t1: Option<f64>,
        #[serde(rename = "turnId")]
        turn_id: Option<u64>,
    },
    /// Interim hypothesis for the turn currently being spoken. Display only,
    /// superseded by the matching turn-final.
    TurnUpdate {
        speaker: Option<String>,
        #[serde(alias = "msg")]
        text: String,
        #[serde(rename = "turnId")]
        turn_id: Option<u64>,
    },
    /// Session-level processing notice ("buffering", "diarizing", ...).
    Status {
        #[serde(alias = "msg")]
        text: String,
    },
    /// Backend-reported failure.
    Error {
        #[serde(alias = "msg")]
        text: String,
    },
}

/// Client-to-server control envelope, sent as a JSON text frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Periodic keep-alive so intermediaries do not drop idle connections.
    Heartbeat { timestamp: i64 },
}

/// Heuristic classification for plain-text frames that are not valid JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextClass {
    /// Mentions a failure. Checked first: a line containing both an error
    /// marker and a status marker is an error.
    Error,
    /// Transient processing chatter, replaced rather than accumulated.
    Status,
    /// Anything else is treated as dictated speech on the doctor channel.
    Utterance,
}

const ERROR_MARKERS: &[&str] = &["error", "failed"];

const STATUS_MARKERS: &[&str] = &[
    "buffering",
    "processing",
    "connecting",
    "initializing",
    "loading",
    "transcribing",
];

/// Classify a raw text frame by ordered substring checks.
///
/// Known tradeoff: a clinician literally saying "processing" gets classified
/// as status. The marker lists are intentionally short to keep false
/// positives rare.
pub fn classify_text(raw: &str) -> TextClass {
    if ERROR_MARKERS.iter().any(|m| raw.contains(m)) {
        return TextClass::Error;
    }
    if STATUS_MARKERS.iter().any(|m| raw.contains(m)) || raw.starts_with("...") {
        return TextClass::Status;
    }
    TextClass::Utterance
}

/// An inbound frame after first-stage classification by the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Parsed structured event.
    Event(ServerEvent),
    /// Unstructured text with its heuristic class.
    Text(TextClass, String),
}

/// Split a raw text frame into the structured/unstructured union.
///
/// Returns `None` for empty frames. JSON that does not match any known event
/// shape is downgraded to text classification instead of being dropped, so a
/// protocol mismatch is never fatal.
pub fn parse_frame(raw: &str) -> Option<Inbound> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(event) = serde_json::from_str::<ServerEvent>(trimmed) {
            return Some(Inbound::Event(event));
        }
    }

    Some(Inbound::Text(classify_text(trimmed), trimmed.to_string()))
}
