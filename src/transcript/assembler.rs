use chrono::Utc;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::transport::{Inbound, ServerEvent, TextClass};

/// Speaker attribution as reported by the backend's diarization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Doctor,
    Patient,
    Unknown,
}

impl Speaker {
    fn from_label(label: Option<&str>) -> Self {
        match label {
            Some("Doctor") | Some("doctor") => Speaker::Doctor,
            Some("Patient") | Some("patient") => Speaker::Patient,
            _ => Speaker::Unknown,
        }
    }
}

/// Where an entry came from: a structured backend event, or text the client
/// classified locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Backend,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Spoken content; append-only.
    Utterance,
    /// Transient processing notice; at most one lives in the log.
    Status,
}

/// One line of the displayable conversation log.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationEntry {
    pub id: Uuid,
    pub speaker: Speaker,
    pub text: String,
    pub timestamp_ms: u64,
    pub provenance: Provenance,
    pub kind: EntryKind,
}

impl ConversationEntry {
    fn new(speaker: Speaker, text: String, provenance: Provenance, kind: EntryKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            speaker,
            text,
            timestamp_ms: Utc::now().timestamp_millis() as u64,
            provenance,
            kind,
        }
    }
}

/// What one folded message did to the log. The caller uses this to raise
/// error signals and to publish a fresh snapshot per accepted message.
#[derive(Debug, Clone, PartialEq)]
pub enum FoldOutcome {
    /// A new entry was appended.
    Appended,
    /// The previous status entry was replaced by a newer one.
    StatusReplaced,
    /// The interim line changed; nothing was retained.
    InterimUpdated,
    /// Ambient session status changed; no entry was produced.
    AmbientStatus,
    /// An error was signalled; no entry was produced.
    ErrorRaised(String),
}

/// Cloneable view of the assembler state for display.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TranscriptSnapshot {
    pub entries: Vec<ConversationEntry>,
    pub interim: Option<ConversationEntry>,
    pub status: Option<String>,
}

/// Folds classified inbound messages into the ordered conversation log.
///
/// Entries are kept in arrival order and never mutated after insertion, with
/// one exception: status entries are transient. A newer status replaces the
/// previous one, and spoken content supersedes the status outright, so
/// "connecting..." chatter can neither flood nor outlive the conversation.
/// The log is cleared only by an explicit `clear` or by rebinding to a
/// different session id.
pub struct TranscriptAssembler {
    session_id: i64,
    entries: Vec<ConversationEntry>,
    interim: Option<ConversationEntry>,
    status: Option<String>,
}

impl TranscriptAssembler {
    pub fn new(session_id: i64) -> Self {
        Self {
            session_id,
            entries: Vec::new(),
            interim: None,
            status: None,
        }
    }

    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    pub fn entries(&self) -> &[ConversationEntry] {
        &self.entries
    }

    pub fn interim(&self) -> Option<&ConversationEntry> {
        self.interim.as_ref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn snapshot(&self) -> TranscriptSnapshot {
        TranscriptSnapshot {
            entries: self.entries.clone(),
            interim: self.interim.clone(),
            status: self.status.clone(),
        }
    }

    /// Fold one message into the log, in arrival order.
    pub fn fold(&mut self, message: Inbound) -> FoldOutcome {
        match message {
            Inbound::Event(ServerEvent::TurnFinal { speaker, text, .. }) => {
                // A finalized turn supersedes both the interim line and any
                // transient status entry.
                self.interim = None;
                self.entries.retain(|e| e.kind != EntryKind::Status);
                self.entries.push(ConversationEntry::new(
                    Speaker::from_label(speaker.as_deref()),
                    text,
                    Provenance::Backend,
                    EntryKind::Utterance,
                ));
                FoldOutcome::Appended
            }

            Inbound::Event(ServerEvent::TurnUpdate { speaker, text, .. }) => {
                self.interim = Some(ConversationEntry::new(
                    Speaker::from_label(speaker.as_deref()),
                    text,
                    Provenance::Backend,
                    EntryKind::Utterance,
                ));
                FoldOutcome::InterimUpdated
            }

            Inbound::Event(ServerEvent::Status { text }) => {
                self.status = Some(text);
                FoldOutcome::AmbientStatus
            }

            Inbound::Event(ServerEvent::Error { text }) => FoldOutcome::ErrorRaised(text),

            Inbound::Text(TextClass::Error, raw) => FoldOutcome::ErrorRaised(raw),

            Inbound::Text(TextClass::Status, raw) => {
                let had_status = self.entries.iter().any(|e| e.kind == EntryKind::Status);
                self.entries.retain(|e| e.kind != EntryKind::Status);
                self.entries.push(ConversationEntry::new(
                    Speaker::Unknown,
                    raw,
                    Provenance::Local,
                    EntryKind::Status,
                ));
                if had_status {
                    FoldOutcome::StatusReplaced
                } else {
                    FoldOutcome::Appended
                }
            }

            Inbound::Text(TextClass::Utterance, raw) => {
                self.entries.retain(|e| e.kind != EntryKind::Status);
                self.entries.push(ConversationEntry::new(
                    Speaker::Doctor,
                    raw,
                    Provenance::Local,
                    EntryKind::Utterance,
                ));
                FoldOutcome::Appended
            }
        }
    }

    /// Drop every entry and reset ambient state.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.interim = None;
        self.status = None;
    }

    /// Rebind to a session. Connecting to a different session id clears the
    /// log; reconnecting to the same session keeps it.
    pub fn reset_for_session(&mut self, session_id: i64) {
        if session_id != self.session_id {
            debug!(
                old = self.session_id,
                new = session_id,
                "new session id, clearing transcript"
            );
            self.clear();
            self.session_id = session_id;
        }
    }
}
