use chrono::{DateTime, Utc};
use serde::Serialize;

use super::lifecycle::SessionPhase;
use crate::transport::ConnectionState;

/// Statistics about a visit session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    /// Lifecycle phase
    pub phase: SessionPhase,

    /// Current socket state
    pub connection: ConnectionState,

    /// When the session object was created
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Audio frames accepted by the transport so far
    pub frames_sent: usize,

    /// Conversation entries assembled so far
    pub entry_count: usize,
}
