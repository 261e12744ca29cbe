use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::RecordingOptions;
use super::state::SessionStatus;
use crate::persist::SaveOutcome;

/// Point-in-time view of the controller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub status: SessionStatus,

    /// Active session, if any
    pub session_id: Option<Uuid>,

    /// When the start command was accepted
    pub started_at: Option<DateTime<Utc>>,

    /// Seconds spent recording (paused time excluded)
    pub duration_secs: u64,

    /// Chunks produced by the encoder so far
    pub chunk_count: usize,

    /// Total size of those chunks
    pub recorded_bytes: usize,

    /// Options in effect for the active session, or for the next one
    pub options: RecordingOptions,
}

/// Summary of a finished session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopOutcome {
    pub session_id: Uuid,
    pub duration_secs: u64,
    pub chunk_count: usize,
    pub bytes: usize,
    pub mime_type: String,
    pub save: SaveOutcome,
}

/// What a stop command did
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "kebab-case")]
pub enum StopResult {
    /// Nothing was running
    NotActive,
    /// Stopped before capture began; no file was produced
    CountdownCancelled,
    Finished(StopOutcome),
}
