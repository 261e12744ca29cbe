use serde::{Deserialize, Serialize};

use crate::events::UiEvent;

/// UI event envelope published to NATS
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub app_id: String,
    /// Per-connection publish counter
    pub sequence: u64,
    /// Same as the subject suffix
    pub kind: String,
    pub event: UiEvent,
    pub timestamp: String, // RFC3339 timestamp
}

impl EventMessage {
    pub fn new(app_id: impl Into<String>, sequence: u64, event: UiEvent) -> Self {
        Self {
            app_id: app_id.into(),
            sequence,
            kind: event.kind().to_string(),
            event,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStatus;

    #[test]
    fn test_envelope_carries_tagged_event() {
        let message = EventMessage::new(
            "screenrec",
            7,
            UiEvent::StatusChanged {
                status: SessionStatus::Paused,
            },
        );
        let json: serde_json::Value = serde_json::to_value(&message).unwrap();

        assert_eq!(json["kind"], "status-changed");
        assert_eq!(json["sequence"], 7);
        assert_eq!(json["event"]["type"], "status-changed");
        assert_eq!(json["event"]["status"], "paused");
    }
}
