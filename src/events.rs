//! UI event bus
//!
//! Everything the host or controller tells the UI layer travels as a
//! `UiEvent` over a broadcast channel; subscribers filter what they need.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::error::ErrorResponse;
use crate::host::Surface;
use crate::persist::SaveOutcome;
use crate::session::SessionStatus;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UiEvent {
    /// Global shortcut toggling start/stop
    HotkeyStartStop,
    /// Global shortcut toggling pause/resume
    HotkeyPauseResume,
    /// Pointer position for the cursor overlay
    CursorMove { x: i32, y: i32 },
    StatusChanged { status: SessionStatus },
    CountdownTick { remaining: u32 },
    DurationTick { seconds: u64 },
    SurfaceVisibility { surface: Surface, visible: bool },
    SaveCompleted { outcome: SaveOutcome },
    SessionFailed { error: ErrorResponse },
}

impl UiEvent {
    /// Short name used for subjects and SSE event names
    pub fn kind(&self) -> &'static str {
        match self {
            UiEvent::HotkeyStartStop => "hotkey-start-stop",
            UiEvent::HotkeyPauseResume => "hotkey-pause-resume",
            UiEvent::CursorMove { .. } => "cursor-move",
            UiEvent::StatusChanged { .. } => "status-changed",
            UiEvent::CountdownTick { .. } => "countdown-tick",
            UiEvent::DurationTick { .. } => "duration-tick",
            UiEvent::SurfaceVisibility { .. } => "surface-visibility",
            UiEvent::SaveCompleted { .. } => "save-completed",
            UiEvent::SessionFailed { .. } => "session-failed",
        }
    }
}

/// Fan-out channel for UI events
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<UiEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: UiEvent) {
        if matches!(event, UiEvent::CursorMove { .. }) {
            trace!("Event: {:?}", event);
        } else {
            debug!("Event: {:?}", event);
        }
        // Nobody listening is not an error
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let json = serde_json::to_string(&UiEvent::CursorMove { x: 10, y: 20 }).unwrap();
        assert_eq!(json, r#"{"type":"cursor-move","x":10,"y":20}"#);

        let json = serde_json::to_string(&UiEvent::HotkeyStartStop).unwrap();
        assert_eq!(json, r#"{"type":"hotkey-start-stop"}"#);

        let event: UiEvent = serde_json::from_str(r#"{"type":"countdown-tick","remaining":2}"#).unwrap();
        assert_eq!(event, UiEvent::CountdownTick { remaining: 2 });
        assert_eq!(event.kind(), "countdown-tick");
    }

    #[tokio::test]
    async fn test_bus_fans_out_to_all_subscribers() {
        let bus = EventBus::default();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(UiEvent::HotkeyPauseResume);

        assert_eq!(a.recv().await.unwrap(), UiEvent::HotkeyPauseResume);
        assert_eq!(b.recv().await.unwrap(), UiEvent::HotkeyPauseResume);
        assert_eq!(bus.subscriber_count(), 2);
    }
}
