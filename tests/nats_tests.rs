use screenrec::host::Surface;
use screenrec::nats::{event_subject, EventMessage, SUBJECT_PREFIX};
use screenrec::{ErrorResponse, SaveOutcome, UiEvent};
use std::path::PathBuf;

#[test]
fn test_event_subjects() {
    assert_eq!(SUBJECT_PREFIX, "screenrec.events");
    assert_eq!(
        event_subject(&UiEvent::HotkeyStartStop),
        "screenrec.events.hotkey-start-stop"
    );
    assert_eq!(
        event_subject(&UiEvent::CursorMove { x: 1, y: 2 }),
        "screenrec.events.cursor-move"
    );
}

#[test]
fn test_save_completed_serialization() {
    let msg = EventMessage::new(
        "screenrec",
        3,
        UiEvent::SaveCompleted {
            outcome: SaveOutcome::Saved {
                file_path: PathBuf::from("/videos/recording-1.mp4"),
            },
        },
    );

    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"kind\":\"save-completed\""));
    assert!(json.contains("\"result\":\"saved\""));
    assert!(json.contains("\"filePath\":\"/videos/recording-1.mp4\""));

    let deserialized: EventMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized.app_id, "screenrec");
    assert_eq!(deserialized.sequence, 3);
    assert_eq!(deserialized.event, msg.event);
}

#[test]
fn test_failure_and_visibility_events() {
    let failure = EventMessage::new(
        "screenrec",
        0,
        UiEvent::SessionFailed {
            error: ErrorResponse {
                code: "NO_CAPTURE_SOURCES".to_string(),
                message: "No capture sources available".to_string(),
            },
        },
    );
    let value = serde_json::to_value(&failure).unwrap();
    assert_eq!(value["event"]["type"], "session-failed");
    assert_eq!(value["event"]["error"]["code"], "NO_CAPTURE_SOURCES");

    let visibility = EventMessage::new(
        "screenrec",
        1,
        UiEvent::SurfaceVisibility {
            surface: Surface::CameraBubble,
            visible: true,
        },
    );
    let value = serde_json::to_value(&visibility).unwrap();
    assert_eq!(value["event"]["surface"], "camera-bubble");
    assert_eq!(value["event"]["visible"], true);
}

#[test]
fn test_timestamp_is_rfc3339() {
    let msg = EventMessage::new("screenrec", 0, UiEvent::HotkeyPauseResume);
    assert!(chrono::DateTime::parse_from_rfc3339(&msg.timestamp).is_ok());
}
