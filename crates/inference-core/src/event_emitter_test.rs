use super::*;
use crate::store::InMemoryDocumentStore;
use crate::stream::BoundingBox;
use std::sync::Arc;

#[test]
fn test_emit_persists_motion_event() {
    // Arrange
    let store = Arc::new(InMemoryDocumentStore::new());
    let emitter = EventEmitter::new(store.clone());
    let event = Event::new(
        "cam-1".to_string(),
        EventKind::MotionDetected {
            foreground_pixels: 6000,
            boxes: vec![BoundingBox {
                x: 10,
                y: 10,
                width: 100,
                height: 100,
            }],
        },
    );

    // Act
    emitter.emit(event);

    // Assert
    let count = store
        .count("camera_events", &serde_json::json!({"camera_id": "cam-1"}))
        .expect("count should succeed");
    assert_eq!(count, 1);
}

#[test]
fn test_recent_for_camera_filters_and_deserializes() {
    // Arrange
    let store = Arc::new(InMemoryDocumentStore::new());
    let emitter = EventEmitter::new(store);
    emitter.emit(Event::new("cam-1".to_string(), EventKind::CameraConnected));
    emitter.emit(Event::new(
        "cam-2".to_string(),
        EventKind::CameraDisconnected {
            reason: "timeout".to_string(),
        },
    ));

    // Act
    let events = emitter.recent_for_camera("cam-1", 10);

    // Assert
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].camera_id, "cam-1");
    assert!(matches!(events[0].kind, EventKind::CameraConnected));
}

#[test]
fn test_recent_for_camera_with_no_events_is_empty() {
    // Arrange
    let store = Arc::new(InMemoryDocumentStore::new());
    let emitter = EventEmitter::new(store);

    // Act
    let events = emitter.recent_for_camera("cam-unknown", 10);

    // Assert
    assert!(events.is_empty());
}
