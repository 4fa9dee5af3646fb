use super::*;
use crate::event_emitter::EventEmitter;
use crate::store::InMemoryDocumentStore;
use std::sync::atomic::Ordering as AtomicOrdering;
use std::sync::Arc;
use std::time::Duration;

fn test_config() -> CameraConfig {
    CameraConfig {
        max_frame_buffer: 4,
        frame_queue_capacity: 1,
        default_fps: 30,
        reconnect_delay_seconds: 0,
        max_reconnect_attempts: 3,
        motion_threshold: 5000,
        contour_min_area: 500.0,
        snapshot_jpeg_quality: 70,
    }
}

fn test_emitter() -> Arc<EventEmitter> {
    Arc::new(EventEmitter::new(Arc::new(InMemoryDocumentStore::new())))
}

#[test]
fn test_capture_processor_pair_produces_snapshots() {
    // Arrange
    let mut session = StreamSession::new("cam-1", test_config());
    let source = Box::new(SyntheticSource::new(160, 120));

    // Act
    session.start(source, test_emitter());
    std::thread::sleep(Duration::from_millis(150));
    session.stop();

    // Assert
    let stats = session.stats();
    assert!(stats.frames_captured > 0);
    assert!(stats.frames_processed > 0);
    assert!(session.latest_snapshot().is_some());
}

#[test]
fn test_slow_processor_causes_dropped_frames() {
    // Arrange: queue capacity 1 and a fast synthetic source guarantees the
    // capture thread outruns a processor that hasn't started consuming yet.
    let (frame_tx, _frame_rx) = crossbeam_channel::bounded::<RgbImage>(1);
    let stats = StreamStats::default();
    let running = std::sync::atomic::AtomicBool::new(true);
    let mut source = SyntheticSource::new(160, 120);

    // Act: manually pump a few frames through the channel without a
    // consumer, so the second send must evict the first.
    for _ in 0..5 {
        let frame = source.next_frame().unwrap();
        stats.frames_captured.fetch_add(1, AtomicOrdering::Relaxed);
        match frame_tx.try_send(frame) {
            Ok(()) => {}
            Err(crossbeam_channel::TrySendError::Full(frame)) => {
                let _ = frame_tx.try_recv();
                stats.frames_dropped.fetch_add(1, AtomicOrdering::Relaxed);
                let _ = frame_tx.try_send(frame);
            }
            Err(crossbeam_channel::TrySendError::Disconnected(_)) => unreachable!(),
        }
    }
    let _ = running.load(AtomicOrdering::SeqCst);

    // Assert
    assert!(stats.frames_dropped.load(AtomicOrdering::Relaxed) > 0);
}

#[test]
fn test_reconnect_exhaustion_stops_capture() {
    // Arrange: a source that always fails exhausts max_reconnect_attempts
    // and the capture loop should stop itself.
    let config = test_config();
    let source: Box<dyn CaptureSource> = Box::new(SyntheticSource::failing(160, 120, u32::MAX));
    let stats = Arc::new(StreamStats::default());
    let running = Arc::new(AtomicBool::new(true));

    let mut boxed_source = source;
    let stats_clone = stats.clone();
    let running_clone = running.clone();
    let (frame_tx, _frame_rx) = crossbeam_channel::bounded::<RgbImage>(config.frame_queue_capacity);
    let handle = std::thread::spawn(move || {
        capture_loop("cam-x", config, boxed_source.as_mut(), &frame_tx, &stats_clone, &running_clone);
    });
    handle.join().expect("capture loop should return once exhausted");

    // Assert
    assert!(!running.load(AtomicOrdering::SeqCst));
    // The failure that trips exhaustion performs no reconnect of its own.
    assert_eq!(
        stats.reconnect_attempts.load(AtomicOrdering::Relaxed),
        config.max_reconnect_attempts as u64
    );
}

#[test]
fn test_snapshot_history_respects_capacity() {
    // Arrange
    let mut config = test_config();
    config.max_frame_buffer = 2;
    let mut session = StreamSession::new("cam-2", config);
    let source = Box::new(SyntheticSource::new(160, 120));

    // Act
    session.start(source, test_emitter());
    std::thread::sleep(Duration::from_millis(150));
    session.stop();

    // Assert
    assert!(session.snapshot_history_len() <= 2);
}
