//! Per-camera capture/process thread pair.
//!
//! Grounded in `stream_manager.py`'s `_capture_loop`/`_process_loop` pair:
//! one thread pulls frames off the upstream source as fast as it can, a
//! second thread runs motion detection and snapshot encoding, and a
//! bounded queue between them drops the oldest frame rather than blocking
//! capture when the processor falls behind.

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use image::codecs::jpeg::JpegEncoder;
use image::{GrayImage, RgbImage};
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::config::CameraConfig;
use crate::error::{CoreError, Result};
use crate::event_emitter::{Event, EventEmitter, EventKind};

/// Supplies decoded frames for one camera. Implementations own the
/// connection to the physical/simulated upstream; `next_frame` should
/// return `Err(CoreError::UpstreamUnreachable)` on a dropped connection and
/// `reconnect` should attempt to re-establish it.
pub trait CaptureSource: Send {
    fn next_frame(&mut self) -> Result<RgbImage>;
    fn reconnect(&mut self) -> Result<()>;
}

/// Synthetic source used by tests and the CLI demo: emits a moving bright
/// block against a dark background so motion detection has something to
/// find, and can be configured to fail its first N reconnect attempts to
/// exercise the reconnect-exhaustion path.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    frame_index: u32,
    failures_remaining: u32,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_index: 0,
            failures_remaining: 0,
        }
    }

    pub fn failing(width: u32, height: u32, failures: u32) -> Self {
        Self {
            width,
            height,
            frame_index: 0,
            failures_remaining: failures,
        }
    }
}

impl CaptureSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<RgbImage> {
        if self.failures_remaining > 0 {
            self.failures_remaining -= 1;
            return Err(CoreError::UpstreamUnreachable("synthetic source offline".to_string()));
        }
        self.frame_index = self.frame_index.wrapping_add(1);
        let offset = (self.frame_index * 4) % self.width.max(1);
        let mut frame = RgbImage::from_pixel(self.width, self.height, image::Rgb([20, 20, 20]));
        for y in 10..self.height.min(110) {
            for x in offset..(offset + 100).min(self.width) {
                frame.put_pixel(x, y, image::Rgb([220, 220, 220]));
            }
        }
        Ok(frame)
    }

    fn reconnect(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Lock-free counters exposed to the dashboard broadcaster.
#[derive(Default)]
pub struct StreamStats {
    pub frames_captured: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub frames_processed: AtomicU64,
    pub reconnect_attempts: AtomicU64,
}

/// Point-in-time snapshot of [`StreamStats`] for serialization.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct StreamStatsSnapshot {
    pub frames_captured: u64,
    pub frames_dropped: u64,
    pub frames_processed: u64,
    pub reconnect_attempts: u64,
}

impl StreamStats {
    fn snapshot(&self) -> StreamStatsSnapshot {
        StreamStatsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
        }
    }
}

/// A running (or stopped) camera stream: capture thread, processor thread,
/// and the state they share.
pub struct StreamSession {
    pub camera_id: String,
    config: CameraConfig,
    stats: Arc<StreamStats>,
    running: Arc<AtomicBool>,
    snapshots: Arc<Mutex<VecDeque<Vec<u8>>>>,
    latest_jpeg: Arc<RwLock<Option<Vec<u8>>>>,
    capture_handle: Option<JoinHandle<()>>,
    processor_handle: Option<JoinHandle<()>>,
}

impl StreamSession {
    pub fn new(camera_id: impl Into<String>, config: CameraConfig) -> Self {
        Self {
            camera_id: camera_id.into(),
            config,
            stats: Arc::new(StreamStats::default()),
            running: Arc::new(AtomicBool::new(false)),
            snapshots: Arc::new(Mutex::new(VecDeque::with_capacity(config.max_frame_buffer))),
            latest_jpeg: Arc::new(RwLock::new(None)),
            capture_handle: None,
            processor_handle: None,
        }
    }

    /// Spawns the capture and processor threads, consuming `source`.
    pub fn start(&mut self, mut source: Box<dyn CaptureSource>, event_emitter: Arc<EventEmitter>) {
        self.running.store(true, Ordering::SeqCst);
        let (frame_tx, frame_rx) = bounded::<RgbImage>(self.config.frame_queue_capacity);

        let capture_running = self.running.clone();
        let capture_stats = self.stats.clone();
        let capture_config = self.config;
        let camera_id = self.camera_id.clone();
        let capture_handle = std::thread::Builder::new()
            .name(format!("capture-{camera_id}"))
            .spawn(move || {
                capture_loop(&camera_id, capture_config, source.as_mut(), &frame_tx, &capture_stats, &capture_running);
            })
            .expect("failed to spawn capture thread");

        let processor_running = self.running.clone();
        let processor_stats = self.stats.clone();
        let processor_config = self.config;
        let snapshots = self.snapshots.clone();
        let latest_jpeg = self.latest_jpeg.clone();
        let camera_id = self.camera_id.clone();
        let processor_handle = std::thread::Builder::new()
            .name(format!("processor-{camera_id}"))
            .spawn(move || {
                processor_loop(
                    &camera_id, processor_config, &frame_rx, &processor_stats, &processor_running,
                    &snapshots, &latest_jpeg, event_emitter,
                );
            })
            .expect("failed to spawn processor thread");

        self.capture_handle = Some(capture_handle);
        self.processor_handle = Some(processor_handle);
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.capture_handle.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.processor_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn stats(&self) -> StreamStatsSnapshot {
        self.stats.snapshot()
    }

    /// Most recent JPEG-encoded frame, if the processor has produced one.
    pub fn latest_snapshot(&self) -> Option<Vec<u8>> {
        self.latest_jpeg.read().clone()
    }

    pub fn snapshot_history_len(&self) -> usize {
        self.snapshots.lock().len()
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_loop(
    camera_id: &str,
    config: CameraConfig,
    source: &mut dyn CaptureSource,
    frame_tx: &Sender<RgbImage>,
    stats: &StreamStats,
    running: &AtomicBool,
) {
    let mut consecutive_failures: u32 = 0;
    while running.load(Ordering::SeqCst) {
        match source.next_frame() {
            Ok(frame) => {
                consecutive_failures = 0;
                stats.frames_captured.fetch_add(1, Ordering::Relaxed);
                match frame_tx.try_send(frame) {
                    Ok(()) => {}
                    Err(TrySendError::Full(frame)) => {
                        // Drop the oldest queued frame, then enqueue this one.
                        let _ = frame_tx.try_recv();
                        stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                        let _ = frame_tx.try_send(frame);
                    }
                    Err(TrySendError::Disconnected(_)) => break,
                }
            }
            Err(_) => {
                consecutive_failures += 1;
                if consecutive_failures > config.max_reconnect_attempts {
                    warn!(camera_id, "max reconnect attempts exceeded, stopping capture");
                    running.store(false, Ordering::SeqCst);
                    break;
                }
                warn!(camera_id, attempt = consecutive_failures, "capture source unreachable, retrying");
                std::thread::sleep(Duration::from_secs(config.reconnect_delay_seconds));
                stats.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
                let _ = source.reconnect();
            }
        }
    }
    info!(camera_id, "capture loop stopped");
}

#[allow(clippy::too_many_arguments)]
fn processor_loop(
    camera_id: &str,
    config: CameraConfig,
    frame_rx: &Receiver<RgbImage>,
    stats: &StreamStats,
    running: &AtomicBool,
    snapshots: &Mutex<VecDeque<Vec<u8>>>,
    latest_jpeg: &RwLock<Option<Vec<u8>>>,
    event_emitter: Arc<EventEmitter>,
) {
    let mut previous_gray: Option<GrayImage> = None;
    while running.load(Ordering::SeqCst) {
        let frame = match frame_rx.recv_timeout(Duration::from_millis(200)) {
            Ok(frame) => frame,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        };

        let gray = image::DynamicImage::ImageRgb8(frame.clone()).into_luma8();

        if let Some(prev) = &previous_gray {
            if let Some(result) =
                super::motion::detect_motion(prev, &gray, config.motion_threshold, config.contour_min_area)
            {
                let event = Event::new(
                    camera_id.to_string(),
                    EventKind::MotionDetected {
                        foreground_pixels: result.foreground_pixels,
                        boxes: result.boxes,
                    },
                );
                event_emitter.emit(event);
            }
        }
        previous_gray = Some(gray);

        if let Ok(jpeg_bytes) = encode_jpeg(&frame, config.snapshot_jpeg_quality) {
            *latest_jpeg.write() = Some(jpeg_bytes.clone());
            let mut history = snapshots.lock();
            if history.len() >= config.max_frame_buffer {
                history.pop_front();
            }
            history.push_back(jpeg_bytes);
        }

        stats.frames_processed.fetch_add(1, Ordering::Relaxed);
    }
    info!(camera_id, "processor loop stopped");
}

fn encode_jpeg(frame: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buffer), quality);
    encoder.encode(frame.as_raw(), frame.width(), frame.height(), image::ColorType::Rgb8.into())?;
    Ok(buffer)
}
