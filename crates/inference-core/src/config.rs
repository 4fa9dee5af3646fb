//! Typed configuration for the scheduler, model cache, camera pipeline and
//! broadcaster. YAML/env loading is external (spec.md §1 Non-goals); these
//! structs are the typed target such a loader would populate.

/// Configuration options enumerated in spec.md §6.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub max_workers: usize,
    pub max_queue: usize,
    pub job_ttl_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            max_queue: 256,
            job_ttl_seconds: 30 * 60,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ModelCacheConfig {
    pub max_entries: usize,
    pub max_bytes: u64,
}

impl Default for ModelCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 5,
            max_bytes: 4096 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CameraConfig {
    pub max_frame_buffer: usize,
    pub frame_queue_capacity: usize,
    pub default_fps: u32,
    pub reconnect_delay_seconds: u64,
    pub max_reconnect_attempts: u32,
    pub motion_threshold: u32,
    pub contour_min_area: f64,
    pub snapshot_jpeg_quality: u8,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            max_frame_buffer: 60,
            frame_queue_capacity: 30,
            default_fps: 30,
            reconnect_delay_seconds: 5,
            max_reconnect_attempts: 5,
            motion_threshold: 5000,
            contour_min_area: 500.0,
            snapshot_jpeg_quality: 85,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BroadcasterConfig {
    pub interval_seconds: u64,
    pub subscriber_channel_depth: usize,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 5,
            subscriber_channel_depth: 16,
        }
    }
}
