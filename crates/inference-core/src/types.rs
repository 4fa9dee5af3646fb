//! Shared data types: jobs, job parameters and detection results
//!
//! Mirrors spec.md §3 ("Job") and §6 (provider strip `DetectionResult`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

/// Globally unique job identifier, assigned at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Opaque model identifier understood by the Model Cache.
pub type ModelRef = String;

/// Selects which provider entry point a job invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Detect,
    Segment,
    Track,
}

/// Keyed configuration overriding model defaults for a single job.
///
/// The scheduler is kind-agnostic: it never reads these fields, only carries
/// them through to `provider.postprocess`. Recast here as a strongly-typed
/// record (per spec.md §9 "Dynamic attribute bags") rather than an untyped
/// map, since the full set of overridable knobs is known in advance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobParams {
    pub confidence_threshold: Option<f32>,
    pub iou_threshold: Option<f32>,
    pub max_detections: Option<usize>,
    pub tracker_name: Option<String>,
    pub class_filter: Option<Vec<u32>>,
    /// Escape hatch for provider-specific overrides the common fields above
    /// don't name; the scheduler never inspects this map.
    pub extra: HashMap<String, serde_json::Value>,
}

/// Lifecycle status of a [`Job`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// A single bounding-box detection emitted by the provider strip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    pub class_name: String,
    pub confidence: f32,
    pub bbox: [f32; 4],
}

/// Result of `provider.postprocess`, per spec.md §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub detections: Vec<Detection>,
    pub num_detections: usize,
    pub confidence_avg: f32,
    pub image_size: [u32; 2],
}

/// Immutable job description supplied to `Scheduler::submit`.
#[derive(Debug, Clone)]
pub struct JobDescriptor {
    pub model_ref: ModelRef,
    pub payload: Vec<u8>,
    pub kind: JobKind,
    pub params: JobParams,
    pub priority: i32,
}

/// A tracked inference job.
///
/// Immutable after creation except for the status/result fields, per
/// spec.md §3.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    pub model_ref: ModelRef,
    pub payload: Vec<u8>,
    pub kind: JobKind,
    pub params: JobParams,
    pub priority: i32,
    pub submitted_at: Instant,
    pub started_at: Option<Instant>,
    pub completed_at: Option<Instant>,
    pub status: JobStatus,
    pub outcome: Option<JobOutcome>,
}

/// Mutually exclusive terminal outcome of a job.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Result(DetectionResult),
    Error(String),
}

impl JobOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, JobOutcome::Error(_))
    }
}

impl Job {
    pub(crate) fn new(id: JobId, desc: JobDescriptor, submitted_at: Instant) -> Self {
        Self {
            id,
            model_ref: desc.model_ref,
            payload: desc.payload,
            kind: desc.kind,
            params: desc.params,
            priority: desc.priority,
            submitted_at,
            started_at: None,
            completed_at: None,
            status: JobStatus::Pending,
            outcome: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Read-only view of a job returned by `Scheduler::status`.
#[derive(Debug, Clone)]
pub struct JobView {
    pub id: JobId,
    pub status: JobStatus,
    pub submitted_at: Instant,
    pub started_at: Option<Instant>,
    pub completed_at: Option<Instant>,
    pub outcome: Option<JobOutcome>,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            status: job.status,
            submitted_at: job.submitted_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            outcome: job.outcome.clone(),
        }
    }
}

/// Aggregate scheduler counters, per spec.md §6.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub total_jobs: u64,
    pub completed_jobs: u64,
    pub failed_jobs: u64,
    pub queue_size: usize,
    pub active_jobs: usize,
}
