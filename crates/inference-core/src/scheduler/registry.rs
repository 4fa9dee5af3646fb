//! Job registry: the scheduler's source of truth for job state.
//!
//! Jobs are looked up far more often than they're mutated (every `status`
//! poll reads, only the worker pool writes), so this is an `RwLock` rather
//! than a `Mutex`, mirroring the teacher's read-heavy cache bookkeeping.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::{CoreError, Result};
use crate::types::{Job, JobDescriptor, JobId, JobView};

pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Job>>,
    next_id: AtomicU64,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocates a new job id and inserts a `Pending` job for `desc`,
    /// stamped with the caller-supplied `submitted_at` so the registry and
    /// queue agree on the ordering timestamp.
    pub fn insert(&self, desc: JobDescriptor, submitted_at: Instant) -> JobId {
        let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let job = Job::new(id, desc, submitted_at);
        self.jobs.write().insert(id, job);
        id
    }

    pub fn view(&self, id: JobId) -> Result<JobView> {
        self.jobs
            .read()
            .get(&id)
            .map(JobView::from)
            .ok_or_else(|| CoreError::NotFound(id.to_string()))
    }

    /// Applies `f` to the job named by `id` under the write lock.
    pub fn with_mut<F, R>(&self, id: JobId, f: F) -> Result<R>
    where
        F: FnOnce(&mut Job) -> R,
    {
        let mut jobs = self.jobs.write();
        let job = jobs.get_mut(&id).ok_or_else(|| CoreError::NotFound(id.to_string()))?;
        Ok(f(job))
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn active_count(&self) -> usize {
        self.jobs
            .read()
            .values()
            .filter(|j| !j.is_terminal())
            .count()
    }

    /// Removes terminal jobs whose `completed_at` is older than `ttl`.
    /// Returns the number of jobs removed.
    pub fn gc_expired(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let mut jobs = self.jobs.write();
        let expired: Vec<JobId> = jobs
            .values()
            .filter(|job| {
                job.completed_at
                    .map(|t| now.duration_since(t) > ttl)
                    .unwrap_or(false)
            })
            .map(|job| job.id)
            .collect();
        for id in &expired {
            jobs.remove(id);
        }
        expired.len()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
