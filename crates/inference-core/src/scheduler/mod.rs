//! Inference scheduler: priority queue, job registry and worker pool.
//!
//! Grounded in the original `inference_queue.py` coroutine-based scheduler
//! and the teacher's OS-thread worker pool; workers here are plain
//! `std::thread` handles coordinating over `crossbeam-channel`, matching
//! spec.md §5's "OS threads, or a preemptive task scheduler equivalent".

mod queue;
mod registry;

pub use queue::JobQueue;
pub use registry::JobRegistry;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::SchedulerConfig;
use crate::error::{CoreError, Result};
use crate::model_cache::ModelCache;
use crate::provider::Provider;
use crate::types::{Job, JobDescriptor, JobId, JobOutcome, JobStatus, JobView, SchedulerStats};

/// Invoked on the worker thread once a job reaches a terminal state.
/// Panics raised inside the callback are caught and logged, never
/// propagated to the worker loop.
pub type CompletionCallback = Box<dyn Fn(&Job) + Send + Sync>;

struct Counters {
    total_jobs: AtomicU64,
    completed_jobs: AtomicU64,
    failed_jobs: AtomicU64,
}

impl Counters {
    fn new() -> Self {
        Self {
            total_jobs: AtomicU64::new(0),
            completed_jobs: AtomicU64::new(0),
            failed_jobs: AtomicU64::new(0),
        }
    }
}

/// Drives submitted jobs through a bounded priority queue and a fixed pool
/// of worker threads, each backed by a [`Provider`] and a [`ModelCache`].
pub struct Scheduler {
    config: SchedulerConfig,
    registry: Arc<JobRegistry>,
    queue: Arc<JobQueue>,
    model_cache: Arc<ModelCache>,
    provider: Arc<dyn Provider>,
    counters: Arc<Counters>,
    running: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
    on_complete: Arc<Mutex<Option<CompletionCallback>>>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, provider: Arc<dyn Provider>, model_cache: Arc<ModelCache>) -> Self {
        let (wake_tx, wake_rx) = bounded(config.max_workers.max(1) * 2 + 1);
        Self {
            registry: Arc::new(JobRegistry::new()),
            queue: Arc::new(JobQueue::new(config.max_queue)),
            model_cache,
            provider,
            counters: Arc::new(Counters::new()),
            running: Arc::new(AtomicBool::new(false)),
            workers: Mutex::new(Vec::new()),
            wake_tx,
            wake_rx,
            on_complete: Arc::new(Mutex::new(None)),
            config,
        }
    }

    pub fn set_on_complete(&self, callback: CompletionCallback) {
        *self.on_complete.lock() = Some(callback);
    }

    /// Spawns `max_workers` worker threads. Idempotent: calling `start`
    /// while already running is a no-op.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut workers = self.workers.lock();
        for worker_id in 0..self.config.max_workers {
            workers.push(self.spawn_worker(worker_id));
        }
        info!(workers = self.config.max_workers, "scheduler started");
    }

    fn spawn_worker(&self, worker_id: usize) -> JoinHandle<()> {
        let registry = self.registry.clone();
        let queue = self.queue.clone();
        let model_cache = self.model_cache.clone();
        let provider = self.provider.clone();
        let counters = self.counters.clone();
        let running = self.running.clone();
        let wake_rx = self.wake_rx.clone();
        let on_complete = self.on_complete.clone();

        std::thread::Builder::new()
            .name(format!("inference-worker-{worker_id}"))
            .spawn(move || {
                worker_loop(
                    worker_id, registry, queue, model_cache, provider, counters, running, wake_rx,
                    on_complete,
                )
            })
            .expect("failed to spawn worker thread")
    }

    /// Stops accepting new work and joins every worker thread. In-flight
    /// jobs are allowed to finish.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let mut workers = self.workers.lock();
        for _ in 0..workers.len() {
            let _ = self.wake_tx.send(());
        }
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
        info!("scheduler stopped");
    }

    /// Enqueues `desc`, returning its assigned id. Fails if the scheduler
    /// isn't running or the queue is at capacity.
    pub fn submit(&self, desc: JobDescriptor) -> Result<JobId> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(CoreError::NotRunning);
        }
        let submitted_at = Instant::now();
        let priority = desc.priority;
        let id = self.registry.insert(desc, submitted_at);
        if !self.queue.push(id, priority, submitted_at) {
            // Roll back the registry insert; the caller gets a clean error
            // rather than a job stuck forever in `Pending`.
            let _ = self.registry.with_mut(id, |job| job.status = JobStatus::Failed);
            return Err(CoreError::QueueFull);
        }
        self.counters.total_jobs.fetch_add(1, Ordering::Relaxed);
        let _ = self.wake_tx.try_send(());
        Ok(id)
    }

    /// Runs `desc` synchronously on the calling thread, bypassing the
    /// queue and worker pool entirely. Mirrors the original's direct
    /// `process_job` path used for health-check and CLI one-off calls.
    pub fn submit_sync(&self, desc: JobDescriptor) -> Result<JobView> {
        let submitted_at = Instant::now();
        let id = self.registry.insert(desc, submitted_at);
        self.counters.total_jobs.fetch_add(1, Ordering::Relaxed);
        run_job(&id, &self.registry, &self.model_cache, &self.provider, &self.counters, &self.on_complete);
        self.registry.view(id)
    }

    pub fn status(&self, id: JobId) -> Result<JobView> {
        self.registry.view(id)
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            total_jobs: self.counters.total_jobs.load(Ordering::Relaxed),
            completed_jobs: self.counters.completed_jobs.load(Ordering::Relaxed),
            failed_jobs: self.counters.failed_jobs.load(Ordering::Relaxed),
            queue_size: self.queue.len(),
            active_jobs: self.registry.active_count(),
        }
    }

    /// Removes terminal jobs older than `job_ttl_seconds`. Intended to be
    /// called periodically by the dashboard broadcaster's sampling loop.
    pub fn gc_expired(&self) -> usize {
        self.registry
            .gc_expired(Duration::from_secs(self.config.job_ttl_seconds))
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[allow(clippy::too_many_arguments)]
fn worker_loop(
    worker_id: usize,
    registry: Arc<JobRegistry>,
    queue: Arc<JobQueue>,
    model_cache: Arc<ModelCache>,
    provider: Arc<dyn Provider>,
    counters: Arc<Counters>,
    running: Arc<AtomicBool>,
    wake_rx: Receiver<()>,
    on_complete: Arc<Mutex<Option<CompletionCallback>>>,
) {
    debug!(worker_id, "worker started");
    while running.load(Ordering::SeqCst) {
        match wake_rx.recv_timeout(Duration::from_millis(200)) {
            Ok(()) | Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
        while running.load(Ordering::SeqCst) {
            let Some(job_id) = queue.pop() else {
                break;
            };
            run_job(&job_id, &registry, &model_cache, &provider, &counters, &on_complete);
        }
    }
    // `stop()` only waits for in-flight jobs to finish, not queued ones —
    // fail whatever is still sitting in the queue instead of running it.
    fail_remaining_queue(&queue, &registry, &counters);
    debug!(worker_id, "worker stopped");
}

/// Drains jobs left in the queue at shutdown and marks each `Failed` with
/// [`CoreError::ShuttingDown`] rather than executing it.
fn fail_remaining_queue(queue: &JobQueue, registry: &JobRegistry, counters: &Counters) {
    while let Some(job_id) = queue.pop() {
        let _ = registry.with_mut(job_id, |job| {
            job.status = JobStatus::Failed;
            job.completed_at = Some(Instant::now());
            job.outcome = Some(JobOutcome::Error(CoreError::ShuttingDown.to_string()));
        });
        counters.failed_jobs.fetch_add(1, Ordering::Relaxed);
    }
}

/// Executes one job end to end, isolating a provider panic into a
/// `worker_crashed` failure instead of unwinding the worker thread.
fn run_job(
    job_id: &JobId,
    registry: &JobRegistry,
    model_cache: &ModelCache,
    provider: &Arc<dyn Provider>,
    counters: &Counters,
    on_complete: &Mutex<Option<CompletionCallback>>,
) {
    let _ = registry.with_mut(*job_id, |job| {
        job.status = JobStatus::Running;
        job.started_at = Some(Instant::now());
    });

    let snapshot = match registry.with_mut(*job_id, |job| job.clone()) {
        Ok(job) => job,
        Err(_) => return,
    };

    let provider = provider.clone();
    let model_cache_handle = model_cache;
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        execute(&snapshot, model_cache_handle, provider.as_ref())
    }));

    let outcome = match outcome {
        Ok(result) => result,
        Err(panic_payload) => {
            let message = panic_message(&panic_payload);
            error!(job_id = %job_id, error = %message, "worker panicked processing job");
            Err(CoreError::WorkerCrashed(message))
        }
    };

    let final_job = registry.with_mut(*job_id, |job| {
        job.completed_at = Some(Instant::now());
        match outcome {
            Ok(result) => {
                job.status = JobStatus::Completed;
                job.outcome = Some(JobOutcome::Result(result));
                counters.completed_jobs.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                warn!(job_id = %job_id, error = %err, "job failed");
                job.status = JobStatus::Failed;
                job.outcome = Some(JobOutcome::Error(err.to_string()));
                counters.failed_jobs.fetch_add(1, Ordering::Relaxed);
            }
        }
        job.clone()
    });

    if let Ok(job) = final_job {
        let callback = on_complete.lock();
        if let Some(cb) = callback.as_ref() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| cb(&job))) {
                error!(error = %panic_message(&payload), "completion callback panicked");
            }
        }
    }
}

fn execute(job: &Job, model_cache: &ModelCache, provider: &dyn Provider) -> Result<crate::types::DetectionResult> {
    let handle = model_cache.get(&job.model_ref)?;
    let prepared = provider.preprocess(job.kind, &job.payload)?;
    let image_size = [prepared.width, prepared.height];
    let raw = provider.predict(&handle, &prepared)?;
    provider.postprocess(job.kind, &job.params, raw, image_size)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked with a non-string payload".to_string()
    }
}
