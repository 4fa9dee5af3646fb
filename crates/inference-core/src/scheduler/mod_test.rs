use super::*;
use crate::model_cache::ModelCache;
use crate::provider::{ModelHandle, PreparedInput, RawPrediction, SyntheticProvider};
use crate::types::{DetectionResult, JobKind, JobParams};
use std::sync::Mutex as StdMutex;
use std::time::Duration;

fn descriptor(priority: i32) -> JobDescriptor {
    JobDescriptor {
        model_ref: "yolov8n".to_string(),
        payload: vec![0xFF, 0xD8, 0xFF],
        kind: JobKind::Detect,
        params: JobParams::default(),
        priority,
    }
}

fn wait_for_terminal(scheduler: &Scheduler, id: JobId) -> JobView {
    for _ in 0..200 {
        let view = scheduler.status(id).expect("job should exist");
        if matches!(view.status, JobStatus::Completed | JobStatus::Failed) {
            return view;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    panic!("job {id} never reached a terminal state");
}

fn new_scheduler(config: SchedulerConfig) -> Scheduler {
    let provider = Arc::new(SyntheticProvider::default());
    let model_cache = Arc::new(ModelCache::new(crate::config::ModelCacheConfig::default(), provider.clone()));
    Scheduler::new(config, provider, model_cache)
}

#[test]
fn test_submit_before_start_fails_not_running() {
    // Arrange
    let scheduler = new_scheduler(SchedulerConfig::default());

    // Act
    let result = scheduler.submit(descriptor(0));

    // Assert
    assert!(matches!(result, Err(CoreError::NotRunning)));
}

#[test]
fn test_submit_and_complete_happy_path() {
    // Arrange
    let scheduler = new_scheduler(SchedulerConfig::default());
    scheduler.start();

    // Act
    let id = scheduler.submit(descriptor(0)).expect("submit should succeed");
    let view = wait_for_terminal(&scheduler, id);

    // Assert
    assert_eq!(view.status, JobStatus::Completed);
    assert!(matches!(view.outcome, Some(JobOutcome::Result(_))));
    scheduler.stop();
}

#[test]
fn test_submit_rejects_when_queue_full() {
    // Arrange
    let mut config = SchedulerConfig::default();
    config.max_workers = 0;
    config.max_queue = 1;
    let scheduler = new_scheduler(config);
    scheduler.running.store(true, Ordering::SeqCst);

    // Act
    let first = scheduler.submit(descriptor(0));
    let second = scheduler.submit(descriptor(0));

    // Assert
    assert!(first.is_ok());
    assert!(matches!(second, Err(CoreError::QueueFull)));
}

#[test]
fn test_submit_sync_bypasses_queue() {
    // Arrange
    let scheduler = new_scheduler(SchedulerConfig::default());

    // Act
    let view = scheduler
        .submit_sync(descriptor(0))
        .expect("submit_sync should succeed");

    // Assert
    assert_eq!(view.status, JobStatus::Completed);
}

#[test]
fn test_stats_count_completed_jobs() {
    // Arrange
    let scheduler = new_scheduler(SchedulerConfig::default());
    scheduler.start();

    // Act
    let id = scheduler.submit(descriptor(0)).expect("submit should succeed");
    wait_for_terminal(&scheduler, id);
    let stats = scheduler.stats();

    // Assert
    assert_eq!(stats.total_jobs, 1);
    assert_eq!(stats.completed_jobs, 1);
    assert_eq!(stats.failed_jobs, 0);
    scheduler.stop();
}

#[test]
fn test_completion_callback_invoked_on_terminal_job() {
    // Arrange
    let scheduler = new_scheduler(SchedulerConfig::default());
    let seen: Arc<StdMutex<Vec<JobId>>> = Arc::new(StdMutex::new(Vec::new()));
    let seen_clone = seen.clone();
    scheduler.set_on_complete(Box::new(move |job| {
        seen_clone.lock().unwrap().push(job.id);
    }));
    scheduler.start();

    // Act
    let id = scheduler.submit(descriptor(0)).expect("submit should succeed");
    wait_for_terminal(&scheduler, id);

    // Assert
    assert_eq!(seen.lock().unwrap().as_slice(), &[id]);
    scheduler.stop();
}

struct PanickingProvider;

impl Provider for PanickingProvider {
    fn load(&self, key: &str) -> Result<ModelHandle> {
        Ok(ModelHandle::new(key.to_string(), 0, ()))
    }

    fn preprocess(&self, _kind: JobKind, _payload: &[u8]) -> Result<PreparedInput> {
        panic!("simulated provider panic");
    }

    fn predict(&self, _handle: &ModelHandle, _input: &PreparedInput) -> Result<RawPrediction> {
        unreachable!()
    }

    fn postprocess(
        &self,
        _kind: JobKind,
        _params: &JobParams,
        _prediction: RawPrediction,
        _image_size: [u32; 2],
    ) -> Result<DetectionResult> {
        unreachable!()
    }
}

#[test]
fn test_worker_survives_provider_panic_and_fails_job() {
    // Arrange
    let provider = Arc::new(PanickingProvider);
    let model_cache = Arc::new(ModelCache::new(crate::config::ModelCacheConfig::default(), provider.clone()));
    let scheduler = Scheduler::new(SchedulerConfig::default(), provider, model_cache);
    scheduler.start();

    // Act: the panicking job must fail without killing the pool.
    let crashing = scheduler.submit(descriptor(0)).expect("submit should succeed");
    let crashing_view = wait_for_terminal(&scheduler, crashing);

    let next = scheduler.submit(descriptor(0)).expect("pool should still accept work");
    let next_view = wait_for_terminal(&scheduler, next);

    // Assert
    assert_eq!(crashing_view.status, JobStatus::Failed);
    assert!(matches!(crashing_view.outcome, Some(JobOutcome::Error(_))));
    // The second job also panics (same provider) but proves the worker
    // thread is still alive and servicing new submissions.
    assert_eq!(next_view.status, JobStatus::Failed);
    scheduler.stop();
}

struct SlowProvider {
    delay: Duration,
}

impl Provider for SlowProvider {
    fn load(&self, key: &str) -> Result<ModelHandle> {
        Ok(ModelHandle::new(key.to_string(), 0, ()))
    }

    fn preprocess(&self, _kind: JobKind, _payload: &[u8]) -> Result<PreparedInput> {
        std::thread::sleep(self.delay);
        Ok(PreparedInput {
            width: 1,
            height: 1,
            data: vec![0],
        })
    }

    fn predict(&self, _handle: &ModelHandle, _input: &PreparedInput) -> Result<RawPrediction> {
        Ok(RawPrediction { data: vec![] })
    }

    fn postprocess(
        &self,
        _kind: JobKind,
        params: &JobParams,
        _prediction: RawPrediction,
        image_size: [u32; 2],
    ) -> Result<DetectionResult> {
        Ok(DetectionResult {
            detections: vec![],
            num_detections: 0,
            confidence_avg: params.confidence_threshold.unwrap_or(0.0),
            image_size,
        })
    }
}

#[test]
fn test_stop_fails_queued_jobs_instead_of_running_them() {
    // Arrange: one worker, occupied with a slow first job long enough for
    // two more jobs to sit in the queue when `stop` is called.
    let provider = Arc::new(SlowProvider {
        delay: Duration::from_millis(200),
    });
    let model_cache = Arc::new(ModelCache::new(crate::config::ModelCacheConfig::default(), provider.clone()));
    let mut config = SchedulerConfig::default();
    config.max_workers = 1;
    let scheduler = Scheduler::new(config, provider, model_cache);
    scheduler.start();

    let running_job = scheduler.submit(descriptor(0)).expect("submit should succeed");
    std::thread::sleep(Duration::from_millis(30));
    let queued_a = scheduler.submit(descriptor(0)).expect("submit should succeed");
    let queued_b = scheduler.submit(descriptor(0)).expect("submit should succeed");

    // Act
    scheduler.stop();

    // Assert: the in-flight job ran to completion, the queued ones were
    // failed without ever being executed.
    let running_view = scheduler.status(running_job).unwrap();
    assert_eq!(running_view.status, JobStatus::Completed);

    for id in [queued_a, queued_b] {
        let view = scheduler.status(id).unwrap();
        assert_eq!(view.status, JobStatus::Failed);
        match view.outcome {
            Some(JobOutcome::Error(message)) => assert!(message.contains("shutting down")),
            other => panic!("expected a shutting-down error outcome, got {other:?}"),
        }
    }
}

#[test]
fn test_submitted_jobs_queue_in_priority_order_before_any_worker_runs() {
    // Arrange: no workers, so both submissions land in the queue untouched.
    let mut config = SchedulerConfig::default();
    config.max_workers = 0;
    let scheduler = new_scheduler(config);
    scheduler.start();
    let low = scheduler.submit(descriptor(0)).expect("submit should succeed");
    let high = scheduler.submit(descriptor(10)).expect("submit should succeed");

    // Act
    let order = vec![scheduler.queue.pop(), scheduler.queue.pop()];

    // Assert
    assert_eq!(order, vec![Some(high), Some(low)]);
    scheduler.stop();
}
