//! inference-core: scheduler, model cache, camera stream pipeline and
//! dashboard broadcaster for a small on-prem inference platform.

pub mod broadcaster;
pub mod config;
pub mod error;
pub mod event_emitter;
pub mod model_cache;
pub mod provider;
pub mod scheduler;
pub mod store;
pub mod stream;
pub mod types;

pub use broadcaster::{Broadcaster, DashboardCommand, DashboardMessage, DashboardSnapshot, DashboardSubscription};
pub use error::{CoreError, Result};
pub use event_emitter::{Event, EventEmitter, EventKind};
pub use model_cache::{ModelCache, ModelCacheStats};
pub use provider::{ModelHandle, PreparedInput, Provider, RawPrediction, SyntheticProvider};
pub use scheduler::{CompletionCallback, Scheduler};
pub use store::{DocumentStore, InMemoryDocumentStore, InMemoryObjectStore, ObjectStore};
pub use stream::{BoundingBox, CaptureSource, StreamManager, StreamSession, SyntheticSource};
pub use types::{
    Detection, DetectionResult, Job, JobDescriptor, JobId, JobKind, JobOutcome, JobParams,
    JobStatus, JobView, SchedulerStats,
};
