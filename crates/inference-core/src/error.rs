//! Error types for the inference platform core

use thiserror::Error;

/// Main error type for scheduler, model cache and stream pipeline operations
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("queue is full")]
    QueueFull,

    #[error("scheduler is not running")]
    NotRunning,

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("invalid image payload: {0}")]
    InvalidImage(String),

    #[error("model load failed for {key}: {message}")]
    ModelLoadFailed { key: String, message: String },

    #[error("provider error: {0}")]
    ProviderError(String),

    #[error("shutting down")]
    ShuttingDown,

    #[error("worker crashed: {0}")]
    WorkerCrashed(String),

    #[error("camera upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("max reconnect attempts exceeded")]
    MaxReconnectsExceeded,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
