//! Provider strip: the model-specific preprocess/predict/postprocess seam.
//!
//! The scheduler and model cache are provider-agnostic; they drive this
//! trait without knowing what kind of model sits behind it. Mirrors
//! spec.md §6 ("Provider").

use crate::error::Result;
use crate::types::{DetectionResult, JobKind, JobParams};

/// Opaque handle to a loaded model, returned by `Provider::load`.
///
/// The model cache owns the handle's lifetime; providers only see it via
/// `&ModelHandle` on the predict/postprocess calls.
pub struct ModelHandle {
    pub key: String,
    pub size_bytes: u64,
    inner: Box<dyn std::any::Any + Send + Sync>,
}

impl ModelHandle {
    pub fn new<T: std::any::Any + Send + Sync>(key: String, size_bytes: u64, inner: T) -> Self {
        Self {
            key,
            size_bytes,
            inner: Box::new(inner),
        }
    }

    pub fn downcast_ref<T: std::any::Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("key", &self.key)
            .field("size_bytes", &self.size_bytes)
            .finish()
    }
}

/// Decoded, model-ready tensor-like input produced by `Provider::preprocess`.
#[derive(Debug, Clone)]
pub struct PreparedInput {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Raw model output, before mapping to a [`DetectionResult`].
#[derive(Debug, Clone)]
pub struct RawPrediction {
    pub data: Vec<u8>,
}

/// A model backend: decode weights, decode input, run inference, shape output.
///
/// Implementations are supplied by callers (the scheduler never constructs
/// one on its own); this keeps model-loading and tensor math out of the
/// concurrency primitives entirely.
pub trait Provider: Send + Sync {
    /// Loads the model named by `key` and reports its resident size.
    fn load(&self, key: &str) -> Result<ModelHandle>;

    /// Decodes a raw payload (e.g. JPEG bytes) into a model-ready input.
    fn preprocess(&self, kind: JobKind, payload: &[u8]) -> Result<PreparedInput>;

    /// Runs inference. `handle` was produced by a prior `load` call for the
    /// same model key as the job being served.
    fn predict(&self, handle: &ModelHandle, input: &PreparedInput) -> Result<RawPrediction>;

    /// Maps a raw prediction plus the job's overrides into a typed result.
    fn postprocess(
        &self,
        kind: JobKind,
        params: &JobParams,
        prediction: RawPrediction,
        image_size: [u32; 2],
    ) -> Result<DetectionResult>;
}

/// In-memory provider used by tests and the CLI demo: "loading" allocates a
/// fixed-size buffer standing in for weights, and postprocess synthesizes a
/// single deterministic detection so callers can exercise the full job
/// lifecycle without a real model runtime.
pub struct SyntheticProvider {
    pub model_size_bytes: u64,
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self {
            model_size_bytes: 16 * 1024 * 1024,
        }
    }
}

impl Provider for SyntheticProvider {
    fn load(&self, key: &str) -> Result<ModelHandle> {
        let weights = vec![0u8; self.model_size_bytes as usize];
        Ok(ModelHandle::new(key.to_string(), self.model_size_bytes, weights))
    }

    fn preprocess(&self, _kind: JobKind, payload: &[u8]) -> Result<PreparedInput> {
        Ok(PreparedInput {
            width: 640,
            height: 480,
            data: payload.to_vec(),
        })
    }

    fn predict(&self, _handle: &ModelHandle, input: &PreparedInput) -> Result<RawPrediction> {
        Ok(RawPrediction {
            data: vec![0u8; input.data.len().min(4)],
        })
    }

    fn postprocess(
        &self,
        _kind: JobKind,
        params: &JobParams,
        _prediction: RawPrediction,
        image_size: [u32; 2],
    ) -> Result<DetectionResult> {
        let confidence = params.confidence_threshold.unwrap_or(0.5).max(0.5);
        let detection = crate::types::Detection {
            class_id: 0,
            class_name: "object".to_string(),
            confidence,
            bbox: [10.0, 10.0, 100.0, 100.0],
        };
        Ok(DetectionResult {
            detections: vec![detection],
            num_detections: 1,
            confidence_avg: confidence,
            image_size,
        })
    }
}
