//! # Inference Engine
//!
//! Final stage of the pipeline: owns the eagle classifier and evaluates it
//! against packed feature vectors.
//!
//! ## Model Management:
//! - Weights live in a safetensors file at a configured path and are loaded
//!   through candle's `VarBuilder`
//! - Loading is lazy and at-most-once: the first `ensure_loaded()` performs
//!   the load under a write lock and every later call (including concurrent
//!   racers) reuses the same handle
//! - The load runs on the blocking pool under a timeout so an unreachable
//!   weights file cannot hang a request indefinitely
//!
//! The engine is an explicit object constructed once by `main` and handed to
//! the pipeline by reference — no process-wide mutable globals.

use crate::error::PipelineError;
use crate::pipeline::contract::{EAGLE_THRESHOLD, MODEL_INPUT_SIZE};
use candle_core::{DType, Device, Tensor};
use candle_nn::{linear, Linear, Module, VarBuilder};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Hidden layer widths of the classifier head. Part of the model contract:
/// the safetensors artifact must carry matching tensor shapes.
const HIDDEN_1: usize = 256;
const HIDDEN_2: usize = 64;

/// The pipeline's output record, owned by the caller and rendered as-is.
///
/// Canonical contract: `confidence` is the eagle-class probability as a
/// fraction in [0,1] (never pre-scaled to a percentage), with the full
/// per-class breakdown alongside.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PredictionResult {
    pub is_eagle: bool,
    pub confidence: f32,
    pub label: String,
    pub probabilities: ClassProbabilities,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ClassProbabilities {
    pub non_eagle: f32,
    pub eagle: f32,
}

/// The eagle call classifier: a small dense head over the packed mel vector.
///
/// Layer names (`fc1`, `fc2`, `out`) match the tensor names in the deployed
/// safetensors artifact.
pub struct EagleClassifier {
    fc1: Linear,
    fc2: Linear,
    out: Linear,
}

impl EagleClassifier {
    pub fn new(vb: VarBuilder) -> candle_core::Result<Self> {
        Ok(Self {
            fc1: linear(MODEL_INPUT_SIZE, HIDDEN_1, vb.pp("fc1"))?,
            fc2: linear(HIDDEN_1, HIDDEN_2, vb.pp("fc2"))?,
            out: linear(HIDDEN_2, 2, vb.pp("out"))?,
        })
    }

    /// Load weights from a safetensors file.
    pub fn load(path: &Path, device: &Device) -> anyhow::Result<Self> {
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[path], DType::F32, device)? };
        Ok(Self::new(vb)?)
    }

    /// Forward pass producing per-class logits of shape `(batch, 2)`.
    pub fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let xs = self.fc1.forward(xs)?.relu()?;
        let xs = self.fc2.forward(&xs)?.relu()?;
        self.out.forward(&xs)
    }
}

/// Lazily-loaded classifier shared across requests.
pub struct InferenceEngine {
    /// `None` until the first successful load; read-locked during inference.
    model: RwLock<Option<EagleClassifier>>,
    device: Device,
    weights_path: PathBuf,
    load_timeout: Duration,
    /// Number of actual weight loads performed. Stays at 1 for the process
    /// lifetime unless loading failed and is retried by a later request.
    loads_performed: AtomicU64,
}

impl InferenceEngine {
    pub fn new(weights_path: PathBuf, load_timeout: Duration) -> Self {
        Self {
            model: RwLock::new(None),
            device: Device::Cpu,
            weights_path,
            load_timeout,
            loads_performed: AtomicU64::new(0),
        }
    }

    /// Idempotent model load.
    ///
    /// The first caller performs the load; concurrent callers block on the
    /// write lock and find the model already present. Never re-reads the
    /// weights once a load has succeeded.
    pub async fn ensure_loaded(&self) -> Result<(), PipelineError> {
        if self.model.read().await.is_some() {
            return Ok(());
        }

        let mut guard = self.model.write().await;
        if guard.is_some() {
            // Lost the race to another loader; its result is ours too.
            return Ok(());
        }

        let path = self.weights_path.clone();
        let device = self.device.clone();
        let start = Instant::now();

        let load_task = tokio::task::spawn_blocking(move || EagleClassifier::load(&path, &device));
        let model = match tokio::time::timeout(self.load_timeout, load_task).await {
            Err(_) => {
                return Err(PipelineError::ModelLoad(format!(
                    "model load timed out after {:.0}s",
                    self.load_timeout.as_secs_f64()
                )))
            }
            Ok(Err(e)) => {
                return Err(PipelineError::ModelLoad(format!("load task panicked: {}", e)))
            }
            Ok(Ok(Err(e))) => {
                return Err(PipelineError::ModelLoad(format!(
                    "failed to load weights from {}: {}",
                    self.weights_path.display(),
                    e
                )))
            }
            Ok(Ok(Ok(model))) => model,
        };

        self.loads_performed.fetch_add(1, Ordering::SeqCst);
        tracing::info!(
            "classifier loaded from {} in {:.2}s",
            self.weights_path.display(),
            start.elapsed().as_secs_f64()
        );

        *guard = Some(model);
        Ok(())
    }

    pub async fn is_loaded(&self) -> bool {
        self.model.read().await.is_some()
    }

    pub fn loads_performed(&self) -> u64 {
        self.loads_performed.load(Ordering::SeqCst)
    }

    /// Evaluate the classifier against one packed feature vector.
    ///
    /// ## Process:
    /// 1. Reject inputs that do not match the model's input width
    /// 2. Build a transient `(1, MODEL_INPUT_SIZE)` tensor
    /// 3. Forward pass + softmax, then read the scores out — all transient
    ///    tensors drop here, nothing is retained across calls
    /// 4. Interpret the raw scores into a `PredictionResult`
    pub async fn predict(&self, features: &[f32]) -> Result<PredictionResult, PipelineError> {
        if features.len() != MODEL_INPUT_SIZE {
            return Err(PipelineError::Inference(format!(
                "feature vector has {} values, model expects {}",
                features.len(),
                MODEL_INPUT_SIZE
            )));
        }

        let guard = self.model.read().await;
        let model = guard
            .as_ref()
            .ok_or_else(|| PipelineError::Inference("model is not loaded".to_string()))?;

        let infer_err = |e: candle_core::Error| PipelineError::Inference(e.to_string());

        let input = Tensor::from_vec(features.to_vec(), (1, MODEL_INPUT_SIZE), &self.device)
            .map_err(infer_err)?;
        let logits = model.forward(&input).map_err(infer_err)?;
        let probs = candle_nn::ops::softmax_last_dim(&logits).map_err(infer_err)?;
        let scores: Vec<f32> = probs
            .squeeze(0)
            .map_err(infer_err)?
            .to_vec1::<f32>()
            .map_err(infer_err)?;

        interpret_scores(&scores)
    }
}

/// Turn the model's raw output values into the prediction record.
///
/// Binary classification convention: a single output value is the eagle
/// probability directly; with two or more values, index 1 is the eagle class
/// and index 0 the negative class. The decision threshold is fixed.
fn interpret_scores(scores: &[f32]) -> Result<PredictionResult, PipelineError> {
    let (non_eagle, eagle) = match scores {
        [] => {
            return Err(PipelineError::Inference(
                "model produced no output values".to_string(),
            ))
        }
        [single] => (1.0 - single, *single),
        [negative, positive, ..] => (*negative, *positive),
    };

    let is_eagle = eagle >= EAGLE_THRESHOLD;

    Ok(PredictionResult {
        is_eagle,
        confidence: eagle,
        label: if is_eagle { "Eagle Detected" } else { "No Eagle" }.to_string(),
        probabilities: ClassProbabilities { non_eagle, eagle },
    })
}
