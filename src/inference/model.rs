//! Model boundary
//!
//! The pretrained network is opaque: a function from a (1, 224, 224, 3) f32
//! tensor to one score per class. [`Classifier`] is that seam; the ONNX
//! runtime is one implementation of it.

use std::path::{Path, PathBuf};

use tract_onnx::prelude::*;

use super::preprocess::{PreparedTensor, INPUT_SHAPE};
use crate::utils::error::{ClassifierError, Result};

/// File looked up when the model path points at a directory
pub const DEFAULT_MODEL_FILE: &str = "model.onnx";

/// Anything that maps a prepared tensor to per-class probabilities
///
/// Implementations must not mutate state during `forward`; a single instance
/// is shared across every request.
pub trait Classifier: Send + Sync {
    /// Scores of the single batch item, indexed by class
    fn forward(&self, input: &PreparedTensor) -> Result<Vec<f32>>;

    /// Short description for logs
    fn describe(&self) -> String {
        "classifier".to_string()
    }
}

type Plan = TypedRunnableModel<TypedModel>;

/// ONNX model executed with tract
pub struct OnnxClassifier {
    plan: Plan,
    path: PathBuf,
}

impl std::fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl OnnxClassifier {
    /// Load and optimize a model
    ///
    /// `path` is either the `.onnx` file itself or a directory holding
    /// `model.onnx`.
    pub fn load(path: &Path) -> Result<Self> {
        let path = resolve_model_path(path);
        if !path.is_file() {
            return Err(ClassifierError::Model(format!(
                "model file not found: {}",
                path.display()
            )));
        }

        let plan = tract_onnx::onnx()
            .model_for_path(&path)
            .and_then(|model| model.with_input_fact(0, f32::fact(INPUT_SHAPE).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| {
                ClassifierError::Model(format!("failed to load {}: {:#}", path.display(), e))
            })?;

        tracing::info!("Loaded ONNX model from {:?}", path);
        Ok(Self { plan, path })
    }
}

impl Classifier for OnnxClassifier {
    fn forward(&self, input: &PreparedTensor) -> Result<Vec<f32>> {
        let tensor = Tensor::from_shape(&input.shape(), input.as_slice())
            .map_err(|e| ClassifierError::Model(format!("failed to build input: {:#}", e)))?;

        let outputs = self
            .plan
            .run(tvec!(tensor.into()))
            .map_err(|e| ClassifierError::Model(format!("inference failed: {:#}", e)))?;

        let output = outputs
            .first()
            .ok_or_else(|| ClassifierError::Model("model produced no outputs".to_string()))?;
        let view = output
            .to_array_view::<f32>()
            .map_err(|e| ClassifierError::Model(format!("unexpected output type: {:#}", e)))?;

        // (batch, classes) in the usual case; take the first batch item.
        let scores: Vec<f32> = if view.ndim() >= 2 {
            view.index_axis(tract_ndarray::Axis(0), 0)
                .iter()
                .copied()
                .collect()
        } else {
            view.iter().copied().collect()
        };
        Ok(scores)
    }

    fn describe(&self) -> String {
        format!("onnx:{}", self.path.display())
    }
}

/// Resolve a model directory to the model file inside it
pub fn resolve_model_path(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(DEFAULT_MODEL_FILE)
    } else {
        path.to_path_buf()
    }
}
