//! Inference Predictor Module
//!
//! Runs a prepared tensor through the model and maps the winning output
//! index to a class name. [`Predictor`] bundles the model with its label set
//! so both entry points share one immutable inference context.

use std::path::Path;
use std::time::Instant;

use serde::Serialize;

use super::labels::LabelSet;
use super::model::Classifier;
use super::preprocess::{prepare_image, PreparedTensor};
use crate::utils::error::{ClassifierError, Result};
use crate::utils::format_millis;

/// Label reported when the model's output index has no matching label
pub const INDEX_OUT_OF_RANGE: &str = "Index out of range";

/// Predicted class and the model's own score for it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Class name
    #[serde(rename = "class")]
    pub label: String,
    /// Raw model output at the winning index
    pub confidence: f32,
}

impl Prediction {
    /// Whether the label came from the out-of-range fallback
    pub fn is_out_of_range(&self) -> bool {
        self.label == INDEX_OUT_OF_RANGE
    }
}

impl std::fmt::Display for Prediction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:.4})", self.label, self.confidence)
    }
}

/// Index and value of the largest score
///
/// Ties keep the earliest index and NaN never wins. This is not numpy's
/// `argmax`, which returns the first NaN it meets; a NaN score here is skipped
/// in favour of the largest real one. Returns `None` for an empty slice.
pub fn argmax(scores: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &value) in scores.iter().enumerate() {
        match best {
            Some((_, top)) if !(value > top) => {}
            Some(_) => best = Some((index, value)),
            None if value.is_nan() => {}
            None => best = Some((index, value)),
        }
    }
    // All-NaN output still names the first class.
    best.or_else(|| scores.first().map(|&v| (0, v)))
}

/// Map a score vector to a prediction
pub fn select_prediction(scores: &[f32], labels: &LabelSet) -> Result<Prediction> {
    let (index, confidence) = argmax(scores)
        .ok_or_else(|| ClassifierError::Model("model returned an empty score vector".to_string()))?;

    let label = match labels.get(index) {
        Some(label) => label.to_string(),
        None => {
            tracing::warn!(
                "Model predicted class {} but only {} labels are loaded",
                index,
                labels.len()
            );
            INDEX_OUT_OF_RANGE.to_string()
        }
    };

    Ok(Prediction { label, confidence })
}

/// Run the model on a prepared tensor and name the winning class
pub fn classify(
    tensor: &PreparedTensor,
    model: &dyn Classifier,
    labels: &LabelSet,
) -> Result<Prediction> {
    let scores = model.forward(tensor)?;
    if scores.len() != labels.len() {
        tracing::debug!(
            "Model emitted {} scores for {} labels",
            scores.len(),
            labels.len()
        );
    }
    select_prediction(&scores, labels)
}

/// Model plus labels, loaded once and shared read-only
pub struct Predictor {
    model: Box<dyn Classifier>,
    labels: LabelSet,
}

impl std::fmt::Debug for Predictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Predictor")
            .field("model", &self.model.describe())
            .field("num_classes", &self.labels.len())
            .finish()
    }
}

impl Predictor {
    pub fn new(model: Box<dyn Classifier>, labels: LabelSet) -> Self {
        if labels.is_empty() {
            tracing::warn!("Label set is empty; every prediction will be out of range");
        }
        Self { model, labels }
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn model(&self) -> &dyn Classifier {
        self.model.as_ref()
    }

    /// Classify an already prepared tensor
    pub fn predict_tensor(&self, tensor: &PreparedTensor) -> Result<Prediction> {
        classify(tensor, self.model.as_ref(), &self.labels)
    }

    /// Decode, preprocess and classify the image at `path`
    pub fn predict_file(&self, path: &Path) -> Result<Prediction> {
        tracing::debug!("Predicting image: {:?}", path);

        let start = Instant::now();
        let tensor = prepare_image(path)?;
        let prepared = start.elapsed();

        let prediction = self.predict_tensor(&tensor)?;
        let total = start.elapsed();

        tracing::debug!(
            "Preprocessing {} / inference {}",
            format_millis(prepared.as_secs_f64() * 1000.0),
            format_millis((total - prepared).as_secs_f64() * 1000.0)
        );
        Ok(prediction)
    }
}
