//! # Image Classifier
//!
//! Classifies a single image with a pretrained model and reports the winning
//! class name together with the model's confidence.
//!
//! ## Modules
//!
//! - `inference`: preprocessing, the model boundary, label files and the
//!   `Predictor` context
//! - `utils`: logging and error types
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use image_classifier::{load_predictor, LabelFormat};
//!
//! let predictor = load_predictor("model".as_ref(), "labels.txt".as_ref(), LabelFormat::Plain)?;
//! let prediction = predictor.predict_file("photo.jpg".as_ref())?;
//! println!("{} {:.4}", prediction.label, prediction.confidence);
//! ```

use std::path::Path;

pub mod inference;
pub mod utils;

// Re-export commonly used items for convenience
pub use inference::{
    classify, prepare_image, Classifier, LabelFormat, LabelSet, OnnxClassifier, Prediction,
    PreparedTensor, Predictor, INDEX_OUT_OF_RANGE,
};
pub use utils::error::{ClassifierError, Result};

/// Extensions treated as images when scanning directories
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

/// Load the ONNX model and its label file into a ready-to-use predictor
pub fn load_predictor(model_path: &Path, labels_path: &Path, format: LabelFormat) -> Result<Predictor> {
    let model = OnnxClassifier::load(model_path)?;
    let labels = LabelSet::load(labels_path, format)?;
    tracing::info!("Loaded {} labels from {:?}", labels.len(), labels_path);
    Ok(Predictor::new(Box::new(model), labels))
}

/// Whether `path` has one of the [`IMAGE_EXTENSIONS`]
pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}
