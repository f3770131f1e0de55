//! Inference module
//!
//! The whole classification pipeline lives here and is shared by the HTTP
//! server and the offline CLI:
//! - `preprocess`: image file → (1, 224, 224, 3) tensor in [-1, 1]
//! - `model`: the opaque model boundary and its ONNX implementation
//! - `labels`: class-name files
//! - `predictor`: arg-max, label lookup and the shared `Predictor` context

pub mod labels;
pub mod model;
pub mod predictor;
pub mod preprocess;

// Re-export main types for convenience
pub use labels::{LabelFormat, LabelSet};
pub use model::{Classifier, OnnxClassifier};
pub use predictor::{classify, Prediction, Predictor, INDEX_OUT_OF_RANGE};
pub use preprocess::{prepare, prepare_image, PreparedTensor, INPUT_SHAPE, INPUT_SIZE};
