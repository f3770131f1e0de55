//! Application state for the classifier server
//!
//! Everything here is built once at startup and only read afterwards.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use image_classifier::{LabelFormat, Predictor};

/// Largest accepted request body (16 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Server configuration
#[derive(Clone, Debug, Serialize)]
pub struct ServerConfig {
    /// Model file, or directory containing `model.onnx`
    pub model_path: PathBuf,
    /// Label file
    pub labels_path: PathBuf,
    /// Layout of the label file
    pub label_format: LabelFormat,
    /// Where uploads are written before inference
    pub upload_dir: PathBuf,
    /// Directory holding `index.html` and other static assets
    pub static_dir: PathBuf,
    /// Request body limit in bytes
    pub max_upload_bytes: usize,
    /// Keep uploaded files on disk after inference
    pub keep_uploads: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("model/model.onnx"),
            labels_path: PathBuf::from("labels.txt"),
            label_format: LabelFormat::Plain,
            upload_dir: PathBuf::from("static/images"),
            static_dir: PathBuf::from("static"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            keep_uploads: false,
        }
    }
}

/// Shared application state
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// Loaded model and labels
    pub predictor: Predictor,
    /// Server start time
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: ServerConfig, predictor: Predictor) -> Self {
        Self {
            config,
            predictor,
            started_at: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

pub type SharedState = Arc<AppState>;
