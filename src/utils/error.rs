//! Error Handling Module
//!
//! Defines the error taxonomy shared by the inference pipeline, the offline
//! CLI and the HTTP server. Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for classification operations
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// The request carried no `image` upload field
    #[error("No image file")]
    MissingFile,

    /// The image file is missing, unreadable or not a decodable format
    #[error("Failed to decode image at '{0}': {1}")]
    ImageDecode(PathBuf, String),

    /// The label file could not be read
    #[error("Failed to load labels from '{0}': {1}")]
    Labels(PathBuf, String),

    /// Model loading or invocation failed
    #[error("Model error: {0}")]
    Model(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClassifierError {
    /// Whether the failure was caused by what the client sent
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ClassifierError::MissingFile
                | ClassifierError::ImageDecode(..)
                | ClassifierError::InvalidInput(_)
        )
    }
}

/// Convenience Result type for classification operations
pub type Result<T> = std::result::Result<T, ClassifierError>;
