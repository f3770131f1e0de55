//! JSON error responses
//!
//! Every failure leaves the server as `{"error": "..."}`. Client mistakes
//! carry their message; anything else is logged and reported generically.

use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, error};

use image_classifier::ClassifierError;

/// Message sent for every server-side failure
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Log `detail` and hide it behind a generic 500
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        error!("Request failed: {}", detail);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_MESSAGE)
    }
}

impl From<ClassifierError> for ApiError {
    fn from(err: ClassifierError) -> Self {
        match err {
            // The path is the server-side upload location; keep it out of the reply.
            ClassifierError::ImageDecode(_, reason) => Self::new(
                StatusCode::BAD_REQUEST,
                format!("Could not decode image: {}", reason),
            ),
            err if err.is_client_error() => Self::new(StatusCode::BAD_REQUEST, err.to_string()),
            err => Self::internal(err),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        let status = err.status();
        if status.is_server_error() {
            Self::internal(err.body_text())
        } else {
            Self::new(status, err.body_text())
        }
    }
}

/// A body that is not a multipart form carries no image either
impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        debug!("Rejected non-multipart body: {}", rejection.body_text());
        Self::from(ClassifierError::MissingFile)
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_missing_file_is_bad_request() {
        let err = ApiError::from(ClassifierError::MissingFile);
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "No image file");
    }

    #[test]
    fn test_decode_error_is_bad_request() {
        let err = ApiError::from(ClassifierError::ImageDecode(
            PathBuf::from("x.png"),
            "bad header".into(),
        ));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Could not decode image: bad header");
    }

    #[test]
    fn test_server_errors_are_generic() {
        let err = ApiError::from(ClassifierError::Model("onnx blew up".into()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, INTERNAL_ERROR_MESSAGE);

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = ApiError::from(io);
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("disk full"));
    }
}
