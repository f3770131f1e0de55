//! Prediction endpoint

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use tracing::info;

use image_classifier::{ClassifierError, Prediction};

use super::error::ApiError;
use crate::state::SharedState;
use crate::upload::SavedUpload;

/// Multipart field carrying the image
pub const IMAGE_FIELD: &str = "image";

/// File part pulled out of the form
struct ImagePart {
    file_name: String,
    bytes: Vec<u8>,
}

/// Find the `image` file part, skipping everything else
///
/// A plain text field named `image` (no filename) is not a file upload.
async fn read_image_part(multipart: &mut Multipart) -> Result<Option<ImagePart>, ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let bytes = field.bytes().await?;
        return Ok(Some(ImagePart {
            file_name,
            bytes: bytes.to_vec(),
        }));
    }
    Ok(None)
}

/// POST /predict - Classify an uploaded image
///
/// Saves the upload, classifies it from disk and answers
/// `{"class": ..., "confidence": ...}`.
pub async fn predict(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Prediction>, ApiError> {
    let mut multipart = multipart?;
    let part = read_image_part(&mut multipart)
        .await?
        .ok_or(ClassifierError::MissingFile)?;

    let upload = SavedUpload::write(
        &state.config.upload_dir,
        Some(&part.file_name),
        &part.bytes,
        state.config.keep_uploads,
    )
    .await?;

    let worker_state = state.clone();
    let prediction = tokio::task::spawn_blocking(move || {
        let result = worker_state.predictor.predict_file(upload.path());
        upload.remove();
        result
    })
    .await
    .map_err(ApiError::internal)??;

    info!(
        "Predicted '{}' ({:.4}) for {:?}",
        prediction.label,
        prediction.confidence,
        part.file_name
    );

    Ok(Json(prediction))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::path::Path;
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{header::CONTENT_TYPE, Request, StatusCode},
        Router,
    };
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use serde_json::Value;
    use tower::ServiceExt;

    use image_classifier::{Classifier, LabelSet, PreparedTensor, Predictor, Result};

    use crate::state::{AppState, ServerConfig};

    const BOUNDARY: &str = "----classifier-test-boundary";

    /// Scores each channel by its mean, so the dominant color wins
    struct ChannelMean;

    impl Classifier for ChannelMean {
        fn forward(&self, input: &PreparedTensor) -> Result<Vec<f32>> {
            let mut sums = [0.0f32; 3];
            for (i, v) in input.as_slice().iter().enumerate() {
                sums[i % 3] += (v + 1.0) / 2.0;
            }
            let total: f32 = sums.iter().sum::<f32>().max(f32::EPSILON);
            Ok(sums.iter().map(|s| s / total).collect())
        }
    }

    struct Broken;

    impl Classifier for Broken {
        fn forward(&self, _input: &PreparedTensor) -> Result<Vec<f32>> {
            Err(image_classifier::ClassifierError::Model("graph exploded".into()))
        }
    }

    fn app_with(model: Box<dyn Classifier>, upload_dir: &Path, keep_uploads: bool) -> Router {
        let config = ServerConfig {
            upload_dir: upload_dir.to_path_buf(),
            static_dir: upload_dir.to_path_buf(),
            keep_uploads,
            max_upload_bytes: 1024 * 1024,
            ..ServerConfig::default()
        };
        let labels: LabelSet = ["red", "green", "blue"].into_iter().collect();
        let state = Arc::new(AppState::new(config, Predictor::new(model, labels)));
        crate::build_router(state)
    }

    fn png(color: [u8; 3]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 48, Rgb(color)))
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn multipart_body(field: &str, file_name: &str, data: &[u8]) -> Vec<u8> {
        let disposition = format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
             Content-Type: application/octet-stream",
            field, file_name
        );
        form_part(&disposition, data)
    }

    /// A form with a single part under the given headers
    fn form_part(headers: &str, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(headers.as_bytes());
        body.extend_from_slice(b"\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    async fn post(app: Router, body: Vec<u8>) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/predict")
                    .header(
                        CONTENT_TYPE,
                        format!("multipart/form-data; boundary={}", BOUNDARY),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    fn file_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn test_predict_returns_class_and_confidence() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(Box::new(ChannelMean), dir.path(), false);

        let (status, json) = post(app, multipart_body("image", "leaf.png", &png([10, 240, 30]))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["class"], "green");
        let confidence = json["confidence"].as_f64().unwrap();
        assert!(confidence > 0.5 && confidence <= 1.0);
    }

    #[tokio::test]
    async fn test_predict_is_stable_across_requests() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(Box::new(ChannelMean), dir.path(), false);
        let body = multipart_body("image", "sky.png", &png([20, 40, 230]));

        let (_, first) = post(app.clone(), body.clone()).await;
        for _ in 0..3 {
            let (status, again) = post(app.clone(), body.clone()).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(again, first);
        }
        assert_eq!(first["class"], "blue");
    }

    #[tokio::test]
    async fn test_missing_image_field() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(Box::new(ChannelMean), dir.path(), false);

        let (status, json) = post(app, multipart_body("photo", "leaf.png", &png([1, 2, 3]))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, serde_json::json!({"error": "No image file"}));
    }

    #[tokio::test]
    async fn test_non_multipart_body_is_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(Box::new(ChannelMean), dir.path(), false);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/predict")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json, serde_json::json!({"error": "No image file"}));
    }

    #[tokio::test]
    async fn test_image_text_field_is_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(Box::new(ChannelMean), dir.path(), false);

        let body = form_part("Content-Disposition: form-data; name=\"image\"", &png([1, 2, 3]));
        let (status, json) = post(app, body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json, serde_json::json!({"error": "No image file"}));
        assert_eq!(file_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_undecodable_upload_is_client_error_and_cleaned_up() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(Box::new(ChannelMean), dir.path(), false);

        let (status, json) = post(app, multipart_body("image", "notes.png", b"plain text")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("decode"));
        assert_eq!(file_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_uploads_removed_after_inference() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(Box::new(ChannelMean), dir.path(), false);

        let (status, _) = post(app, multipart_body("image", "a.png", &png([200, 0, 0]))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(file_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_uploads_kept_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(Box::new(ChannelMean), dir.path(), true);

        let (status, _) = post(app, multipart_body("image", "../../evil name.png", &png([200, 0, 0]))).await;
        assert_eq!(status, StatusCode::OK);

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with("_evil_name.png"));
    }

    #[tokio::test]
    async fn test_model_failure_is_generic_500() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(Box::new(Broken), dir.path(), false);

        let (status, json) = post(app, multipart_body("image", "a.png", &png([1, 1, 1]))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json, serde_json::json!({"error": "Internal server error"}));
        assert_eq!(file_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(Box::new(ChannelMean), dir.path(), false);

        let big = vec![0u8; 2 * 1024 * 1024];
        let (status, _) = post(app, multipart_body("image", "big.png", &big)).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(file_count(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_health_reports_labels() {
        let dir = tempfile::tempdir().unwrap();
        let app = app_with(Box::new(ChannelMean), dir.path(), false);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["num_classes"], 3);
    }

    #[tokio::test]
    async fn test_index_page_served() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>upload</h1>").unwrap();
        let app = app_with(Box::new(ChannelMean), dir.path(), false);

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<h1>upload</h1>");
    }
}
