//! Image Classifier Server
//!
//! HTTP front-end for the classifier. Serves the upload page and answers
//! `POST /predict` with the predicted class and its confidence.

mod routes;
mod state;
mod upload;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use image_classifier::utils::logging::{init_logging, LogConfig};
use image_classifier::{load_predictor, LabelFormat};

use crate::state::{AppState, ServerConfig, SharedState};

/// Image Classifier Server
#[derive(Parser, Debug)]
#[command(name = "image-classifier-server")]
#[command(version)]
#[command(about = "HTTP API for single-image classification")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, default_value = "5000")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Model file, or directory containing model.onnx
    #[arg(long, env = "CLASSIFIER_MODEL")]
    model: Option<PathBuf>,

    /// Label file
    #[arg(long, env = "CLASSIFIER_LABELS")]
    labels: Option<PathBuf>,

    /// Label file layout
    #[arg(long, value_enum, env = "CLASSIFIER_LABEL_FORMAT")]
    label_format: Option<LabelFormat>,

    /// Directory uploads are written to
    #[arg(long, env = "CLASSIFIER_UPLOAD_DIR")]
    upload_dir: Option<PathBuf>,

    /// Directory with index.html and static assets
    #[arg(long, env = "CLASSIFIER_STATIC_DIR")]
    static_dir: Option<PathBuf>,

    /// Maximum request body size in bytes
    #[arg(long, env = "CLASSIFIER_MAX_UPLOAD_BYTES")]
    max_upload_bytes: Option<usize>,

    /// Keep uploaded files after inference
    #[arg(long, env = "CLASSIFIER_KEEP_UPLOADS", default_value = "false")]
    keep_uploads: bool,

    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

impl Cli {
    /// Overlay the flags that were given onto the defaults
    fn into_config(self) -> ServerConfig {
        let mut config = ServerConfig::default();

        if let Some(model) = self.model {
            config.model_path = model;
        }
        if let Some(labels) = self.labels {
            config.labels_path = labels;
        }
        if let Some(label_format) = self.label_format {
            config.label_format = label_format;
        }
        if let Some(upload_dir) = self.upload_dir {
            config.upload_dir = upload_dir;
        }
        if let Some(static_dir) = self.static_dir {
            config.static_dir = static_dir;
        }
        if let Some(max_upload_bytes) = self.max_upload_bytes {
            config.max_upload_bytes = max_upload_bytes;
        }
        config.keep_uploads = self.keep_uploads;

        config
    }
}

/// Assemble routes and middleware around the shared state
pub fn build_router(state: SharedState) -> Router {
    let static_dir = state.config.static_dir.clone();
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        // Upload page
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(&static_dir))

        // API
        .route("/predict", post(routes::predict::predict))
        .route("/health", get(routes::health::health_check))

        // Add state
        .with_state(state)

        // Add middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();
    let host = cli.host.clone();
    let port = cli.port;

    // Initialize logging
    init_logging(&LogConfig::from_verbosity(cli.verbose)).map_err(anyhow::Error::msg)?;

    let config = cli.into_config();

    info!("Image Classifier Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Model:        {:?}", config.model_path);
    info!("  Labels:       {:?} ({})", config.labels_path, config.label_format);
    info!("  Upload dir:   {:?}", config.upload_dir);
    info!("  Static dir:   {:?}", config.static_dir);
    info!("  Max upload:   {} bytes", config.max_upload_bytes);
    info!("  Keep uploads: {}", config.keep_uploads);

    tokio::fs::create_dir_all(&config.upload_dir).await?;

    if !config.static_dir.join("index.html").exists() {
        warn!(
            "No index.html in {:?}; GET / will return 404",
            config.static_dir
        );
    }

    // Model and labels are loaded once and never change afterwards
    let predictor = load_predictor(&config.model_path, &config.labels_path, config.label_format)?;
    info!("Predictor ready: {:?}", predictor);

    let state = Arc::new(AppState::new(config, predictor));
    let app = build_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
