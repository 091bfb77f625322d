//! HTTP routes and handlers

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{debug, error};
use visionserve_core::{ErrorBody, HealthStatus, PredictionResult};

use crate::state::AppState;

/// Multipart field that carries the image
const FILE_FIELD: &str = "file";

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health/", get(health_check))
        .route("/health", get(health_check))
        .route("/predict/", post(predict))
        .route("/predict", post(predict))
        .route("/metrics", get(render_metrics))
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<HealthStatus> {
    metrics::counter!("visionserve_requests_total", "endpoint" => "health").increment(1);
    Json(HealthStatus::healthy())
}

async fn render_metrics(State(state): State<AppState>) -> String {
    state
        .metrics_handle
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

/// Classify the uploaded image and return the top-ranked labels
async fn predict(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResult>, AppError> {
    metrics::counter!("visionserve_requests_total", "endpoint" => "predict").increment(1);

    let bytes = read_upload(multipart?).await?;
    debug!("Received upload of {} bytes", bytes.len());

    let pipeline = state.pipeline.clone();
    let (result, elapsed) = tokio::task::spawn_blocking(move || {
        let start = Instant::now();
        let result = pipeline.predict(&bytes);
        (result, start.elapsed())
    })
    .await
    .map_err(|e| visionserve_core::Error::internal(format!("prediction task failed: {}", e)))?;
    let result = result?;

    let elapsed_us = elapsed.as_micros() as u64;
    metrics::histogram!("visionserve_inference_latency_us").record(elapsed_us as f64);

    if let Some(top) = result.top() {
        debug!(
            "Predicted '{}' ({:.4}) in {}us",
            top.label, top.probability, elapsed_us
        );
    }

    Ok(Json(result))
}

/// Pull the image bytes out of the form
///
/// Prefers the field named `file`; otherwise takes the first field that
/// carries a filename.
async fn read_upload(mut multipart: Multipart) -> Result<Bytes, AppError> {
    let mut first_named: Option<Bytes> = None;

    while let Some(field) = multipart.next_field().await? {
        let is_file_field = field.name() == Some(FILE_FIELD);
        let has_filename = field.file_name().is_some();

        if is_file_field {
            return Ok(field.bytes().await?);
        }

        if has_filename && first_named.is_none() {
            first_named = Some(field.bytes().await?);
        }
    }

    first_named
        .ok_or_else(|| AppError::Upload(format!("missing '{}' field in upload", FILE_FIELD)))
}

async fn fallback() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ErrorBody::new("not found")))
}

/// Error handling
///
/// Every failure is reported as a 500 carrying the underlying message.
#[derive(Debug)]
pub enum AppError {
    Upload(String),
    Prediction(visionserve_core::Error),
}

impl From<visionserve_core::Error> for AppError {
    fn from(err: visionserve_core::Error) -> Self {
        AppError::Prediction(err)
    }
}

impl From<axum::extract::multipart::MultipartError> for AppError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        AppError::Upload(err.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(err: MultipartRejection) -> Self {
        AppError::Upload(err.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match self {
            AppError::Upload(msg) => msg,
            AppError::Prediction(err) => err.to_string(),
        };
        let message = if message.trim().is_empty() {
            "request failed".to_string()
        } else {
            message
        };

        error!("Prediction failed: {}", message);
        metrics::counter!("visionserve_errors_total").increment(1);

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody::new(message)),
        )
            .into_response()
    }
}
