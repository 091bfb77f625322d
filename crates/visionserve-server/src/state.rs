//! Shared application state

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use visionserve_classifiers::PredictionPipeline;

use crate::config::ServerConfig;

/// Application state shared across all requests
///
/// Everything here is read-only after startup, so handlers clone it freely.
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<ServerConfig>,

    /// Prediction pipeline over the loaded model host
    pub pipeline: Arc<PredictionPipeline>,

    /// Prometheus metrics handle for rendering
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    /// Build state from configuration, loading the model and label table
    ///
    /// Loading is blocking I/O (and possibly a weights download), so it runs
    /// off the async workers.
    pub async fn load(
        config: ServerConfig,
        metrics_handle: Option<PrometheusHandle>,
    ) -> anyhow::Result<Self> {
        let classifier_config = config.classifier.clone();
        let pipeline = tokio::task::spawn_blocking(move || {
            PredictionPipeline::from_config(&classifier_config)
        })
        .await??;

        Ok(Self::new(config, pipeline, metrics_handle))
    }

    /// Build state around an already-constructed pipeline
    pub fn new(
        config: ServerConfig,
        pipeline: PredictionPipeline,
        metrics_handle: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            metrics_handle,
        }
    }
}
