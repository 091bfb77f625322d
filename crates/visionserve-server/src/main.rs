//! VisionServe
//!
//! Serves a pre-trained ResNet image classifier over HTTP.
//!
//! The model and label table are loaded once at startup. A failure there is
//! fatal; afterwards every request reads the same immutable model.

use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{info, warn};

use visionserve_server::{create_router, AppState, Cli, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose);

    info!("Starting VisionServe");

    // Load configuration
    let config = ServerConfig::load(&cli.config, &cli)?;
    info!("Configuration loaded successfully");
    info!("Model source: {:?}", config.classifier.model.source);
    info!(
        "Architecture: {:?}, device: {:?}",
        config.classifier.model.architecture, config.classifier.model.device
    );
    info!("Labels: {}", config.classifier.labels_path.display());

    // Initialize metrics
    let metrics_handle = init_metrics()?;

    // Load model host and build the prediction pipeline
    info!("Loading model...");
    let state = AppState::load(config, Some(metrics_handle)).await?;
    info!(
        "Model '{}' ready with {} classes",
        state.pipeline.host().model().name(),
        state.pipeline.host().labels().len()
    );

    let addr: SocketAddr = state.config.bind_address().parse()?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            warn!("Shutdown signal received, stopping server...");
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Listen for shutdown signals (SIGTERM, SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("visionserve=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("visionserve=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "visionserve_requests_total",
        "Total number of requests by endpoint"
    );
    metrics::describe_counter!(
        "visionserve_errors_total",
        "Total number of failed prediction requests"
    );
    metrics::describe_histogram!(
        "visionserve_inference_latency_us",
        metrics::Unit::Microseconds,
        "Pipeline latency per prediction in microseconds"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}
