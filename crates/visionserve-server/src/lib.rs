//! VisionServe Server
//!
//! HTTP surface for the prediction pipeline:
//! - `GET /health/` reports liveness
//! - `POST /predict/` classifies an uploaded image and returns the top-5 labels
//! - `GET /metrics` renders Prometheus metrics

pub mod cli;
pub mod config;
pub mod routes;
pub mod state;

pub use cli::Cli;
pub use config::ServerConfig;
pub use routes::create_router;
pub use state::AppState;
