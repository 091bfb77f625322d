//! VisionServe Core
//!
//! Types shared across VisionServe components.
//!
//! This crate provides:
//! - The error type every pipeline stage reports through
//! - Wire types for predictions, health checks and error bodies

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{ErrorBody, HealthStatus, Prediction, PredictionResult};
