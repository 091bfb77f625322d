//! Wire types for VisionServe
//!
//! These are serialized directly as HTTP response bodies.

use serde::{Deserialize, Serialize};

/// A single ranked class with its probability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Human-readable class name from the label table
    pub label: String,

    /// Softmax probability (0.0-1.0)
    pub probability: f32,
}

impl Prediction {
    /// Create a new prediction
    pub fn new(label: impl Into<String>, probability: f32) -> Self {
        Self {
            label: label.into(),
            probability,
        }
    }
}

/// Ranked predictions, highest probability first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predictions: Vec<Prediction>,
}

impl PredictionResult {
    /// Create a result from already-ranked predictions
    pub fn new(predictions: Vec<Prediction>) -> Self {
        Self { predictions }
    }

    /// Highest-ranked prediction, if any
    pub fn top(&self) -> Option<&Prediction> {
        self.predictions.first()
    }

    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }
}

/// Health check response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    /// The only status a running process reports
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

/// Error response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
