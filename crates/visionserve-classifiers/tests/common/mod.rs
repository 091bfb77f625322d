//! Deterministic scoring model for testing
//!
//! Scores are a fixed linear function of the per-channel mean of the input,
//! so different images rank classes differently while repeated calls on the
//! same image always agree.

#![allow(dead_code)]

use candle_core::{Device, Tensor};
use std::sync::atomic::{AtomicU32, Ordering};
use visionserve_classifiers::ScoringModel;
use visionserve_core::{Error, Result};

pub struct MockScoringModel {
    name: String,
    weights: Tensor,
    num_classes: usize,
    call_count: AtomicU32,
}

impl MockScoringModel {
    /// Create a mock with `num_classes` outputs
    pub fn new(num_classes: usize) -> Self {
        let values: Vec<f32> = (0..3 * num_classes)
            .map(|i| ((i * 37 + 11) % 101) as f32 / 25.0 - 2.0)
            .collect();
        let weights = Tensor::from_vec(values, (3, num_classes), &Device::Cpu)
            .expect("mock weights");

        Self {
            name: "mock-linear".to_string(),
            weights,
            num_classes,
            call_count: AtomicU32::new(0),
        }
    }

    /// Get the number of times forward was called
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl ScoringModel for MockScoringModel {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        input
            .mean((2, 3))
            .and_then(|means| means.matmul(&self.weights))
            .map_err(|e| Error::inference(e.to_string()))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }
}

/// Mock that always fails its forward pass
pub struct FailingModel {
    pub num_classes: usize,
}

impl ScoringModel for FailingModel {
    fn forward(&self, _input: &Tensor) -> Result<Tensor> {
        Err(Error::inference("simulated inference failure"))
    }

    fn name(&self) -> &str {
        "failing"
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }
}
