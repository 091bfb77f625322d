//! Scoring model trait

use candle_core::Tensor;
use visionserve_core::Result;

/// A read-only scoring function over image batches
///
/// Implementations take a `[batch, 3, height, width]` f32 tensor and return
/// raw per-class scores shaped `[batch, num_classes]`. They must not mutate
/// any state during `forward`.
pub trait ScoringModel: Send + Sync {
    /// Run a forward pass and return raw (pre-softmax) scores
    fn forward(&self, input: &Tensor) -> Result<Tensor>;

    /// Get the model name
    fn name(&self) -> &str;

    /// Number of classes in the output vector
    fn num_classes(&self) -> usize;
}
