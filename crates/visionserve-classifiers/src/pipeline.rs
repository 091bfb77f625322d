//! Prediction pipeline
//!
//! `ModelHost` is the process-wide inference context: one model, one label
//! table, one preprocessing transform. It is built explicitly at startup and
//! handed to a `PredictionPipeline`, which runs the fixed sequence
//! preprocess → forward → softmax → top-k → labels for each request.

use candle_core::{DType, Device, Tensor, D};
use std::sync::Arc;
use std::time::Instant;
use visionserve_core::{Error, Prediction, PredictionResult, Result};

use crate::classifier::ScoringModel;
use crate::config::ClassifierConfig;
use crate::labels::LabelTable;
use crate::model_loader::CandleModel;
use crate::preprocess::{preprocess, PreprocessConfig};

/// Default number of ranked classes per prediction
pub const DEFAULT_TOP_K: usize = 5;

/// Immutable inference context shared by all requests
pub struct ModelHost {
    model: Arc<dyn ScoringModel>,
    labels: LabelTable,
    preprocess: PreprocessConfig,
    device: Device,
}

impl ModelHost {
    /// Assemble a host from already-loaded parts
    ///
    /// Fails if the label table does not cover the model's output exactly,
    /// which is what keeps every ranked index a valid label lookup.
    pub fn new(
        model: Arc<dyn ScoringModel>,
        labels: LabelTable,
        preprocess: PreprocessConfig,
        device: Device,
    ) -> Result<Self> {
        preprocess.validate()?;

        if labels.len() != model.num_classes() {
            return Err(Error::config(format!(
                "Label table has {} entries but model '{}' outputs {} classes",
                labels.len(),
                model.name(),
                model.num_classes()
            )));
        }

        Ok(Self {
            model,
            labels,
            preprocess,
            device,
        })
    }

    /// Load labels and weights described by the configuration
    ///
    /// Any failure here means the process cannot serve.
    pub fn load(config: &ClassifierConfig) -> Result<Self> {
        config.validate()?;

        tracing::info!("Loading label table from {}", config.labels_path.display());
        let labels = LabelTable::from_file(&config.labels_path)?;

        let model = CandleModel::load(config.to_model_config())?;
        let device = model.device().clone();

        let host = Self::new(
            Arc::new(model),
            labels,
            config.preprocessing.clone(),
            device,
        )?;

        tracing::info!(
            "Model host ready: model={}, classes={}, input={}x{}",
            host.model.name(),
            host.labels.len(),
            host.preprocess.image_size,
            host.preprocess.image_size
        );

        Ok(host)
    }

    pub fn model(&self) -> &dyn ScoringModel {
        self.model.as_ref()
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }
}

/// Straight-line image → ranked labels pipeline
#[derive(Clone)]
pub struct PredictionPipeline {
    host: Arc<ModelHost>,
    top_k: usize,
}

impl PredictionPipeline {
    /// Create a pipeline returning the default top-5
    pub fn new(host: Arc<ModelHost>) -> Self {
        Self {
            host,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Set how many ranked classes are returned
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Build host and pipeline from configuration
    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        let host = ModelHost::load(config)?;
        Ok(Self::new(Arc::new(host)).with_top_k(config.top_k))
    }

    pub fn host(&self) -> &ModelHost {
        &self.host
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Classify raw image bytes
    pub fn predict(&self, bytes: &[u8]) -> Result<PredictionResult> {
        let start = Instant::now();

        let input = preprocess(bytes, &self.host.preprocess, &self.host.device)?;
        let scores = self.host.model.forward(&input)?;
        let probabilities = softmax_probabilities(&scores)?;

        if probabilities.len() != self.host.labels.len() {
            return Err(Error::inference(format!(
                "Model produced {} scores, expected {}",
                probabilities.len(),
                self.host.labels.len()
            )));
        }

        let predictions = rank_top_k(&probabilities, self.top_k)
            .into_iter()
            .map(|(index, probability)| {
                let label = self.host.labels.get(index).ok_or_else(|| {
                    Error::internal(format!("No label for class index {}", index))
                })?;
                Ok(Prediction::new(label, probability))
            })
            .collect::<Result<Vec<_>>>()?;

        let result = PredictionResult::new(predictions);

        if let Some(top) = result.top() {
            tracing::debug!(
                label = %top.label,
                probability = top.probability,
                latency_us = start.elapsed().as_micros() as u64,
                "Prediction complete"
            );
        }

        Ok(result)
    }
}

/// Convert raw scores for a single image into a probability distribution
///
/// Accepts `[num_classes]` or `[1, num_classes]`.
pub fn softmax_probabilities(scores: &Tensor) -> Result<Vec<f32>> {
    let scores = match scores.dims() {
        [_] => scores.clone(),
        [1, _] => scores
            .squeeze(0)
            .map_err(|e| Error::inference(format!("Squeeze failed: {}", e)))?,
        dims => {
            return Err(Error::inference(format!(
                "Expected scores for a single image, got shape {:?}",
                dims
            )))
        }
    };

    let probabilities: Vec<f32> = scores
        .to_dtype(DType::F32)
        .and_then(|t| candle_nn::ops::softmax(&t, D::Minus1))
        .and_then(|t| t.to_vec1())
        .map_err(|e| Error::inference(format!("Softmax failed: {}", e)))?;

    if probabilities.iter().any(|p| !p.is_finite()) {
        return Err(Error::inference("Model produced non-finite scores"));
    }

    Ok(probabilities)
}

/// Select the `k` highest probabilities, highest first
///
/// Ties keep ascending index order. Returns fewer than `k` entries when the
/// distribution is shorter than `k`.
pub fn rank_top_k(probabilities: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut indexed: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
    indexed.truncate(k);
    indexed
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    struct FixedScores {
        scores: Vec<f32>,
    }

    impl ScoringModel for FixedScores {
        fn forward(&self, _input: &Tensor) -> Result<Tensor> {
            Tensor::from_vec(self.scores.clone(), (1, self.scores.len()), &Device::Cpu)
                .map_err(|e| Error::inference(e.to_string()))
        }

        fn name(&self) -> &str {
            "fixed"
        }

        fn num_classes(&self) -> usize {
            self.scores.len()
        }
    }

    fn labels(n: usize) -> LabelTable {
        LabelTable::from_labels((0..n).map(|i| format!("class_{}", i)).collect()).unwrap()
    }

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 100, 50]));
        let mut buf = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_rank_top_k_orders_descending() {
        let ranked = rank_top_k(&[0.1, 0.4, 0.05, 0.3, 0.15], 3);
        assert_eq!(ranked, vec![(1, 0.4), (3, 0.3), (4, 0.15)]);
    }

    #[test]
    fn test_rank_top_k_ties_prefer_lower_index() {
        let ranked = rank_top_k(&[0.25, 0.25, 0.25, 0.25], 2);
        assert_eq!(ranked, vec![(0, 0.25), (1, 0.25)]);
    }

    #[test]
    fn test_rank_top_k_short_input() {
        assert_eq!(rank_top_k(&[0.7, 0.3], 5).len(), 2);
        assert!(rank_top_k(&[], 5).is_empty());
    }

    #[test]
    fn test_softmax_accepts_batched_scores() {
        let scores = Tensor::new(&[[1.0f32, 2.0, 3.0]], &Device::Cpu).unwrap();
        let probs = softmax_probabilities(&scores).unwrap();

        assert_eq!(probs.len(), 3);
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn test_softmax_rejects_multi_image_batch() {
        let scores = Tensor::zeros((2, 4), DType::F32, &Device::Cpu).unwrap();
        assert!(matches!(
            softmax_probabilities(&scores),
            Err(Error::Inference(_))
        ));
    }

    #[test]
    fn test_host_rejects_label_mismatch() {
        let model = Arc::new(FixedScores {
            scores: vec![0.0; 10],
        });
        let result = ModelHost::new(model, labels(9), PreprocessConfig::default(), Device::Cpu);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_predict_maps_labels() {
        let model = Arc::new(FixedScores {
            scores: vec![0.0, 5.0, 1.0, 3.0, 2.0, 4.0, -1.0],
        });
        let config = PreprocessConfig {
            image_size: 8,
            ..Default::default()
        };
        let host = ModelHost::new(model, labels(7), config, Device::Cpu).unwrap();
        let pipeline = PredictionPipeline::new(Arc::new(host));

        let result = pipeline.predict(&png_bytes()).unwrap();
        let labels: Vec<&str> = result.predictions.iter().map(|p| p.label.as_str()).collect();

        assert_eq!(
            labels,
            vec!["class_1", "class_5", "class_3", "class_4", "class_2"]
        );
    }

    #[test]
    fn test_predict_rejects_garbage() {
        let model = Arc::new(FixedScores {
            scores: vec![0.0; 5],
        });
        let host = ModelHost::new(model, labels(5), PreprocessConfig::default(), Device::Cpu)
            .unwrap();
        let pipeline = PredictionPipeline::new(Arc::new(host));

        let err = pipeline.predict(b"GIF89a but not really").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    proptest! {
        #[test]
        fn prop_rank_top_k_is_sorted_prefix(
            probs in prop::collection::vec(0.0f32..1.0, 0..64),
            k in 0usize..10,
        ) {
            let ranked = rank_top_k(&probs, k);

            prop_assert_eq!(ranked.len(), k.min(probs.len()));
            for pair in ranked.windows(2) {
                prop_assert!(pair[0].1 >= pair[1].1);
            }
            for (idx, p) in &ranked {
                prop_assert!(*idx < probs.len());
                prop_assert_eq!(probs[*idx], *p);
            }
            // Nothing left out beats the last selected entry
            if let Some((_, last)) = ranked.last() {
                let selected: Vec<usize> = ranked.iter().map(|(i, _)| *i).collect();
                for (i, p) in probs.iter().enumerate() {
                    if !selected.contains(&i) {
                        prop_assert!(p <= last);
                    }
                }
            }
        }

        #[test]
        fn prop_softmax_is_distribution(
            scores in prop::collection::vec(-20.0f32..20.0, 1..256),
        ) {
            let tensor = Tensor::new(scores.as_slice(), &Device::Cpu).unwrap();
            let probs = softmax_probabilities(&tensor).unwrap();

            prop_assert_eq!(probs.len(), scores.len());
            prop_assert!(probs.iter().all(|p| (0.0..=1.0).contains(p)));
            prop_assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-4);
        }
    }
}
