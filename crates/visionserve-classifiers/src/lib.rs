//! VisionServe Classifiers
//!
//! Image classification on top of Candle.
//!
//! A request flows through a fixed pipeline:
//! decode → RGB → resize → normalize → forward pass → softmax → top-k → labels.
//!
//! The loaded model and label table live in a [`ModelHost`], built once at
//! startup and shared read-only between requests.

pub mod classifier;
pub mod config;
pub mod labels;
pub mod model_loader;
pub mod pipeline;
pub mod preprocess;

pub use classifier::ScoringModel;
pub use config::{ArchitectureSpec, ClassifierConfig, DeviceSpec, ModelSourceSpec, ModelSpec};
pub use labels::LabelTable;
pub use model_loader::{Architecture, CandleModel, DeviceType, ModelConfig, ModelSource};
pub use pipeline::{rank_top_k, softmax_probabilities, ModelHost, PredictionPipeline};
pub use preprocess::{decode_image, image_to_tensor, preprocess, PreprocessConfig};
