//! Model loading for Candle-based image classifiers

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{Func, VarBuilder};
use candle_transformers::models::resnet;
use hf_hub::{api::sync::Api, Repo, RepoType};
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;
use visionserve_core::{Error, Result};

use crate::classifier::ScoringModel;

/// Configuration for loading a Candle model
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Source of the model weights
    pub source: ModelSource,

    /// Network architecture the weights belong to
    pub architecture: Architecture,

    /// Device to run inference on
    pub device: DeviceType,

    /// Size of the classification head
    pub num_classes: usize,
}

/// Source location for model weights
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    /// Load from local file system
    LocalPath(PathBuf),

    /// Download from Hugging Face Hub
    HuggingFace {
        repo_id: String,
        revision: Option<String>,
        filename: String,
    },
}

/// Supported ResNet variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    ResNet18,
    ResNet34,
    ResNet50,
    ResNet101,
    ResNet152,
}

/// Device type for inference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    /// CPU inference (always available)
    Cpu,
    /// CUDA GPU inference (if available)
    Cuda(usize), // GPU index
    /// Metal (Apple Silicon)
    Metal(usize),
}

/// Default weights: torchvision's ImageNet ResNet-50 converted to safetensors
pub const DEFAULT_HF_REPO: &str = "lmz/candle-resnet";
pub const DEFAULT_HF_FILENAME: &str = "resnet50.safetensors";

/// Number of ImageNet-1k classes
pub const IMAGENET_CLASSES: usize = 1000;

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            source: ModelSource::HuggingFace {
                repo_id: DEFAULT_HF_REPO.to_string(),
                revision: None,
                filename: DEFAULT_HF_FILENAME.to_string(),
            },
            architecture: Architecture::ResNet50,
            device: DeviceType::Cpu,
            num_classes: IMAGENET_CLASSES,
        }
    }
}

impl ModelConfig {
    /// Create a new model configuration from local path
    pub fn from_local(path: impl Into<PathBuf>) -> Self {
        Self {
            source: ModelSource::LocalPath(path.into()),
            ..Default::default()
        }
    }

    /// Create a new model configuration from Hugging Face
    pub fn from_hf(repo_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            source: ModelSource::HuggingFace {
                repo_id: repo_id.into(),
                revision: None,
                filename: filename.into(),
            },
            ..Default::default()
        }
    }

    /// Set architecture
    pub fn with_architecture(mut self, architecture: Architecture) -> Self {
        self.architecture = architecture;
        self
    }

    /// Set device
    pub fn with_device(mut self, device: DeviceType) -> Self {
        self.device = device;
        self
    }

    /// Set number of output classes
    pub fn with_num_classes(mut self, num_classes: usize) -> Self {
        self.num_classes = num_classes;
        self
    }

    /// Set Hugging Face revision
    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        if let ModelSource::HuggingFace {
            repo_id, filename, ..
        } = self.source
        {
            self.source = ModelSource::HuggingFace {
                repo_id,
                revision: Some(revision.into()),
                filename,
            };
        }
        self
    }
}

impl Architecture {
    /// Canonical lowercase name, as used in config files
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResNet18 => "resnet18",
            Self::ResNet34 => "resnet34",
            Self::ResNet50 => "resnet50",
            Self::ResNet101 => "resnet101",
            Self::ResNet152 => "resnet152",
        }
    }

    /// Build the network graph over the given weights
    ///
    /// Candle's ResNet applies batch norm with running statistics, so the
    /// returned network is already in inference mode.
    fn build(
        &self,
        num_classes: usize,
        vb: VarBuilder<'static>,
    ) -> candle_core::Result<Func<'static>> {
        match self {
            Self::ResNet18 => resnet::resnet18(num_classes, vb),
            Self::ResNet34 => resnet::resnet34(num_classes, vb),
            Self::ResNet50 => resnet::resnet50(num_classes, vb),
            Self::ResNet101 => resnet::resnet101(num_classes, vb),
            Self::ResNet152 => resnet::resnet152(num_classes, vb),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Architecture {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "resnet18" => Ok(Self::ResNet18),
            "resnet34" => Ok(Self::ResNet34),
            "resnet50" => Ok(Self::ResNet50),
            "resnet101" => Ok(Self::ResNet101),
            "resnet152" => Ok(Self::ResNet152),
            other => Err(Error::config(format!("Unknown architecture: {}", other))),
        }
    }
}

impl DeviceType {
    /// Create Candle device from device type
    pub fn create_device(&self) -> Result<Device> {
        match *self {
            DeviceType::Cpu => Ok(Device::Cpu),
            DeviceType::Cuda(idx) => Device::new_cuda(idx)
                .map_err(|e| Error::model(format!("Failed to create CUDA device: {}", e))),
            DeviceType::Metal(idx) => Device::new_metal(idx)
                .map_err(|e| Error::model(format!("Failed to create Metal device: {}", e))),
        }
    }
}

/// Pre-trained ResNet loaded with Candle
///
/// Weights are memory-mapped once at load and never modified afterwards.
pub struct CandleModel {
    name: String,
    network: Func<'static>,
    device: Device,
    num_classes: usize,
}

impl CandleModel {
    /// Load a model from configuration
    pub fn load(config: ModelConfig) -> Result<Self> {
        let start = Instant::now();

        if config.num_classes == 0 {
            return Err(Error::config("num_classes must be positive"));
        }

        let weights_path = Self::resolve_model_path(&config)?;
        let device = config.device.create_device()?;

        tracing::info!(
            "Loading {} weights from {}",
            config.architecture,
            weights_path.display()
        );

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path.clone()], DType::F32, &device)
                .map_err(|e| Error::model(format!("Failed to load weights: {}", e)))?
        };

        let network = config
            .architecture
            .build(config.num_classes, vb)
            .map_err(|e| {
                Error::model(format!("Failed to build {}: {}", config.architecture, e))
            })?;

        let name = weights_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(config.architecture.as_str())
            .to_string();

        tracing::info!(
            "Loaded model '{}' ({} classes) in {:?}",
            name,
            config.num_classes,
            start.elapsed()
        );

        Ok(Self {
            name,
            network,
            device,
            num_classes: config.num_classes,
        })
    }

    /// Resolve model path from source
    fn resolve_model_path(config: &ModelConfig) -> Result<PathBuf> {
        match &config.source {
            ModelSource::LocalPath(path) => {
                if !path.exists() {
                    return Err(Error::model(format!(
                        "Model file not found: {}",
                        path.display()
                    )));
                }
                Ok(path.clone())
            }
            ModelSource::HuggingFace {
                repo_id,
                revision,
                filename,
            } => {
                let revision = revision.clone().unwrap_or_else(|| "main".to_string());
                tracing::info!(
                    "Fetching {} from Hugging Face: {} @ {}",
                    filename,
                    repo_id,
                    revision
                );

                let api = Api::new()
                    .map_err(|e| Error::model(format!("Failed to initialize HF API: {}", e)))?;

                let repo = api.repo(Repo::with_revision(
                    repo_id.clone(),
                    RepoType::Model,
                    revision,
                ));

                repo.get(filename).map_err(|e| {
                    Error::model(format!("Failed to download model from HF: {}", e))
                })
            }
        }
    }

    /// Get reference to the device
    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl ScoringModel for CandleModel {
    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        match input.dims() {
            [_, 3, _, _] => {}
            dims => {
                return Err(Error::inference(format!(
                    "Expected input shaped [batch, 3, height, width], got {:?}",
                    dims
                )))
            }
        }

        self.network
            .forward(input)
            .map_err(|e| Error::inference(format!("Model forward pass failed: {}", e)))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }
}
