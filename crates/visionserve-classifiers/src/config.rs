//! Configuration for the classifier and model loading

use crate::model_loader::{
    Architecture, DeviceType, ModelConfig, ModelSource, DEFAULT_HF_FILENAME, DEFAULT_HF_REPO,
    IMAGENET_CLASSES,
};
use crate::preprocess::PreprocessConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use visionserve_core::{Error, Result};

/// Configuration for the prediction pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Model weights and architecture
    #[serde(default)]
    pub model: ModelSpec,

    /// Label file, one class name per line
    #[serde(default = "default_labels_path")]
    pub labels_path: PathBuf,

    /// Image transform applied before inference
    #[serde(default)]
    pub preprocessing: PreprocessConfig,

    /// Number of ranked classes returned per prediction
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

/// Model specification (for YAML/config files)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSpec {
    /// Where the weights come from
    #[serde(default)]
    pub source: ModelSourceSpec,

    #[serde(default)]
    pub architecture: ArchitectureSpec,

    #[serde(default)]
    pub device: DeviceSpec,

    /// Size of the classification head; must match the label table
    #[serde(default = "default_num_classes")]
    pub num_classes: usize,
}

/// Model source specification (for config files)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelSourceSpec {
    /// Local safetensors file
    Local { path: PathBuf },

    /// Hugging Face Hub
    HuggingFace {
        repo_id: String,
        filename: String,
        revision: Option<String>,
    },
}

/// Architecture specification (for config files)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArchitectureSpec {
    Resnet18,
    Resnet34,
    #[default]
    Resnet50,
    Resnet101,
    Resnet152,
}

/// Device specification (for config files)
///
/// Written either as a bare name (`cpu`, `cuda`, `metal`) or as a map
/// selecting an accelerator by index (`cuda: { index: 1 }`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(try_from = "DeviceRepr", into = "DeviceRepr")]
pub enum DeviceSpec {
    #[default]
    Cpu,
    Cuda { index: Option<usize> },
    Metal { index: Option<usize> },
}

/// On-disk shape of [`DeviceSpec`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum DeviceRepr {
    Name(String),
    Cuda { cuda: DeviceIndex },
    Metal { metal: DeviceIndex },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DeviceIndex {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    index: Option<usize>,
}

impl TryFrom<DeviceRepr> for DeviceSpec {
    type Error = String;

    fn try_from(repr: DeviceRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            DeviceRepr::Name(name) => match name.to_ascii_lowercase().as_str() {
                "cpu" => Ok(Self::Cpu),
                "cuda" => Ok(Self::Cuda { index: None }),
                "metal" => Ok(Self::Metal { index: None }),
                other => Err(format!(
                    "unknown device '{}', expected cpu, cuda or metal",
                    other
                )),
            },
            DeviceRepr::Cuda { cuda } => Ok(Self::Cuda { index: cuda.index }),
            DeviceRepr::Metal { metal } => Ok(Self::Metal { index: metal.index }),
        }
    }
}

impl From<DeviceSpec> for DeviceRepr {
    fn from(spec: DeviceSpec) -> Self {
        match spec {
            DeviceSpec::Cpu => Self::Name("cpu".to_string()),
            DeviceSpec::Cuda { index } => Self::Cuda {
                cuda: DeviceIndex { index },
            },
            DeviceSpec::Metal { index } => Self::Metal {
                metal: DeviceIndex { index },
            },
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model: ModelSpec::default(),
            labels_path: default_labels_path(),
            preprocessing: PreprocessConfig::default(),
            top_k: default_top_k(),
        }
    }
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            source: ModelSourceSpec::default(),
            architecture: ArchitectureSpec::default(),
            device: DeviceSpec::default(),
            num_classes: default_num_classes(),
        }
    }
}

impl Default for ModelSourceSpec {
    fn default() -> Self {
        Self::HuggingFace {
            repo_id: DEFAULT_HF_REPO.to_string(),
            filename: DEFAULT_HF_FILENAME.to_string(),
            revision: None,
        }
    }
}

impl ClassifierConfig {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::config("top_k must be positive"));
        }
        if self.model.num_classes == 0 {
            return Err(Error::config("model.num_classes must be positive"));
        }
        self.preprocessing.validate()
    }

    /// Convert to ModelConfig for loading
    pub fn to_model_config(&self) -> ModelConfig {
        let source = match &self.model.source {
            ModelSourceSpec::Local { path } => ModelSource::LocalPath(path.clone()),
            ModelSourceSpec::HuggingFace {
                repo_id,
                filename,
                revision,
            } => ModelSource::HuggingFace {
                repo_id: repo_id.clone(),
                revision: revision.clone(),
                filename: filename.clone(),
            },
        };

        ModelConfig {
            source,
            architecture: self.model.architecture.to_architecture(),
            device: self.model.device.to_device_type(),
            num_classes: self.model.num_classes,
        }
    }
}

impl ArchitectureSpec {
    /// Convert to runtime architecture
    pub fn to_architecture(&self) -> Architecture {
        match self {
            Self::Resnet18 => Architecture::ResNet18,
            Self::Resnet34 => Architecture::ResNet34,
            Self::Resnet50 => Architecture::ResNet50,
            Self::Resnet101 => Architecture::ResNet101,
            Self::Resnet152 => Architecture::ResNet152,
        }
    }
}

impl From<Architecture> for ArchitectureSpec {
    fn from(arch: Architecture) -> Self {
        match arch {
            Architecture::ResNet18 => Self::Resnet18,
            Architecture::ResNet34 => Self::Resnet34,
            Architecture::ResNet50 => Self::Resnet50,
            Architecture::ResNet101 => Self::Resnet101,
            Architecture::ResNet152 => Self::Resnet152,
        }
    }
}

impl DeviceSpec {
    /// Convert to DeviceType
    pub fn to_device_type(&self) -> DeviceType {
        match self {
            DeviceSpec::Cpu => DeviceType::Cpu,
            DeviceSpec::Cuda { index } => DeviceType::Cuda(index.unwrap_or(0)),
            DeviceSpec::Metal { index } => DeviceType::Metal(index.unwrap_or(0)),
        }
    }
}

fn default_labels_path() -> PathBuf {
    PathBuf::from("data/imagenet_classes.txt")
}

fn default_top_k() -> usize {
    5
}

fn default_num_classes() -> usize {
    IMAGENET_CLASSES
}
