//! Server configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use visionserve_classifiers::{Architecture, ArchitectureSpec, ClassifierConfig, ModelSourceSpec};

use crate::cli::Cli;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted request body, in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Model, labels and preprocessing
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl ServerConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(config_path: &str, cli: &Cli) -> anyhow::Result<Self> {
        // Try to load from file, or use defaults
        let mut config = if Path::new(config_path).exists() {
            let content = std::fs::read_to_string(config_path)?;
            serde_yaml::from_str(&content)?
        } else {
            tracing::debug!("No config file at {}, using defaults", config_path);
            Self::default()
        };

        // Apply CLI overrides
        if let Some(weights) = &cli.weights {
            config.classifier.model.source = ModelSourceSpec::Local {
                path: weights.clone(),
            };
        }

        if let Some(labels) = &cli.labels {
            config.classifier.labels_path = labels.clone();
        }

        if let Some(architecture) = &cli.architecture {
            let architecture: Architecture = architecture.parse()?;
            config.classifier.model.architecture = ArchitectureSpec::from(architecture);
        }

        if let Some(listen) = &cli.listen {
            config.listen = listen.clone();
        }

        if let Some(port) = cli.port {
            config.port = port;
        }

        config.classifier.validate()?;
        Ok(config)
    }

    /// Socket address string for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listen, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            classifier: ClassifierConfig::default(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use std::path::PathBuf;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["visionserve"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = ServerConfig::load("/nonexistent/visionserve.yaml", &cli(&[])).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8000");
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.classifier.top_k, 5);
    }

    #[test]
    fn test_file_values_survive_without_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
listen: 127.0.0.1
port: 9100
max_upload_bytes: 1048576
classifier:
  labels_path: /srv/labels.txt
  model:
    source:
      path: /srv/resnet34.safetensors
    architecture: resnet34
"#
        )
        .unwrap();

        let config = ServerConfig::load(file.path().to_str().unwrap(), &cli(&[])).unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:9100");
        assert_eq!(config.max_upload_bytes, 1_048_576);
        assert_eq!(config.classifier.labels_path, PathBuf::from("/srv/labels.txt"));
        assert_eq!(config.classifier.model.architecture, ArchitectureSpec::Resnet34);
    }

    #[test]
    fn test_cli_overrides() {
        let args = cli(&[
            "--weights",
            "./weights/resnet18.safetensors",
            "--labels",
            "./labels.txt",
            "--architecture",
            "resnet18",
            "-l",
            "127.0.0.1",
            "-P",
            "3000",
        ]);
        let config = ServerConfig::load("/nonexistent/visionserve.yaml", &args).unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:3000");
        assert_eq!(
            config.classifier.model.source,
            ModelSourceSpec::Local {
                path: PathBuf::from("./weights/resnet18.safetensors")
            }
        );
        assert_eq!(config.classifier.labels_path, PathBuf::from("./labels.txt"));
        assert_eq!(config.classifier.model.architecture, ArchitectureSpec::Resnet18);
    }

    #[test]
    fn test_unknown_architecture_rejected() {
        let args = cli(&["--architecture", "alexnet"]);
        assert!(ServerConfig::load("/nonexistent/visionserve.yaml", &args).is_err());
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "port: not-a-port").unwrap();

        assert!(ServerConfig::load(file.path().to_str().unwrap(), &cli(&[])).is_err());
    }
}
