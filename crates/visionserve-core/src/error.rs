//! Error types for VisionServe

/// Result type alias using VisionServe's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for VisionServe operations
///
/// The `Display` output is what clients see in the `error` field of a failed
/// prediction, so every variant carries the underlying message.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input bytes could not be decoded as an image
    #[error("image decode error: {0}")]
    Decode(String),

    /// Resizing, normalization or tensor packing failed
    #[error("preprocessing error: {0}")]
    Preprocess(String),

    /// Forward pass or post-processing failed
    #[error("inference error: {0}")]
    Inference(String),

    /// Label table could not be loaded
    #[error("label table error: {0}")]
    Labels(String),

    /// Model weights could not be resolved or loaded
    #[error("model error: {0}")]
    Model(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Network/IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new preprocessing error
    pub fn preprocess(msg: impl Into<String>) -> Self {
        Self::Preprocess(msg.into())
    }

    /// Create a new inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new label table error
    pub fn labels(msg: impl Into<String>) -> Self {
        Self::Labels(msg.into())
    }

    /// Create a new model loading error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_keeps_message() {
        let err = Error::decode("format could not be determined");
        assert_eq!(
            err.to_string(),
            "image decode error: format could not be determined"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "weights.safetensors");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("weights.safetensors"));
    }

    #[test]
    fn test_yaml_errors_become_config_errors() {
        let yaml_err = serde_yaml::from_str::<u32>("not: a number").unwrap_err();
        let err: Error = yaml_err.into();
        assert!(matches!(err, Error::Config(_)));
    }
}
