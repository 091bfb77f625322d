//! Image preprocessing
//!
//! Turns uploaded bytes into the normalized `[1, 3, S, S]` tensor a
//! ResNet-style network expects.

use candle_core::{DType, Device, Tensor};
use image::imageops::FilterType;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use visionserve_core::{Error, Result};

/// ImageNet normalization mean values (RGB)
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet normalization std values (RGB)
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Fixed transform applied to every input image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Side length of the square model input
    #[serde(default = "default_image_size")]
    pub image_size: u32,

    /// Per-channel mean subtracted after scaling to [0, 1]
    #[serde(default = "default_mean")]
    pub mean: [f32; 3],

    /// Per-channel standard deviation divided after mean subtraction
    #[serde(default = "default_std")]
    pub std: [f32; 3],
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            image_size: default_image_size(),
            mean: default_mean(),
            std: default_std(),
        }
    }
}

impl PreprocessConfig {
    /// Check that the transform is well-defined
    pub fn validate(&self) -> Result<()> {
        if self.image_size == 0 {
            return Err(Error::config("preprocessing.image_size must be positive"));
        }
        if self.std.iter().any(|s| *s == 0.0 || !s.is_finite()) {
            return Err(Error::config(
                "preprocessing.std values must be finite and non-zero",
            ));
        }
        Ok(())
    }
}

fn default_image_size() -> u32 {
    224
}

fn default_mean() -> [f32; 3] {
    IMAGENET_MEAN
}

fn default_std() -> [f32; 3] {
    IMAGENET_STD
}

/// Decode raw bytes into an image, guessing the format from its contents
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(Error::decode("uploaded file is empty"));
    }
    image::load_from_memory(bytes).map_err(|e| Error::decode(e.to_string()))
}

/// Convert a decoded image into a normalized single-item batch
///
/// Output layout is CHW with a leading batch dimension: `[1, 3, S, S]`.
pub fn image_to_tensor(
    image: &DynamicImage,
    config: &PreprocessConfig,
    device: &Device,
) -> Result<Tensor> {
    let size = config.image_size;
    let rgb = image.to_rgb8();
    let resized = image::imageops::resize(&rgb, size, size, FilterType::Triangle);

    let side = size as usize;
    let pixels = Tensor::from_vec(resized.into_raw(), (side, side, 3), device)
        .map_err(tensor_err)?;

    let mean = Tensor::new(&config.mean, device)
        .and_then(|t| t.reshape((3, 1, 1)))
        .map_err(tensor_err)?;
    let std = Tensor::new(&config.std, device)
        .and_then(|t| t.reshape((3, 1, 1)))
        .map_err(tensor_err)?;

    pixels
        .permute((2, 0, 1))
        .and_then(|t| t.to_dtype(DType::F32))
        .and_then(|t| t.affine(1.0 / 255.0, 0.0))
        .and_then(|t| t.broadcast_sub(&mean))
        .and_then(|t| t.broadcast_div(&std))
        .and_then(|t| t.unsqueeze(0))
        .map_err(tensor_err)
}

/// Decode and transform in one step
pub fn preprocess(bytes: &[u8], config: &PreprocessConfig, device: &Device) -> Result<Tensor> {
    let image = decode_image(bytes)?;
    tracing::trace!(
        width = image.width(),
        height = image.height(),
        "Decoded input image"
    );
    image_to_tensor(&image, config, device)
}

fn tensor_err(e: candle_core::Error) -> Error {
    Error::preprocess(e.to_string())
}
