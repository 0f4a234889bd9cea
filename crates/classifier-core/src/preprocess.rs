//! Image preprocessing - produces the exact tensor layout the classifier was exported with.
//!
//! Each photo → fixed tensor of shape (224, 224, 3):
//! - Decode the compressed bytes (PNG, JPEG, BMP, WebP)
//! - Resize to 224x224 ignoring aspect ratio (no crop, no letterbox)
//! - Emit pixels row-major, channels innermost in [R, G, B] order
//! - Keep raw 0-255 intensities as f32: the model was trained without
//!   rescaling or mean/std normalization, so none is applied here

use std::str::FromStr;

use image::imageops::{self, FilterType};
use ndarray::{Array3, ArrayView3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClassifierError, Result};

pub const INPUT_WIDTH: u32 = 224;
pub const INPUT_HEIGHT: u32 = 224;
pub const CHANNELS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The size every photo is resampled to.
    pub const fn model_input() -> Self {
        Self::new(INPUT_WIDTH, INPUT_HEIGHT)
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Resampling filter used for the resize step. All of them are deterministic;
/// `Triangle` (bilinear) is the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    #[default]
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl FromStr for ResizeFilter {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "nearest" => Ok(ResizeFilter::Nearest),
            "triangle" | "bilinear" => Ok(ResizeFilter::Triangle),
            "catmull_rom" | "bicubic" => Ok(ResizeFilter::CatmullRom),
            "gaussian" => Ok(ResizeFilter::Gaussian),
            "lanczos3" => Ok(ResizeFilter::Lanczos3),
            _ => Err(format!(
                "Unknown filter: {s}. Use nearest, triangle, catmull_rom, gaussian or lanczos3."
            )),
        }
    }
}

/// Dense (height, width, channel) pixel tensor with values in [0, 255].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor(Array3<f32>);

impl ImageTensor {
    pub fn from_array(array: Array3<f32>) -> Self {
        Self(array)
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.0.view()
    }

    pub fn into_inner(self) -> Array3<f32> {
        self.0
    }
}

/// Output of [`ImagePreprocessor::prepare`]: the tensor plus the sizes needed
/// for diagnostics.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub tensor: ImageTensor,
    pub original_size: ImageSize,
    pub processed_size: ImageSize,
}

#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    target: ImageSize,
    filter: ResizeFilter,
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new(ResizeFilter::default())
    }
}

impl ImagePreprocessor {
    pub fn new(filter: ResizeFilter) -> Self {
        Self {
            target: ImageSize::model_input(),
            filter,
        }
    }

    /// Override the output size. Anything other than 224x224 will be rejected
    /// by the stock model with a shape mismatch.
    pub fn with_target(mut self, target: ImageSize) -> Self {
        self.target = target;
        self
    }

    pub fn target(&self) -> ImageSize {
        self.target
    }

    pub fn filter(&self) -> ResizeFilter {
        self.filter
    }

    /// Decode, resize and flatten one photo.
    pub fn prepare(&self, bytes: &[u8]) -> Result<PreparedImage> {
        if bytes.is_empty() {
            return Err(ClassifierError::Decode("empty image buffer".into()));
        }

        let img =
            image::load_from_memory(bytes).map_err(|e| ClassifierError::Decode(e.to_string()))?;
        let original_size = ImageSize::new(img.width(), img.height());
        if original_size.width == 0 || original_size.height == 0 {
            return Err(ClassifierError::Decode(format!(
                "image has no pixels ({original_size})"
            )));
        }

        let rgb = img.to_rgb8();
        let resized = imageops::resize(
            &rgb,
            self.target.width,
            self.target.height,
            self.filter.into(),
        );

        let (w, h) = (self.target.width as usize, self.target.height as usize);
        let tensor = Array3::<f32>::from_shape_fn((h, w, CHANNELS), |(y, x, c)| {
            resized.get_pixel(x as u32, y as u32)[c] as f32
        });

        debug!(
            original = %original_size,
            processed = %self.target,
            filter = ?self.filter,
            "image prepared"
        );

        Ok(PreparedImage {
            tensor: ImageTensor(tensor),
            original_size,
            processed_size: self.target,
        })
    }
}
