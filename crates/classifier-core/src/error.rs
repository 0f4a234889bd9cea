//! Error types shared by every pipeline stage.

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::PipelineStage;

pub type Result<T> = std::result::Result<T, ClassifierError>;

#[derive(Debug, Error)]
pub enum ClassifierError {
    /// A label or model resource is missing or unusable. Blocks all predictions.
    #[error("failed to load {resource} from {}: {message}", .path.display())]
    ResourceLoad {
        resource: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("cannot decode image: {0}")]
    Decode(String),

    #[error("tensor shape {actual:?} does not match model input {expected:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("model produced {scores} scores for {labels} labels")]
    LabelMismatch { labels: usize, scores: usize },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClassifierError {
    pub(crate) fn model_load(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::ResourceLoad {
            resource: "model",
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn inference(err: impl std::fmt::Display) -> Self {
        Self::Inference(err.to_string())
    }

    /// Stable identifier used in machine-readable reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ResourceLoad { .. } => "resource_load",
            Self::Decode(_) => "decode",
            Self::ShapeMismatch { .. } => "shape_mismatch",
            Self::LabelMismatch { .. } => "label_mismatch",
            Self::Inference(_) => "inference",
            Self::Config(_) => "config",
        }
    }

    /// The pipeline stage a request was in when this error aborted it.
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::ResourceLoad { .. } | Self::Config(_) => PipelineStage::Idle,
            Self::Decode(_) => PipelineStage::Preprocessing,
            Self::ShapeMismatch { .. } | Self::Inference(_) => PipelineStage::Inferring,
            Self::LabelMismatch { .. } => PipelineStage::Interpreting,
        }
    }

    /// Readiness failures prevent any further prediction; everything else is
    /// scoped to a single request.
    pub fn is_readiness_failure(&self) -> bool {
        matches!(self, Self::ResourceLoad { .. } | Self::Config(_))
    }
}
