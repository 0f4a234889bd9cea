//! classifier-core — two-class photo classification pipeline.
//!
//! Provides image preprocessing, ONNX inference, result interpretation,
//! configuration and reporting used by the CLI front-end.

pub mod batch;
pub mod config;
pub mod error;
pub mod inference;
pub mod interpret;
pub mod labels;
pub mod pipeline;
pub mod preprocess;
pub mod report;

pub use config::{ClassifierConfig, load_config};
pub use error::{ClassifierError, Result};
pub use inference::{EngineOptions, InferenceEngine, ScoreModel, ScoreVector};
pub use interpret::{PredictionOutcome, interpret};
pub use labels::LabelSet;
pub use pipeline::{Classifier, PipelineStage};
pub use preprocess::{ImagePreprocessor, ImageSize, ImageTensor, PreparedImage, ResizeFilter};
