//! Single-request prediction pipeline: preprocess → infer → interpret.
//!
//! Blocking. Callers with a UI or an async runtime should run `predict` on a
//! worker thread. Stages never overlap and a failed stage aborts the request.

use std::fs;
use std::path::Path;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::ClassifierConfig;
use crate::error::{ClassifierError, Result};
use crate::inference::{InferenceEngine, ScoreModel};
use crate::interpret::{PredictionOutcome, interpret};
use crate::labels::LabelSet;
use crate::preprocess::ImagePreprocessor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Preprocessing,
    Inferring,
    Interpreting,
    Completed,
    Failed,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Preprocessing => "preprocessing",
            Self::Inferring => "inferring",
            Self::Interpreting => "interpreting",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A ready-to-use classifier: labels, preprocessor and a loaded model.
///
/// Construction validates that the labels line up with the model, so a
/// `Classifier` that exists is ready to predict.
#[derive(Debug)]
pub struct Classifier<M = InferenceEngine> {
    labels: LabelSet,
    preprocessor: ImagePreprocessor,
    model: M,
}

impl Classifier<InferenceEngine> {
    /// Load labels and model as described by `config`.
    pub fn from_config(config: &ClassifierConfig) -> Result<Self> {
        config.validate()?;

        let labels = match &config.labels_path {
            Some(path) => LabelSet::from_path(path),
            None => LabelSet::fallback(),
        };
        let engine = InferenceEngine::load(&config.model_path, config.engine_options())?;

        Self::new(labels, ImagePreprocessor::new(config.resize_filter), engine)
    }

    /// Reload the model from disk and re-check it against the labels.
    pub fn reload(&mut self) -> Result<()> {
        self.model.reload()?;
        self.labels.validate(self.model.output_len())
    }
}

impl<M: ScoreModel> Classifier<M> {
    pub fn new(labels: LabelSet, preprocessor: ImagePreprocessor, model: M) -> Result<Self> {
        labels.validate(model.output_len())?;
        info!(labels = ?labels.iter().collect::<Vec<_>>(), "classifier ready");
        Ok(Self {
            labels,
            preprocessor,
            model,
        })
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn preprocessor(&self) -> &ImagePreprocessor {
        &self.preprocessor
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Release the model. Dropping the classifier does the same.
    pub fn into_model(self) -> M {
        self.model
    }

    /// Classify one encoded photo.
    pub fn predict(&mut self, bytes: &[u8]) -> Result<PredictionOutcome> {
        self.predict_with(bytes, |_| {})
    }

    /// Read a photo from disk and classify it. An unreadable file is reported
    /// as a decode failure of that request.
    pub fn predict_file(&mut self, path: &Path) -> Result<PredictionOutcome> {
        let bytes = fs::read(path)
            .map_err(|e| ClassifierError::Decode(format!("cannot read {}: {e}", path.display())))?;
        self.predict(&bytes)
    }

    /// Like [`predict`](Self::predict), reporting every stage transition to
    /// `on_stage`. The last stage reported is `Completed` or `Failed`.
    pub fn predict_with(
        &mut self,
        bytes: &[u8],
        mut on_stage: impl FnMut(PipelineStage),
    ) -> Result<PredictionOutcome> {
        let result = self.run_stages(bytes, &mut on_stage);
        match &result {
            Ok(outcome) => {
                debug!(
                    prediction = %outcome.prediction,
                    confidence = outcome.confidence,
                    "prediction completed"
                );
                on_stage(PipelineStage::Completed);
            }
            Err(e) => {
                debug!(stage = %e.stage(), error = %e, "prediction failed");
                on_stage(PipelineStage::Failed);
            }
        }
        result
    }

    fn run_stages(
        &mut self,
        bytes: &[u8],
        on_stage: &mut impl FnMut(PipelineStage),
    ) -> Result<PredictionOutcome> {
        on_stage(PipelineStage::Preprocessing);
        let prepared = self.preprocessor.prepare(bytes)?;

        on_stage(PipelineStage::Inferring);
        let start = Instant::now();
        let scores = self.model.classify(&prepared.tensor)?;
        let elapsed = start.elapsed();

        on_stage(PipelineStage::Interpreting);
        interpret(
            &scores,
            &self.labels,
            prepared.original_size,
            prepared.processed_size,
            elapsed,
        )
    }
}
