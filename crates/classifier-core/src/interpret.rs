//! Turns raw model scores into a labelled prediction.

use std::time::Duration;

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::error::{ClassifierError, Result};
use crate::inference::ScoreVector;
use crate::labels::LabelSet;
use crate::preprocess::ImageSize;

/// A fully populated prediction for one photo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionOutcome {
    pub prediction: String,
    pub confidence: f32,
    /// Label → score, in label-set order.
    #[serde(serialize_with = "ordered_map")]
    pub probabilities: Vec<(String, f32)>,
    #[serde(rename = "inference_ms", serialize_with = "duration_ms")]
    pub inference_time: Duration,
    pub original_size: ImageSize,
    pub processed_size: ImageSize,
}

impl PredictionOutcome {
    pub fn probability(&self, label: &str) -> Option<f32> {
        self.probabilities
            .iter()
            .find(|(l, _)| l == label)
            .map(|&(_, score)| score)
    }
}

/// Index of the largest score. Only a strictly greater score replaces the
/// current best, so ties go to the lowest index.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &s) in scores.iter().enumerate() {
        if s.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, b)| s > b) {
            best = Some((i, s));
        }
    }
    best.map(|(i, _)| i)
}

pub fn interpret(
    scores: &ScoreVector,
    labels: &LabelSet,
    original_size: ImageSize,
    processed_size: ImageSize,
    elapsed: Duration,
) -> Result<PredictionOutcome> {
    if scores.len() != labels.len() {
        return Err(ClassifierError::LabelMismatch {
            labels: labels.len(),
            scores: scores.len(),
        });
    }

    let values = scores.as_slice();
    let idx = argmax(values)
        .ok_or_else(|| ClassifierError::Inference(format!("no usable score in {values:?}")))?;

    let probabilities = labels
        .iter()
        .zip(values)
        .map(|(label, &score)| (label.to_string(), score))
        .collect();

    Ok(PredictionOutcome {
        prediction: labels.get(idx).unwrap_or_default().to_string(),
        confidence: values[idx],
        probabilities,
        inference_time: elapsed,
        original_size,
        processed_size,
    })
}

fn ordered_map<S: Serializer>(
    pairs: &[(String, f32)],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(pairs.len()))?;
    for (label, score) in pairs {
        map.serialize_entry(label, score)?;
    }
    map.end()
}

fn duration_ms<S: Serializer>(
    d: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(d.as_secs_f64() * 1000.0)
}
