//! Output formatting for prediction results.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::{ClassifierError, Result};
use crate::interpret::PredictionOutcome;
use crate::pipeline::PipelineStage;

/// Error side of a prediction attempt, in a form callers can display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub kind: &'static str,
    pub stage: PipelineStage,
    pub message: String,
}

impl From<&ClassifierError> for ErrorReport {
    fn from(err: &ClassifierError) -> Self {
        Self {
            kind: err.kind(),
            stage: err.stage(),
            message: err.to_string(),
        }
    }
}

/// One photo's result: an outcome or an error, never both.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionRecord {
    pub path: PathBuf,
    #[serde(flatten)]
    outcome: Option<PredictionOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorReport>,
}

impl PredictionRecord {
    pub fn new(path: PathBuf, result: Result<PredictionOutcome>) -> Self {
        match result {
            Ok(outcome) => Self {
                path,
                outcome: Some(outcome),
                error: None,
            },
            Err(e) => Self {
                path,
                outcome: None,
                error: Some(ErrorReport::from(&e)),
            },
        }
    }

    pub fn outcome(&self) -> Option<&PredictionOutcome> {
        self.outcome.as_ref()
    }

    pub fn error(&self) -> Option<&ErrorReport> {
        self.error.as_ref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {s}. Use 'text' or 'json'.")),
        }
    }
}

/// Number of photos assigned to each label.
pub fn label_counts(records: &[PredictionRecord]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for outcome in records.iter().filter_map(PredictionRecord::outcome) {
        *counts.entry(outcome.prediction.as_str()).or_insert(0) += 1;
    }
    counts
}

pub fn print_results(records: &[PredictionRecord], format: OutputFormat) {
    match format {
        OutputFormat::Text => print!("{}", render_text(records)),
        OutputFormat::Json => println!("{}", render_json(records)),
    }
}

pub fn render_text(records: &[PredictionRecord]) -> String {
    use std::fmt::Write;

    let errors: Vec<_> = records.iter().filter(|r| r.error.is_some()).collect();
    let mut out = String::new();

    let _ = writeln!(out, "\n{}", "=".repeat(70));
    let _ = writeln!(out, "PREDICTIONS");
    let _ = writeln!(out, "{}", "=".repeat(70));

    for r in records {
        let Some(o) = &r.outcome else { continue };
        let _ = writeln!(out, "\n{}", r.path.display());
        let _ = writeln!(out, "  prediction:  {} ({:.4})", o.prediction, o.confidence);
        for (label, score) in &o.probabilities {
            let _ = writeln!(out, "    {label:<20} {score:.4}");
        }
        let _ = writeln!(
            out,
            "  image:       {} -> {}",
            o.original_size, o.processed_size
        );
        let _ = writeln!(
            out,
            "  inference:   {:.1} ms",
            o.inference_time.as_secs_f64() * 1000.0
        );
    }

    if !errors.is_empty() {
        let _ = writeln!(out, "\nERRORS ({}):", errors.len());
        for r in &errors {
            if let Some(e) = &r.error {
                let _ = writeln!(out, "  [{}] {} -- {}", e.kind, r.path.display(), e.message);
            }
        }
    }

    let _ = writeln!(out, "\nSUMMARY:");
    let _ = writeln!(out, "  Total images:  {}", records.len());
    for (label, n) in label_counts(records) {
        let _ = writeln!(out, "  {:<14} {}", format!("{label}:"), n);
    }
    let _ = writeln!(out, "  Errors:        {}", errors.len());
    let _ = writeln!(out, "{}", "=".repeat(70));
    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    results: &'a [PredictionRecord],
    summary: Summary<'a>,
}

#[derive(Serialize)]
struct Summary<'a> {
    total: usize,
    labels: BTreeMap<&'a str, usize>,
    errors: usize,
}

/// Serialized straight from the records so label order inside each
/// `probabilities` object is preserved.
pub fn render_json(records: &[PredictionRecord]) -> String {
    let output = JsonReport {
        results: records,
        summary: Summary {
            total: records.len(),
            labels: label_counts(records),
            errors: records.iter().filter(|r| r.error.is_some()).count(),
        },
    };
    serde_json::to_string_pretty(&output).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::ImageSize;
    use std::time::Duration;

    fn outcome(prediction: &str, scores: [f32; 2]) -> PredictionOutcome {
        PredictionOutcome {
            prediction: prediction.to_string(),
            confidence: scores[0].max(scores[1]),
            probabilities: vec![
                ("diabetes".to_string(), scores[0]),
                ("nondiabetes".to_string(), scores[1]),
            ],
            inference_time: Duration::from_millis(5),
            original_size: ImageSize::new(800, 600),
            processed_size: ImageSize::model_input(),
        }
    }

    fn sample() -> Vec<PredictionRecord> {
        vec![
            PredictionRecord::new("a.png".into(), Ok(outcome("diabetes", [0.9, 0.1]))),
            PredictionRecord::new("b.jpg".into(), Ok(outcome("nondiabetes", [0.2, 0.8]))),
            PredictionRecord::new("c.jpg".into(), Ok(outcome("diabetes", [0.6, 0.4]))),
            PredictionRecord::new(
                "broken.png".into(),
                Err(ClassifierError::Decode("invalid PNG signature".into())),
            ),
        ]
    }

    #[test]
    fn record_holds_outcome_or_error() {
        let records = sample();
        assert!(records[0].outcome().is_some() && records[0].error().is_none());

        let err = records[3].error().unwrap();
        assert!(records[3].outcome().is_none());
        assert_eq!(err.kind, "decode");
        assert_eq!(err.stage, PipelineStage::Preprocessing);
    }

    #[test]
    fn counts_predictions_per_label() {
        let records = sample();
        let counts = label_counts(&records);
        assert_eq!(counts.get("diabetes"), Some(&2));
        assert_eq!(counts.get("nondiabetes"), Some(&1));
    }

    #[test]
    fn json_output_flattens_outcome() {
        let records = sample();
        let value: serde_json::Value = serde_json::from_str(&render_json(&records)).unwrap();

        let first = &value["results"][0];
        assert_eq!(first["path"], "a.png");
        assert_eq!(first["prediction"], "diabetes");
        assert!(first.get("error").is_none());

        let broken = &value["results"][3];
        assert!(broken.get("prediction").is_none());
        assert_eq!(broken["error"]["kind"], "decode");
        assert_eq!(broken["error"]["stage"], "preprocessing");

        assert_eq!(value["summary"]["total"], 4);
        assert_eq!(value["summary"]["errors"], 1);
        assert_eq!(value["summary"]["labels"]["diabetes"], 2);
    }

    #[test]
    fn text_output_lists_predictions_and_errors() {
        let text = render_text(&sample());
        assert!(text.contains("prediction:  diabetes (0.9000)"));
        assert!(text.contains("800x600 -> 224x224"));
        assert!(text.contains("ERRORS (1):"));
        assert!(text.contains("[decode] broken.png"));
        assert!(text.contains("Total images:  4"));
    }

    #[test]
    fn output_format_parses() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
