//! ONNX model loading and inference via the `ort` crate.

use std::path::{Path, PathBuf};

use ndarray::Axis;
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::{TensorRef, ValueType};
use tracing::{debug, info};

use crate::error::{ClassifierError, Result};
use crate::preprocess::{CHANNELS, INPUT_HEIGHT, INPUT_WIDTH, ImageTensor};

/// Input shape assumed for any dimension the model leaves dynamic.
pub const DEFAULT_INPUT_SHAPE: [usize; 4] =
    [1, INPUT_HEIGHT as usize, INPUT_WIDTH as usize, CHANNELS];

/// Raw model output, one score per label, used exactly as emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreVector(Vec<f32>);

impl ScoreVector {
    pub fn new(scores: Vec<f32>) -> Self {
        Self(scores)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f32>> for ScoreVector {
    fn from(scores: Vec<f32>) -> Self {
        Self(scores)
    }
}

/// Anything that turns a prepared tensor into a score vector.
///
/// Implementations own their runtime state exclusively: `classify` takes
/// `&mut self`, so one instance never serves two requests at once. Callers
/// that want parallelism load one instance per worker.
pub trait ScoreModel {
    /// Full input shape including the batch dimension.
    fn input_shape(&self) -> &[usize];

    /// Number of scores per prediction, if the model declares it.
    fn output_len(&self) -> Option<usize>;

    fn classify(&mut self, tensor: &ImageTensor) -> Result<ScoreVector>;
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub intra_threads: usize,
    /// Input tensor name; the model's first input when `None`.
    pub input_name: Option<String>,
    /// Output tensor name; the model's first output when `None`.
    pub output_name: Option<String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            intra_threads: 4,
            input_name: None,
            output_name: None,
        }
    }
}

pub struct InferenceEngine {
    session: Session,
    model_path: PathBuf,
    options: EngineOptions,
    input_name: String,
    output_name: String,
    input_shape: Vec<usize>,
    output_len: Option<usize>,
}

impl std::fmt::Debug for InferenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceEngine")
            .field("model_path", &self.model_path)
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("input_shape", &self.input_shape)
            .field("output_len", &self.output_len)
            .finish()
    }
}

/// Tensor names and shapes read from a committed session.
struct ModelSignature {
    input_name: String,
    output_name: String,
    input_shape: Vec<usize>,
    output_len: Option<usize>,
}

impl InferenceEngine {
    /// Load an ONNX model from the given path.
    pub fn load(model_path: &Path, options: EngineOptions) -> Result<Self> {
        let session = open_session(model_path, options.intra_threads)?;
        let signature = read_signature(&session, &options)
            .map_err(|msg| ClassifierError::model_load(model_path, msg))?;

        info!(
            path = %model_path.display(),
            input = %signature.input_name,
            shape = ?signature.input_shape,
            output = %signature.output_name,
            classes = ?signature.output_len,
            "model loaded"
        );

        Ok(Self {
            session,
            model_path: model_path.to_path_buf(),
            options,
            input_name: signature.input_name,
            output_name: signature.output_name,
            input_shape: signature.input_shape,
            output_len: signature.output_len,
        })
    }

    /// Re-read the model from disk, replacing the current session. On failure
    /// the previous session stays in place.
    pub fn reload(&mut self) -> Result<()> {
        let session = open_session(&self.model_path, self.options.intra_threads)?;
        let signature = read_signature(&session, &self.options)
            .map_err(|msg| ClassifierError::model_load(&self.model_path, msg))?;

        self.session = session;
        self.input_name = signature.input_name;
        self.output_name = signature.output_name;
        self.input_shape = signature.input_shape;
        self.output_len = signature.output_len;
        info!(path = %self.model_path.display(), "model reloaded");
        Ok(())
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn output_name(&self) -> &str {
        &self.output_name
    }
}

impl ScoreModel for InferenceEngine {
    fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    fn output_len(&self) -> Option<usize> {
        self.output_len
    }

    /// Run inference on a single image tensor.
    /// Input shape: (224, 224, 3) -> reshaped to (1, 224, 224, 3) for batch dim.
    fn classify(&mut self, tensor: &ImageTensor) -> Result<ScoreVector> {
        let batched = tensor.view().insert_axis(Axis(0));
        check_input_shape(&self.input_shape, batched.shape())?;

        let input_tensor =
            TensorRef::from_array_view(batched).map_err(ClassifierError::inference)?;
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(ClassifierError::inference)?;

        let output_array = outputs[self.output_name.as_str()]
            .try_extract_array::<f32>()
            .map_err(ClassifierError::inference)?;

        if output_array.ndim() > 1 && output_array.shape()[0] != 1 {
            return Err(ClassifierError::Inference(format!(
                "expected a single output row, got shape {:?}",
                output_array.shape()
            )));
        }
        let scores: Vec<f32> = output_array.iter().copied().collect();
        debug!(scores = ?scores, "model output");

        Ok(ScoreVector(scores))
    }
}

fn open_session(model_path: &Path, intra_threads: usize) -> Result<Session> {
    if !model_path.is_file() {
        return Err(ClassifierError::model_load(model_path, "model file not found"));
    }

    let session = Session::builder()
        .map_err(|e| ClassifierError::model_load(model_path, e))?
        .with_intra_threads(intra_threads)
        .map_err(|e| ClassifierError::model_load(model_path, e))?
        .commit_from_file(model_path)
        .map_err(|e| ClassifierError::model_load(model_path, e))?;
    Ok(session)
}

fn read_signature(
    session: &Session,
    options: &EngineOptions,
) -> std::result::Result<ModelSignature, String> {
    let input = match &options.input_name {
        Some(name) => session.inputs.iter().find(|i| &i.name == name),
        None => session.inputs.first(),
    }
    .ok_or_else(|| "model has no matching input".to_string())?;

    let output = match &options.output_name {
        Some(name) => session.outputs.iter().find(|o| &o.name == name),
        None => session.outputs.first(),
    }
    .ok_or_else(|| "model has no matching output".to_string())?;

    let input_shape = match &input.input_type {
        ValueType::Tensor { ty, shape, .. } => {
            if *ty != TensorElementType::Float32 {
                return Err(format!("input '{}' is {ty:?}, expected Float32", input.name));
            }
            let dims: Vec<i64> = shape.iter().copied().collect();
            resolve_input_shape(&dims)?
        }
        other => return Err(format!("input '{}' is not a tensor: {other:?}", input.name)),
    };

    let output_len = match &output.output_type {
        ValueType::Tensor { shape, .. } => shape
            .iter()
            .copied()
            .last()
            .filter(|&d| d > 0)
            .map(|d| d as usize),
        other => return Err(format!("output '{}' is not a tensor: {other:?}", output.name)),
    };

    Ok(ModelSignature {
        input_name: input.name.clone(),
        output_name: output.name.clone(),
        input_shape,
        output_len,
    })
}

/// Turn declared model dims into a concrete shape. Dynamic dims (<= 0) take
/// their value from [`DEFAULT_INPUT_SHAPE`].
fn resolve_input_shape(dims: &[i64]) -> std::result::Result<Vec<usize>, String> {
    if dims.len() != DEFAULT_INPUT_SHAPE.len() {
        return Err(format!("expected a rank-4 NHWC input, model declares {dims:?}"));
    }
    Ok(dims
        .iter()
        .zip(DEFAULT_INPUT_SHAPE)
        .map(|(&d, default)| if d > 0 { d as usize } else { default })
        .collect())
}

pub(crate) fn check_input_shape(expected: &[usize], actual: &[usize]) -> Result<()> {
    if expected != actual {
        return Err(ClassifierError::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_model_is_a_resource_error() {
        let err =
            InferenceEngine::load(Path::new("/nonexistent/model.onnx"), EngineOptions::default())
                .unwrap_err();
        assert!(matches!(err, ClassifierError::ResourceLoad { resource: "model", .. }));
        assert!(err.is_readiness_failure());
    }

    #[test]
    fn corrupt_model_is_a_resource_error() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"this is not a protobuf graph").unwrap();
        tmp.flush().unwrap();

        let err = InferenceEngine::load(tmp.path(), EngineOptions::default()).unwrap_err();
        assert_eq!(err.kind(), "resource_load");
    }

    #[test]
    fn dynamic_dims_fall_back_to_defaults() {
        assert_eq!(resolve_input_shape(&[-1, 224, 224, 3]).unwrap(), vec![1, 224, 224, 3]);
        assert_eq!(resolve_input_shape(&[-1, -1, -1, 3]).unwrap(), vec![1, 224, 224, 3]);
        assert_eq!(resolve_input_shape(&[1, 299, 299, 3]).unwrap(), vec![1, 299, 299, 3]);
        assert!(resolve_input_shape(&[1, 3, 224]).is_err());
    }

    #[test]
    fn shape_check_reports_both_shapes() {
        assert!(check_input_shape(&DEFAULT_INPUT_SHAPE, &[1, 224, 224, 3]).is_ok());

        match check_input_shape(&DEFAULT_INPUT_SHAPE, &[1, 3, 224, 224]) {
            Err(ClassifierError::ShapeMismatch { expected, actual }) => {
                assert_eq!(expected, vec![1, 224, 224, 3]);
                assert_eq!(actual, vec![1, 3, 224, 224]);
            }
            other => panic!("expected shape mismatch, got {other:?}"),
        }
    }

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
    }

    /// Solid-colour tensor in (H, W, C) layout.
    fn solid(rgb: [f32; 3]) -> ImageTensor {
        ImageTensor::from_array(ndarray::Array3::from_shape_fn(
            (INPUT_HEIGHT as usize, INPUT_WIDTH as usize, CHANNELS),
            |(_, _, c)| rgb[c],
        ))
    }

    // two_class.onnx: mean over H and W, then a 3x2 projection that keeps
    // the red and green means as the two scores.
    #[test]
    fn reads_signature_from_model() {
        let path = fixture("two_class.onnx");
        let engine = InferenceEngine::load(&path, EngineOptions::default()).unwrap();

        assert_eq!(engine.model_path(), path.as_path());
        assert_eq!(engine.input_name(), "input");
        assert_eq!(engine.output_name(), "scores");
        assert_eq!(engine.input_shape(), &DEFAULT_INPUT_SHAPE);
        assert_eq!(engine.output_len(), Some(2));
    }

    #[test]
    fn classify_returns_one_score_per_class() {
        let mut engine =
            InferenceEngine::load(&fixture("two_class.onnx"), EngineOptions::default()).unwrap();

        let scores = engine.classify(&solid([200.0, 40.0, 7.0])).unwrap();
        assert_eq!(scores.len(), 2);
        assert!((scores.as_slice()[0] - 200.0).abs() < 1e-3);
        assert!((scores.as_slice()[1] - 40.0).abs() < 1e-3);
    }

    #[test]
    fn channels_first_tensor_is_a_shape_mismatch() {
        let mut engine =
            InferenceEngine::load(&fixture("two_class.onnx"), EngineOptions::default()).unwrap();
        let nchw = ImageTensor::from_array(ndarray::Array3::zeros((3, 224, 224)));

        match engine.classify(&nchw) {
            Err(ClassifierError::ShapeMismatch { expected, actual }) => {
                assert_eq!(expected, vec![1, 224, 224, 3]);
                assert_eq!(actual, vec![1, 3, 224, 224]);
            }
            other => panic!("expected shape mismatch, got {other:?}"),
        }
    }

    #[test]
    fn explicit_tensor_names_are_resolved() {
        let opts = EngineOptions {
            input_name: Some("input".into()),
            output_name: Some("scores".into()),
            ..EngineOptions::default()
        };
        assert!(InferenceEngine::load(&fixture("two_class.onnx"), opts).is_ok());

        let opts = EngineOptions {
            output_name: Some("logits".into()),
            ..EngineOptions::default()
        };
        let err = InferenceEngine::load(&fixture("two_class.onnx"), opts).unwrap_err();
        assert!(matches!(err, ClassifierError::ResourceLoad { resource: "model", .. }));
        assert!(err.to_string().contains("no matching output"));
    }

    // multi_row.onnx: same graph with the score row stacked twice, shape (2, 2).
    #[test]
    fn multi_row_output_is_rejected() {
        let mut engine =
            InferenceEngine::load(&fixture("multi_row.onnx"), EngineOptions::default()).unwrap();
        assert_eq!(engine.output_len(), Some(2));

        let err = engine.classify(&solid([1.0, 2.0, 3.0])).unwrap_err();
        assert!(matches!(err, ClassifierError::Inference(_)));
        assert!(err.to_string().contains("single output row"));
    }

    #[test]
    fn reload_keeps_the_signature() {
        let mut engine =
            InferenceEngine::load(&fixture("two_class.onnx"), EngineOptions::default()).unwrap();
        engine.reload().unwrap();

        assert_eq!(engine.output_len(), Some(2));
        assert_eq!(engine.input_shape(), &DEFAULT_INPUT_SHAPE);
        let scores = engine.classify(&solid([0.0, 9.0, 0.0])).unwrap();
        assert_eq!(scores.len(), 2);
    }
}
