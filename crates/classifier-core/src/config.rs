//! Classifier configuration, loaded from a JSON file and overridable from the CLI.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ClassifierError, Result};
use crate::inference::EngineOptions;
use crate::preprocess::ResizeFilter;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierConfig {
    pub model_path: PathBuf,
    /// Newline-delimited labels. Built-in labels are used when unset or unreadable.
    pub labels_path: Option<PathBuf>,
    pub input_name: Option<String>,
    pub output_name: Option<String>,
    pub intra_threads: usize,
    pub resize_filter: ResizeFilter,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/model.onnx"),
            labels_path: Some(PathBuf::from("models/labels.txt")),
            input_name: None,
            output_name: None,
            intra_threads: 4,
            resize_filter: ResizeFilter::default(),
        }
    }
}

impl ClassifierConfig {
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            intra_threads: self.intra_threads,
            input_name: self.input_name.clone(),
            output_name: self.output_name.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.intra_threads == 0 {
            return Err(ClassifierError::Config("intra_threads must be at least 1".into()));
        }
        if self.model_path.as_os_str().is_empty() {
            return Err(ClassifierError::Config("model_path is empty".into()));
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<ClassifierConfig> {
    let data = fs::read_to_string(path)
        .map_err(|e| ClassifierError::Config(format!("cannot read {}: {e}", path.display())))?;
    let config: ClassifierConfig = serde_json::from_str(&data)
        .map_err(|e| ClassifierError::Config(format!("cannot parse {}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}
