//! Batch runner with progress tracking for classifying many photos in one invocation.
//!
//! Photos are classified one after another against a single classifier.
//! Cancellation is honoured between photos, never in the middle of one.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use walkdir::WalkDir;

use crate::inference::ScoreModel;
use crate::pipeline::Classifier;
use crate::report::PredictionRecord;

/// File extensions treated as photos when expanding directories.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

/// Atomic progress tracking, readable from another thread while a batch runs.
pub struct BatchProgress {
    pub total_files: AtomicUsize,
    pub processed_files: AtomicUsize,
    pub error_count: AtomicUsize,
    pub cancel: AtomicBool,
}

impl BatchProgress {
    pub fn new() -> Self {
        Self {
            total_files: AtomicUsize::new(0),
            processed_files: AtomicUsize::new(0),
            error_count: AtomicUsize::new(0),
            cancel: AtomicBool::new(false),
        }
    }

    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

impl Default for BatchProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if a path has one of the [`IMAGE_EXTENSIONS`].
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Collect photo paths from the given paths (expanding directories).
///
/// Explicitly named files are always kept, whatever their extension, so a
/// mislabelled file still yields a decode error instead of vanishing.
pub fn collect_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .follow_links(false)
                .into_iter()
                .flatten()
                .map(|entry| entry.into_path())
                .filter(|p| p.is_file() && is_image(p))
                .collect();
            found.sort();
            files.extend(found);
        } else {
            // Missing paths are reported per file by the pipeline.
            files.push(path.clone());
        }
    }

    files
}

/// Classify every file in order. Blocking; call from a worker thread if the
/// caller needs to stay responsive.
pub fn run_batch<M: ScoreModel>(
    classifier: &mut Classifier<M>,
    files: &[PathBuf],
    progress: &BatchProgress,
) -> Vec<PredictionRecord> {
    progress.total_files.store(files.len(), Ordering::Relaxed);

    let mut records = Vec::with_capacity(files.len());
    for path in files {
        if progress.cancel.load(Ordering::Relaxed) {
            break;
        }

        let record = PredictionRecord::new(path.clone(), classifier.predict_file(path));
        if record.error().is_some() {
            progress.error_count.fetch_add(1, Ordering::Relaxed);
        }
        progress.processed_files.fetch_add(1, Ordering::Relaxed);
        records.push(record);
    }

    records
}
