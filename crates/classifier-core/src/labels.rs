//! Class names used to interpret the model's output vector.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::error::{ClassifierError, Result};

/// Labels used when the label resource cannot be read.
pub const FALLBACK_LABELS: [&str; 2] = ["diabetes", "nondiabetes"];

/// Ordered class names. Position `i` names output score `i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    /// Parse label text, one label per non-empty line. `None` (resource absent
    /// or unreadable) and text with no labels yield [`FALLBACK_LABELS`].
    pub fn load(text: Option<&str>) -> Self {
        let labels: Vec<String> = text
            .map(|s| {
                s.lines()
                    .map(|l| l.trim().to_string())
                    .filter(|l| !l.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        if labels.is_empty() {
            if text.is_some() {
                warn!("label resource has no labels, using fallback labels");
            }
            return Self::fallback();
        }
        Self { labels }
    }

    /// Read labels from a UTF-8 text file, falling back on any read failure.
    pub fn from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => {
                let set = Self::load(Some(&text));
                info!(path = %path.display(), count = set.len(), "loaded labels");
                set
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "label resource unreadable, using fallback labels"
                );
                Self::fallback()
            }
        }
    }

    pub fn fallback() -> Self {
        Self {
            labels: FALLBACK_LABELS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    /// Check the set against the model's output width. Duplicate names would
    /// make the label → score mapping ambiguous, so they are rejected too.
    pub fn validate(&self, output_len: Option<usize>) -> Result<()> {
        if let Some(n) = output_len {
            if n != self.len() {
                return Err(ClassifierError::LabelMismatch {
                    labels: self.len(),
                    scores: n,
                });
            }
        }

        let mut seen = HashSet::new();
        for label in self.iter() {
            if !seen.insert(label) {
                return Err(ClassifierError::Config(format!("duplicate label '{label}'")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_trimmed_non_empty_lines_in_order() {
        let set = LabelSet::load(Some("  diabetes \r\n\n nondiabetes\n\n"));
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["diabetes", "nondiabetes"]);
    }

    #[test]
    fn missing_resource_uses_fallback() {
        let set = LabelSet::load(None);
        assert_eq!(set, LabelSet::fallback());
        assert_eq!(set.get(0), Some("diabetes"));
        assert_eq!(set.get(1), Some("nondiabetes"));
    }

    #[test]
    fn blank_resource_uses_fallback() {
        assert_eq!(LabelSet::load(Some("\n  \n")), LabelSet::fallback());
    }

    #[test]
    fn unreadable_path_uses_fallback() {
        let set = LabelSet::from_path(Path::new("/nonexistent/labels.txt"));
        assert_eq!(set, LabelSet::fallback());
    }

    #[test]
    fn reads_labels_from_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "healthy").unwrap();
        writeln!(tmp, "affected").unwrap();
        tmp.flush().unwrap();

        let set = LabelSet::from_path(tmp.path());
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(0), Some("healthy"));
        assert_eq!(set.get(1), Some("affected"));
    }

    #[test]
    fn validate_checks_width_and_duplicates() {
        let set = LabelSet::fallback();
        assert!(set.validate(Some(2)).is_ok());
        assert!(set.validate(None).is_ok());
        assert!(matches!(
            set.validate(Some(3)),
            Err(ClassifierError::LabelMismatch { labels: 2, scores: 3 })
        ));

        let dup = LabelSet::load(Some("a\na\n"));
        assert!(matches!(dup.validate(Some(2)), Err(ClassifierError::Config(_))));
    }
}
