//! Label set loading
//!
//! Class names live in a text file next to the model, one per line, in the
//! same order as the model's output vector.

use std::path::Path;

use serde::Serialize;

use crate::utils::error::{ClassifierError, Result};

/// Layout of a label file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LabelFormat {
    /// Each non-blank line is a label, kept verbatim after trimming
    #[default]
    Plain,
    /// Each line is `<index> <label text>`; only the text is kept
    Indexed,
}

impl std::fmt::Display for LabelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabelFormat::Plain => write!(f, "plain"),
            LabelFormat::Indexed => write!(f, "indexed"),
        }
    }
}

/// Ordered class names; position `i` names model output `i`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LabelSet {
    labels: Vec<String>,
}

impl LabelSet {
    pub fn new(labels: Vec<String>) -> Self {
        Self { labels }
    }

    /// Parse label file contents
    pub fn parse(text: &str, format: LabelFormat) -> Self {
        let labels = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| match format {
                LabelFormat::Plain => Some(line.to_string()),
                LabelFormat::Indexed => line
                    .split_once(' ')
                    .map(|(_, name)| name.to_string()),
            })
            .collect();

        Self { labels }
    }

    /// Read and parse a label file
    pub fn load(path: &Path, format: LabelFormat) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ClassifierError::Labels(path.to_path_buf(), e.to_string()))?;

        let set = Self::parse(&text, format);
        tracing::debug!("Loaded {} labels from {:?}: {:?}", set.len(), path, set.labels);
        Ok(set)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for LabelSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}
