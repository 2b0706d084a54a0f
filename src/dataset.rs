//! Benchmark corpus access.
//!
//! Long-document/summary pairs organized in named splits, one JSONL file per
//! split. Records use the `input`/`output` field names of the SCROLLS
//! corpora, so exported benchmark files load directly.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::PipelineError;

/// One benchmark example: a long document and, when the split carries them,
/// its reference summary.
#[derive(Debug, Clone, Deserialize)]
pub struct BenchmarkExample {
    #[serde(rename = "input")]
    pub document: String,
    #[serde(rename = "output", default)]
    pub summary: Option<String>,
}

/// A set of named benchmark splits held in memory.
#[derive(Debug, Default)]
pub struct BenchmarkCorpus {
    splits: BTreeMap<String, Vec<BenchmarkExample>>,
}

impl BenchmarkCorpus {
    /// Loads one JSONL file per named split. A malformed line fails the
    /// whole load, naming the split and line number.
    pub fn load<P: AsRef<Path>>(splits: &[(&str, P)]) -> Result<Self, PipelineError> {
        let mut corpus = Self::default();
        for (name, path) in splits {
            let reader = BufReader::new(File::open(path.as_ref())?);
            let mut examples = Vec::new();
            for (line_number, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let example: BenchmarkExample = serde_json::from_str(&line).map_err(|err| {
                    PipelineError::UnsupportedInput(format!(
                        "malformed record in split '{name}' line {}: {err}",
                        line_number + 1
                    ))
                })?;
                examples.push(example);
            }
            debug!(split = name, examples = examples.len(), "split loaded");
            corpus.splits.insert((*name).to_string(), examples);
        }
        Ok(corpus)
    }

    /// Names of the loaded splits, in stable order.
    pub fn split_names(&self) -> Vec<&str> {
        self.splits.keys().map(String::as_str).collect()
    }

    /// Number of examples in `split`.
    pub fn len(&self, split: &str) -> Result<usize, PipelineError> {
        self.split_examples(split).map(Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.splits.values().all(Vec::is_empty)
    }

    /// The example at `index` within `split`; the index is bounded by the
    /// split size.
    pub fn get(&self, split: &str, index: usize) -> Result<&BenchmarkExample, PipelineError> {
        let examples = self.split_examples(split)?;
        examples.get(index).ok_or_else(|| {
            PipelineError::UnsupportedInput(format!(
                "index {index} out of range for split '{split}' ({} examples)",
                examples.len()
            ))
        })
    }

    fn split_examples(&self, split: &str) -> Result<&Vec<BenchmarkExample>, PipelineError> {
        self.splits.get(split).ok_or_else(|| {
            PipelineError::UnsupportedInput(format!(
                "unknown split '{split}'; loaded splits: {:?}",
                self.split_names()
            ))
        })
    }
}
