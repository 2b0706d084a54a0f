//! Document segmentation.
//!
//! Two strategies produce the [`Segment`] sequence the rest of the pipeline
//! operates on:
//!
//! - [`ChunkingStrategy::Recursive`] splits on a separator hierarchy
//!   (paragraph break, line break, sentence end, word boundary, hard cut)
//!   and prefixes each segment after the first with exactly
//!   [`ChunkingConfig::overlap`] characters of its predecessor, so the
//!   concatenation minus overlaps reconstructs the document.
//! - [`ChunkingStrategy::Semantic`] embeds sentence windows, detects
//!   cosine-distance discontinuities between adjacent windows, and cuts at
//!   the detected topic shifts with `max_length` as a soft cap. Overlap is
//!   not enforced.
//!
//! Segments cover the document in order; indices are original document
//! order. All lengths are characters, matching the units callers see in the
//! document text.

mod recursive;
mod semantic;

pub use recursive::chunk_recursive;
pub use semantic::chunk_semantic;

pub(crate) use semantic::split_sentences;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Which segmentation strategy a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Separator-hierarchy splitting with a fixed character overlap.
    #[default]
    Recursive,
    /// Embedding-discontinuity splitting at topic shifts.
    Semantic,
}

/// Parameters governing segmentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub strategy: ChunkingStrategy,
    /// Hard cap on segment length (characters) under the recursive strategy,
    /// soft cap under the semantic strategy.
    pub max_length: usize,
    /// Characters shared between consecutive recursive segments. Ignored by
    /// the semantic strategy.
    pub overlap: usize,
    /// Sentences per embedding window for semantic breakpoint detection.
    pub sentence_window: usize,
    /// Percentile of adjacent-window cosine distance above which a topic
    /// shift is assumed, in `(0, 1]`.
    pub breakpoint_percentile: f64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::Recursive,
            max_length: 500,
            overlap: 20,
            sentence_window: 3,
            breakpoint_percentile: 0.9,
        }
    }
}

impl ChunkingConfig {
    /// Rejects parameter combinations the splitters cannot honor. Runs
    /// before any external call.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_length == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_length must be greater than zero".into(),
            ));
        }
        if self.overlap >= self.max_length {
            return Err(PipelineError::InvalidConfig(format!(
                "overlap ({}) must be smaller than max_length ({})",
                self.overlap, self.max_length
            )));
        }
        if self.sentence_window == 0 {
            return Err(PipelineError::InvalidConfig(
                "sentence_window must be greater than zero".into(),
            ));
        }
        if !(self.breakpoint_percentile > 0.0 && self.breakpoint_percentile <= 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "breakpoint_percentile ({}) must be in (0, 1]",
                self.breakpoint_percentile
            )));
        }
        Ok(())
    }
}

/// A contiguous span of document text with a stable document-order index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Position in the original document order.
    pub index: usize,
    /// Byte offset where `content` starts in the source text (for recursive
    /// segments past the first, this includes the overlap prefix).
    pub offset: usize,
    pub content: String,
    /// Populated once the embedding stage has run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Segment {
    pub fn new(index: usize, offset: usize, content: impl Into<String>) -> Self {
        Self {
            index,
            offset,
            content: content.into(),
            embedding: None,
        }
    }

    /// Segment length in characters.
    pub fn len(&self) -> usize {
        self.content.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}
