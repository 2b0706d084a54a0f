//! Embedding-discontinuity splitting.
//!
//! Sentences are embedded in small context windows; a cosine-distance spike
//! between adjacent windows marks a topic shift. Segment boundaries follow
//! the detected shifts, with `max_length` applied as a soft cap when a run
//! of sentences grows too long.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use super::{ChunkingConfig, Segment};
use crate::clients::{EmbeddingClient, EmbeddingClientError};
use crate::error::PipelineError;
use crate::vectors::cosine_similarity;

fn boundary_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"[.!?]+["')\]]*\s+|\n{2,}"#).expect("sentence boundary pattern is valid")
    })
}

/// Sentence spans in document order: byte offset plus the raw slice.
/// Trailing whitespace is retained so spans stay contiguous; blank spans are
/// dropped.
pub(crate) fn split_sentences(text: &str) -> Vec<(usize, &str)> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    for found in boundary_regex().find_iter(text) {
        let end = found.end();
        let raw = &text[start..end];
        if !raw.trim().is_empty() {
            sentences.push((start, raw));
        }
        start = end;
    }
    if start < text.len() {
        let raw = &text[start..];
        if !raw.trim().is_empty() {
            sentences.push((start, raw));
        }
    }
    sentences
}

/// Splits `text` at points of maximal embedding-distance discontinuity
/// between adjacent sentence windows. `config.max_length` is a soft cap;
/// overlap is not enforced. One embedding call covers all windows; a failed
/// call aborts chunking.
pub async fn chunk_semantic(
    text: &str,
    config: &ChunkingConfig,
    embeddings: &dyn EmbeddingClient,
    model: &str,
) -> Result<Vec<Segment>, PipelineError> {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return Ok(Vec::new());
    }
    if sentences.len() <= config.sentence_window || text.chars().count() <= config.max_length {
        return Ok(vec![Segment::new(0, 0, text)]);
    }

    // One window per sentence: the sentence plus half a window of context on
    // each side.
    let half = config.sentence_window / 2;
    let windows: Vec<String> = (0..sentences.len())
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(sentences.len());
            sentences[lo..hi]
                .iter()
                .map(|(_, raw)| raw.trim())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();

    let vectors = embeddings.embed(model, &windows).await?;
    if vectors.len() != windows.len() {
        return Err(EmbeddingClientError::CountMismatch {
            expected: windows.len(),
            got: vectors.len(),
        }
        .into());
    }

    let distances: Vec<f64> = vectors
        .windows(2)
        .map(|pair| 1.0 - cosine_similarity(&pair[0], &pair[1]))
        .collect();
    let threshold = percentile(&distances, config.breakpoint_percentile);

    // distances[i] sits between sentence i and i + 1; a spike cuts after i.
    let breaks: Vec<usize> = distances
        .iter()
        .enumerate()
        .filter(|(_, distance)| **distance > threshold)
        .map(|(i, _)| i)
        .collect();
    debug!(
        sentences = sentences.len(),
        breaks = breaks.len(),
        threshold,
        "semantic breakpoints detected"
    );

    let mut segments = Vec::new();
    let mut run_start = 0usize;
    for boundary in breaks
        .iter()
        .copied()
        .chain(std::iter::once(sentences.len() - 1))
    {
        push_runs(
            text,
            &sentences[run_start..=boundary],
            config.max_length,
            &mut segments,
        );
        run_start = boundary + 1;
    }
    Ok(segments)
}

/// Emits one segment per sentence run, re-splitting a run at sentence
/// boundaries whenever it overruns the soft cap. A single oversized sentence
/// stays whole.
fn push_runs(text: &str, run: &[(usize, &str)], max_length: usize, segments: &mut Vec<Segment>) {
    let mut piece_start = 0usize;
    let mut length = 0usize;
    for (i, (_, sentence)) in run.iter().enumerate() {
        let sentence_length = sentence.chars().count();
        if length > 0 && length + sentence_length > max_length {
            push_segment(text, &run[piece_start..i], segments);
            piece_start = i;
            length = 0;
        }
        length += sentence_length;
    }
    push_segment(text, &run[piece_start..], segments);
}

fn push_segment(text: &str, run: &[(usize, &str)], segments: &mut Vec<Segment>) {
    let (Some(&(first_offset, _)), Some(&(last_offset, last))) = (run.first(), run.last()) else {
        return;
    };
    let content = text[first_offset..last_offset + last.len()].trim_end();
    if content.is_empty() {
        return;
    }
    segments.push(Segment::new(segments.len(), first_offset, content));
}

/// Percentile by linear interpolation between closest ranks.
fn percentile(values: &[f64], p: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    match sorted.len() {
        0 => f64::MAX,
        1 => sorted[0],
        len => {
            let rank = p * (len - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Embeds ocean-themed text on one axis and everything else on another,
    /// giving the splitter a single unambiguous topic shift.
    struct TwoTopicEmbedder;

    #[async_trait]
    impl EmbeddingClient for TwoTopicEmbedder {
        async fn embed(
            &self,
            _model: &str,
            inputs: &[String],
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            Ok(inputs
                .iter()
                .map(|input| {
                    if input.contains("tide") || input.contains("wave") {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect())
        }
    }

    fn semantic_config() -> ChunkingConfig {
        ChunkingConfig {
            strategy: crate::chunking::ChunkingStrategy::Semantic,
            max_length: 60,
            overlap: 0,
            sentence_window: 1,
            breakpoint_percentile: 0.9,
        }
    }

    #[test]
    fn split_sentences_tracks_offsets() {
        let text = "First point here. Second point there! Third?\n\nA new paragraph";
        let sentences = split_sentences(text);
        assert_eq!(sentences.len(), 4);
        for (offset, raw) in &sentences {
            assert_eq!(&text[*offset..*offset + raw.len()], *raw);
        }
        assert!(sentences[3].1.starts_with("A new paragraph"));
    }

    #[tokio::test]
    async fn short_text_is_a_single_segment() {
        let text = "One tide. Two waves.";
        let segments = chunk_semantic(text, &semantic_config(), &TwoTopicEmbedder, "mock")
            .await
            .unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].content, text);
    }

    #[tokio::test]
    async fn topic_shift_becomes_a_boundary() {
        let text = "The tide rolls in slowly. Every wave stacks on the last. \
                    Traders shout their numbers. The market closes early today.";
        let mut config = semantic_config();
        config.max_length = 100;
        let segments = chunk_semantic(text, &config, &TwoTopicEmbedder, "mock")
            .await
            .unwrap();
        assert_eq!(segments.len(), 2);
        assert!(segments[0].content.contains("wave"));
        assert!(segments[1].content.starts_with("Traders"));
        assert_eq!(segments[1].offset, text.find("Traders").unwrap());
    }

    #[tokio::test]
    async fn soft_cap_resplits_long_runs() {
        let text = "The tide rolls in slowly over the flats. Every wave stacks on the last one. \
                    A third wave follows the second closely. The tide turns well after midnight.";
        let segments = chunk_semantic(text, &semantic_config(), &TwoTopicEmbedder, "mock")
            .await
            .unwrap();
        assert!(segments.len() > 1, "soft cap should split a uniform run");
        let indices: Vec<usize> = segments.iter().map(|s| s.index).collect();
        let expected: Vec<usize> = (0..segments.len()).collect();
        assert_eq!(indices, expected);
    }

    #[test]
    fn percentile_interpolates_between_ranks() {
        assert!((percentile(&[0.0, 0.0, 1.0], 0.9) - 0.8).abs() < 1e-9);
        assert_eq!(percentile(&[0.5], 0.9), 0.5);
    }
}
