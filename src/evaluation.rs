//! Summary quality scoring.
//!
//! Four metric families: lexical n-gram overlap (ROUGE-1/2 F1), embedding
//! similarity between generated and reference text, coherence over the
//! generated summary's own sentence flow, and a composite blend of overlap
//! and similarity. Metrics are computed independently; a failure in one
//! leaves the others standing, and evaluation as a whole never aborts a
//! pipeline run. Without a reference summary every field stays empty.

use std::collections::HashMap;

use serde::Serialize;
use tracing::warn;
use unicode_segmentation::UnicodeSegmentation;

use crate::chunking::split_sentences;
use crate::clients::EmbeddingClient;
use crate::vectors::cosine_similarity;

/// Weighting of the composite score. Explicit configuration, not a hidden
/// constant; weights are normalized before blending.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompositeWeights {
    pub lexical: f64,
    pub semantic: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            lexical: 0.5,
            semantic: 0.5,
        }
    }
}

/// ROUGE-style unigram and bigram overlap, both as F1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LexicalOverlap {
    pub rouge_1: f64,
    pub rouge_2: f64,
}

/// Scores keyed by metric family. Families stay `None` when no reference
/// summary was supplied or when their computation failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub lexical: Option<LexicalOverlap>,
    pub semantic_similarity: Option<f64>,
    pub coherence: Option<f64>,
    pub composite: Option<f64>,
}

/// Scores `generated` against an optional reference.
///
/// No reference (or a blank one) yields the empty result; that is not an
/// error. Embedding failures during evaluation are logged and leave the
/// affected families `None`; they never propagate.
pub async fn evaluate(
    generated: &str,
    reference: Option<&str>,
    embeddings: &dyn EmbeddingClient,
    model: &str,
    weights: &CompositeWeights,
) -> EvaluationResult {
    let Some(reference) = reference.filter(|text| !text.trim().is_empty()) else {
        return EvaluationResult::default();
    };

    let lexical = LexicalOverlap {
        rouge_1: rouge_n(generated, reference, 1),
        rouge_2: rouge_n(generated, reference, 2),
    };

    let semantic_similarity = match embeddings
        .embed(model, &[generated.to_string(), reference.to_string()])
        .await
    {
        Ok(vectors) if vectors.len() == 2 => Some(cosine_similarity(&vectors[0], &vectors[1])),
        Ok(vectors) => {
            warn!(got = vectors.len(), "semantic similarity skipped: unexpected vector count");
            None
        }
        Err(err) => {
            warn!(error = %err, "semantic similarity skipped");
            None
        }
    };

    let coherence = coherence_score(generated, embeddings, model).await;

    let composite = match semantic_similarity {
        Some(semantic) => composite_score(lexical.rouge_1, semantic, weights),
        None => None,
    };

    EvaluationResult {
        lexical: Some(lexical),
        semantic_similarity,
        coherence,
        composite,
    }
}

/// Mean cosine similarity between adjacent sentence embeddings of `text`.
/// Fewer than two sentences is trivially coherent; an embedding failure
/// yields `None`.
async fn coherence_score(
    text: &str,
    embeddings: &dyn EmbeddingClient,
    model: &str,
) -> Option<f64> {
    let sentences: Vec<String> = split_sentences(text)
        .into_iter()
        .map(|(_, raw)| raw.trim().to_string())
        .collect();
    if sentences.len() < 2 {
        return Some(1.0);
    }
    match embeddings.embed(model, &sentences).await {
        Ok(vectors) if vectors.len() == sentences.len() => {
            let similarities: Vec<f64> = vectors
                .windows(2)
                .map(|pair| cosine_similarity(&pair[0], &pair[1]))
                .collect();
            Some(similarities.iter().sum::<f64>() / similarities.len() as f64)
        }
        Ok(_) | Err(_) => {
            warn!("coherence skipped: sentence embedding failed");
            None
        }
    }
}

fn composite_score(rouge_1: f64, semantic: f64, weights: &CompositeWeights) -> Option<f64> {
    let total = weights.lexical + weights.semantic;
    if !(total > 0.0) || weights.lexical < 0.0 || weights.semantic < 0.0 {
        return None;
    }
    Some((weights.lexical * rouge_1 + weights.semantic * semantic) / total)
}

/// N-gram overlap F1. Empty candidate or reference token sets score zero,
/// the defined sentinel for a metric that cannot be computed.
fn rouge_n(candidate: &str, reference: &str, n: usize) -> f64 {
    let candidate_grams = ngram_counts(candidate, n);
    let reference_grams = ngram_counts(reference, n);
    let candidate_total: usize = candidate_grams.values().sum();
    let reference_total: usize = reference_grams.values().sum();
    if candidate_total == 0 || reference_total == 0 {
        return 0.0;
    }

    let mut matched = 0usize;
    for (gram, count) in &candidate_grams {
        if let Some(reference_count) = reference_grams.get(gram) {
            matched += count.min(reference_count);
        }
    }
    if matched == 0 {
        return 0.0;
    }
    let precision = matched as f64 / candidate_total as f64;
    let recall = matched as f64 / reference_total as f64;
    2.0 * precision * recall / (precision + recall)
}

fn ngram_counts(text: &str, n: usize) -> HashMap<Vec<String>, usize> {
    let tokens: Vec<String> = text
        .unicode_words()
        .map(|word| word.to_lowercase())
        .collect();
    let mut counts = HashMap::new();
    if tokens.len() < n || n == 0 {
        return counts;
    }
    for gram in tokens.windows(n) {
        *counts.entry(gram.to_vec()).or_insert(0) += 1;
    }
    counts
}
