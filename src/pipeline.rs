//! Pipeline orchestration.
//!
//! One [`Pipeline::run`] call takes a document through chunking, embedding,
//! clustering, Markov ranking, fan-out cluster summarization, document-level
//! aggregation, and evaluation. Every entity is created and discarded within
//! the run; there is no cross-run state and nothing is retried here.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::chunking::{chunk_recursive, chunk_semantic, ChunkingConfig, ChunkingStrategy, Segment};
use crate::clients::{CompletionClient, EmbeddingClient, EmbeddingClientError};
use crate::clustering::{cluster_embeddings, Cluster};
use crate::error::PipelineError;
use crate::evaluation::{evaluate, CompositeWeights, EvaluationResult};
use crate::ranking::{select_top_k, similarity_matrix, stationary_distribution};

/// What happens when a per-cluster generation call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClusterFailurePolicy {
    /// Abort the whole run with a [`PipelineError::ClusterSummary`].
    #[default]
    Abort,
    /// Best-effort: drop the failing cluster's contribution and record it in
    /// [`PipelineReport::skipped_clusters`].
    Skip,
}

/// Every recognized knob of a pipeline run, enumerated explicitly.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub chunking: ChunkingConfig,
    pub embedding_model: String,
    pub completion_model: String,
    /// Requested semantic cluster count; collapses to one cluster per
    /// segment when there are fewer segments.
    pub cluster_count: usize,
    /// Segments each cluster contributes to its summary prompt.
    pub top_k: usize,
    /// System prompt for the per-cluster synthesis calls.
    pub cluster_prompt: String,
    /// System prompt for the document-level synthesis call.
    pub document_prompt: String,
    /// Instructions prepended to the aggregation prompt body.
    pub aggregation_instructions: String,
    /// Optional human reference; enables evaluation.
    pub reference_summary: Option<String>,
    pub failure_policy: ClusterFailurePolicy,
    /// Seed for cluster initialization; fixing it makes runs reproducible.
    pub seed: u64,
    pub composite_weights: CompositeWeights,
    /// L1 convergence tolerance for the stationary distribution.
    pub stationary_tolerance: f64,
    /// Power-iteration budget; exhaustion is a warning, not a failure.
    pub stationary_max_iterations: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            embedding_model: "nomic-embed-text".into(),
            completion_model: "gpt-4o-mini".into(),
            cluster_count: 5,
            top_k: 20,
            cluster_prompt: "You are an expert AI writing assistant specializing in \
                             synthesizing and rewriting content into cohesive and detailed \
                             summaries."
                .into(),
            document_prompt: "You are an expert writing assistant specializing in document \
                              synthesis and content generation."
                .into(),
            aggregation_instructions: "Combine the provided sections into a single document. \
                                       Ensure that the content flows logically and maintains \
                                       the overall narrative."
                .into(),
            reference_summary: None,
            failure_policy: ClusterFailurePolicy::default(),
            seed: 0,
            composite_weights: CompositeWeights::default(),
            stationary_tolerance: 1e-6,
            stationary_max_iterations: 100,
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Fails fast on parameter combinations no stage can honor. Runs before
    /// any external call.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.chunking.validate()?;
        if self.cluster_count == 0 {
            return Err(PipelineError::InvalidConfig(
                "cluster_count must be greater than zero".into(),
            ));
        }
        if self.top_k == 0 {
            return Err(PipelineError::InvalidConfig(
                "top_k must be greater than zero".into(),
            ));
        }
        if self.embedding_model.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "embedding_model must not be empty".into(),
            ));
        }
        if self.completion_model.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "completion_model must not be empty".into(),
            ));
        }
        if self.composite_weights.lexical < 0.0
            || self.composite_weights.semantic < 0.0
            || self.composite_weights.lexical + self.composite_weights.semantic <= 0.0
        {
            return Err(PipelineError::InvalidConfig(
                "composite weights must be non-negative and sum above zero".into(),
            ));
        }
        if !(self.stationary_tolerance > 0.0) {
            return Err(PipelineError::InvalidConfig(
                "stationary_tolerance must be positive".into(),
            ));
        }
        if self.stationary_max_iterations == 0 {
            return Err(PipelineError::InvalidConfig(
                "stationary_max_iterations must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    #[must_use]
    pub fn chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.config.chunking = chunking;
        self
    }

    #[must_use]
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    #[must_use]
    pub fn completion_model(mut self, model: impl Into<String>) -> Self {
        self.config.completion_model = model.into();
        self
    }

    #[must_use]
    pub fn cluster_count(mut self, cluster_count: usize) -> Self {
        self.config.cluster_count = cluster_count;
        self
    }

    #[must_use]
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.config.top_k = top_k;
        self
    }

    #[must_use]
    pub fn cluster_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.cluster_prompt = prompt.into();
        self
    }

    #[must_use]
    pub fn document_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.document_prompt = prompt.into();
        self
    }

    #[must_use]
    pub fn aggregation_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.config.aggregation_instructions = instructions.into();
        self
    }

    #[must_use]
    pub fn reference_summary(mut self, reference: impl Into<String>) -> Self {
        self.config.reference_summary = Some(reference.into());
        self
    }

    #[must_use]
    pub fn failure_policy(mut self, policy: ClusterFailurePolicy) -> Self {
        self.config.failure_policy = policy;
        self
    }

    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    #[must_use]
    pub fn composite_weights(mut self, weights: CompositeWeights) -> Self {
        self.config.composite_weights = weights;
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

/// A cluster whose summarization call failed in best-effort mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterFailure {
    pub cluster_id: usize,
    pub message: String,
}

/// Run telemetry returned beside the summary.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub segment_count: usize,
    pub cluster_count: usize,
    pub ranking_converged: bool,
    pub ranking_iterations: usize,
    /// Clusters dropped under [`ClusterFailurePolicy::Skip`]; empty under
    /// [`ClusterFailurePolicy::Abort`]. Tells the caller which failure
    /// behavior occurred.
    pub skipped_clusters: Vec<ClusterFailure>,
    pub duration_ms: u64,
}

/// The result bundle of a run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    /// The document-level summary; immutable once produced.
    pub summary: String,
    /// Empty families when no reference summary was supplied.
    pub evaluation: EvaluationResult,
    pub report: PipelineReport,
}

/// Summarization pipeline over injected collaborator handles.
pub struct Pipeline {
    embeddings: Arc<dyn EmbeddingClient>,
    completions: Arc<dyn CompletionClient>,
}

impl Pipeline {
    pub fn new(
        embeddings: Arc<dyn EmbeddingClient>,
        completions: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            embeddings,
            completions,
        }
    }

    /// Runs the full pipeline on `document`.
    ///
    /// Returns either a complete [`PipelineOutcome`] or a single categorized
    /// [`PipelineError`] naming the stage that failed. With identical
    /// configuration, seed, and collaborator responses, two runs over the
    /// same document produce identical summaries and scores.
    pub async fn run(
        &self,
        document: &str,
        config: &PipelineConfig,
    ) -> Result<PipelineOutcome, PipelineError> {
        config.validate()?;
        if document.trim().is_empty() {
            return Err(PipelineError::UnsupportedInput(
                "document text is empty".into(),
            ));
        }
        let started = Instant::now();

        // Chunk.
        let mut segments = match config.chunking.strategy {
            ChunkingStrategy::Recursive => chunk_recursive(document, &config.chunking),
            ChunkingStrategy::Semantic => {
                chunk_semantic(
                    document,
                    &config.chunking,
                    self.embeddings.as_ref(),
                    &config.embedding_model,
                )
                .await?
            }
        };
        if segments.is_empty() {
            return Err(PipelineError::UnsupportedInput(
                "document produced no segments".into(),
            ));
        }
        debug!(segments = segments.len(), "chunking complete");

        // Embed all segments in one batch; a service failure aborts the run.
        let inputs: Vec<String> = segments
            .iter()
            .map(|segment| segment.content.clone())
            .collect();
        let vectors = self
            .embeddings
            .embed(&config.embedding_model, &inputs)
            .await?;
        if vectors.len() != segments.len() {
            return Err(EmbeddingClientError::CountMismatch {
                expected: segments.len(),
                got: vectors.len(),
            }
            .into());
        }
        for (segment, vector) in segments.iter_mut().zip(vectors) {
            segment.embedding = Some(vector);
        }
        let views: Vec<&[f32]> = segments
            .iter()
            .filter_map(|segment| segment.embedding.as_deref())
            .collect();
        debug_assert_eq!(views.len(), segments.len());

        // Rank every segment by the stationary distribution of the
        // similarity chain: centrality, not position.
        let transition = similarity_matrix(&views).into_stochastic();
        let stationary = stationary_distribution(
            &transition,
            config.stationary_tolerance,
            config.stationary_max_iterations,
        );
        if !stationary.converged {
            warn!(
                iterations = stationary.iterations,
                delta = stationary.delta,
                "stationary distribution did not converge; using best approximation"
            );
        }

        // Cluster, then pick each cluster's top-k segments so no cluster is
        // starved by a globally dominant region.
        let clusters = cluster_embeddings(&views, config.cluster_count, config.seed);
        let ordered = order_for_aggregation(&clusters, &stationary.scores);
        let selections: Vec<(usize, String)> = ordered
            .iter()
            .map(|cluster| {
                (
                    cluster.id,
                    cluster_prompt_body(cluster, &segments, &stationary.scores, config.top_k),
                )
            })
            .collect();
        debug!(clusters = clusters.len(), "segment selection complete");

        // Fan out one generation call per cluster; collect in cluster order.
        let mut join_set: JoinSet<(usize, usize, Result<String, String>)> = JoinSet::new();
        for (position, (cluster_id, body)) in selections.iter().enumerate() {
            let completions = Arc::clone(&self.completions);
            let model = config.completion_model.clone();
            let system_prompt = config.cluster_prompt.clone();
            let cluster_id = *cluster_id;
            let body = body.clone();
            join_set.spawn(async move {
                let result = completions
                    .complete(&model, &system_prompt, &body)
                    .await
                    .map_err(|err| err.to_string());
                (position, cluster_id, result)
            });
        }

        // Drain the whole set before acting on failures: in-flight calls run
        // to completion regardless of sibling outcomes.
        let mut slots: Vec<Option<String>> = vec![None; selections.len()];
        let mut failures: Vec<ClusterFailure> = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            let (position, cluster_id, result) = joined.map_err(|err| {
                PipelineError::DocumentSummary {
                    message: format!("cluster summarization task aborted: {err}"),
                }
            })?;
            match result {
                Ok(text) => slots[position] = Some(text),
                Err(message) => failures.push(ClusterFailure {
                    cluster_id,
                    message,
                }),
            }
        }
        failures.sort_by_key(|failure| failure.cluster_id);

        if let Some(failure) = failures.first() {
            match config.failure_policy {
                ClusterFailurePolicy::Abort => {
                    return Err(PipelineError::ClusterSummary {
                        cluster_id: failure.cluster_id,
                        message: failure.message.clone(),
                    });
                }
                ClusterFailurePolicy::Skip => {
                    for failure in &failures {
                        warn!(
                            cluster_id = failure.cluster_id,
                            message = %failure.message,
                            "cluster summary skipped"
                        );
                    }
                }
            }
        }

        let cluster_summaries: Vec<String> = slots.into_iter().flatten().collect();
        if cluster_summaries.is_empty() {
            return Err(PipelineError::DocumentSummary {
                message: format!(
                    "all {} cluster summarization calls failed",
                    selections.len()
                ),
            });
        }

        // Aggregate into the final document summary.
        let body = aggregation_prompt_body(&config.aggregation_instructions, &cluster_summaries);
        let summary = self
            .completions
            .complete(&config.completion_model, &config.document_prompt, &body)
            .await
            .map_err(|err| PipelineError::DocumentSummary {
                message: err.to_string(),
            })?;
        debug!(length = summary.len(), "document summary generated");

        // Evaluation degrades gracefully and never fails the run.
        let evaluation = evaluate(
            &summary,
            config.reference_summary.as_deref(),
            self.embeddings.as_ref(),
            &config.embedding_model,
            &config.composite_weights,
        )
        .await;

        Ok(PipelineOutcome {
            summary,
            evaluation,
            report: PipelineReport {
                segment_count: segments.len(),
                cluster_count: clusters.len(),
                ranking_converged: stationary.converged,
                ranking_iterations: stationary.iterations,
                skipped_clusters: failures,
                duration_ms: started.elapsed().as_millis() as u64,
            },
        })
    }
}

/// Clusters ordered by the document position of their most central segment,
/// so the aggregation prompt reads in narrative order.
fn order_for_aggregation<'a>(clusters: &'a [Cluster], scores: &[f64]) -> Vec<&'a Cluster> {
    let mut ordered: Vec<(&Cluster, usize)> = clusters
        .iter()
        .map(|cluster| {
            let anchor = cluster
                .members
                .iter()
                .copied()
                .max_by(|a, b| {
                    scores[*a]
                        .total_cmp(&scores[*b])
                        .then(b.cmp(a))
                })
                .unwrap_or(0);
            (cluster, anchor)
        })
        .collect();
    ordered.sort_by_key(|(_, anchor)| *anchor);
    ordered.into_iter().map(|(cluster, _)| cluster).collect()
}

/// Prompt body for one cluster: its top-k segments by stationary score, laid
/// out in document order.
fn cluster_prompt_body(
    cluster: &Cluster,
    segments: &[Segment],
    scores: &[f64],
    top_k: usize,
) -> String {
    let candidates = cluster
        .members
        .iter()
        .map(|&index| (index, scores[index]));
    let mut selected = select_top_k(candidates, top_k);
    selected.sort_unstable();
    selected
        .iter()
        .map(|&index| segments[index].content.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn aggregation_prompt_body(instructions: &str, cluster_summaries: &[String]) -> String {
    let sections = cluster_summaries
        .iter()
        .enumerate()
        .map(|(i, summary)| format!("Section {}:\n{}", i + 1, summary.trim()))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{instructions}\n\n{sections}")
}
