//! Crate-wide error taxonomy.
//!
//! Configuration and input errors fail fast, before any external call.
//! External-service errors carry enough context (cluster id, stage) to tell
//! which part of the run failed. Evaluation never produces a
//! [`PipelineError`]; missing or malformed references degrade the evaluation
//! output instead.

use thiserror::Error;

use crate::clients::EmbeddingClientError;

/// Errors a pipeline run can surface to the caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Bad chunking or ranking parameters. Raised before any external call
    /// and not recoverable within the pipeline.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The embedding service failed. The run is aborted; partial results are
    /// never returned.
    #[error("embedding service failure: {0}")]
    EmbeddingService(#[from] EmbeddingClientError),

    /// A per-cluster generation call failed, tagged with the cluster id.
    ///
    /// Under [`ClusterFailurePolicy::Skip`](crate::pipeline::ClusterFailurePolicy)
    /// this is downgraded to an entry in the run report instead.
    #[error("cluster {cluster_id} summarization failed: {message}")]
    ClusterSummary { cluster_id: usize, message: String },

    /// The document-level aggregation call failed, or every cluster call
    /// failed in best-effort mode and nothing was left to aggregate.
    #[error("document summary generation failed: {message}")]
    DocumentSummary { message: String },

    /// Unrecognized file type, malformed document text, or an out-of-range
    /// benchmark lookup.
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),

    /// Filesystem failure while reading an input document or dataset split.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
