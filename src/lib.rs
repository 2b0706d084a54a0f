//! Markov-chain cluster summarization for long documents.
//!
//! LLM summarizers under-weight content that sits far from a document's
//! start and end. This crate counters that positional bias by selecting
//! what to summarize through graph centrality instead of position: segments
//! are embedded, clustered, and ranked by the stationary distribution of a
//! similarity-weighted Markov chain, and only each cluster's most central
//! segments reach the generation model.
//!
//! ```text
//! Document ──► chunking ──► EmbeddingClient ──► clustering
//!                                  │                │
//!                          ranking (stationary      │
//!                          distribution, top-k) ◄───┘
//!                                  │
//!               CompletionClient fan-out (one call per cluster)
//!                                  │
//!                 aggregation ──► evaluation ──► PipelineOutcome
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use summarkov::{
//!     MockCompletionClient, MockEmbeddingClient, Pipeline, PipelineConfig,
//! };
//!
//! # async fn run() -> Result<(), summarkov::PipelineError> {
//! let pipeline = Pipeline::new(
//!     Arc::new(MockEmbeddingClient::new()),
//!     Arc::new(MockCompletionClient::new()),
//! );
//! let config = PipelineConfig::builder()
//!     .cluster_count(4)
//!     .top_k(10)
//!     .reference_summary("A human-written reference, if one exists.")
//!     .build();
//! let outcome = pipeline.run("the full document text…", &config).await?;
//! println!("{}", outcome.summary);
//! # Ok(())
//! # }
//! ```
//!
//! Swap the mocks for [`OpenAiCompatClient`] to drive a real backend: any
//! endpoint speaking the OpenAI embedding/chat surface, including Ollama's
//! compatibility layer.

pub mod chunking;
pub mod clients;
pub mod clustering;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod extract;
pub mod pipeline;
pub mod ranking;
pub mod vectors;

pub use chunking::{ChunkingConfig, ChunkingStrategy, Segment};
pub use clients::{
    CompletionClient, CompletionClientError, EmbeddingClient, EmbeddingClientError,
    MockCompletionClient, MockEmbeddingClient, OpenAiCompatClient,
};
pub use clustering::Cluster;
pub use dataset::{BenchmarkCorpus, BenchmarkExample};
pub use error::PipelineError;
pub use evaluation::{CompositeWeights, EvaluationResult, LexicalOverlap};
pub use extract::extract_file_text;
pub use pipeline::{
    ClusterFailure, ClusterFailurePolicy, Pipeline, PipelineConfig, PipelineOutcome,
    PipelineReport,
};
pub use ranking::{SquareMatrix, StationaryResult};
