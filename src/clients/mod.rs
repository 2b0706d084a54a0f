//! External collaborator boundaries: text embedding and text generation.
//!
//! The pipeline reaches its backends only through [`EmbeddingClient`] and
//! [`CompletionClient`]. Nothing here retries: a failed call surfaces as-is,
//! and retry or timeout policy belongs to the backend client (for the HTTP
//! implementation, the underlying `reqwest::Client`). The deterministic
//! mocks are public so downstream tests can run the full pipeline offline.

mod mock;
mod openai;

pub use mock::{MockCompletionClient, MockEmbeddingClient};
pub use openai::OpenAiCompatClient;

use async_trait::async_trait;
use thiserror::Error;

/// Failure surfaced by a text-embedding backend.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("embedding response malformed: {0}")]
    InvalidResponse(String),

    /// The backend returned a different number of vectors than inputs.
    #[error("embedding count mismatch: expected {expected}, got {got}")]
    CountMismatch { expected: usize, got: usize },
}

/// Failure surfaced by a text-generation backend.
#[derive(Debug, Error)]
pub enum CompletionClientError {
    #[error("completion request failed: {0}")]
    Request(String),

    #[error("completion response malformed: {0}")]
    InvalidResponse(String),

    #[error("completion response contained no choices")]
    EmptyResponse,
}

/// Maps texts to fixed-length vectors, one per input, in input order.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(
        &self,
        model: &str,
        inputs: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Produces one text completion for a system prompt + user prompt pair.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        model: &str,
        system_prompt: &str,
        prompt: &str,
    ) -> Result<String, CompletionClientError>;
}
