//! Deterministic in-process backends for tests and offline runs.

use std::hash::{Hash, Hasher};

use async_trait::async_trait;

use super::{CompletionClient, CompletionClientError, EmbeddingClient, EmbeddingClientError};

/// Embedding backend that derives a fixed-length vector from a hash of the
/// input text. Identical texts always map to identical vectors, across calls
/// and across processes.
#[derive(Debug, Clone)]
pub struct MockEmbeddingClient {
    dimensions: usize,
}

impl Default for MockEmbeddingClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbeddingClient {
    pub fn new() -> Self {
        Self { dimensions: 16 }
    }

    #[must_use]
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions.max(1);
        self
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        // DefaultHasher uses fixed keys, so this stays stable across runs.
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        text.hash(&mut hasher);
        let mut state = hasher.finish() | 1;
        (0..self.dimensions)
            .map(|_| {
                // xorshift over the hash: cheap, deterministic spread.
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                ((state % 2_000) as f32 / 1_000.0) - 1.0
            })
            .collect()
    }
}

#[async_trait]
impl EmbeddingClient for MockEmbeddingClient {
    async fn embed(
        &self,
        _model: &str,
        inputs: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        Ok(inputs.iter().map(|input| self.vector_for(input)).collect())
    }
}

/// Generation backend that returns a deterministic digest of its prompt,
/// with optional injected failures for exercising error paths.
#[derive(Debug, Clone, Default)]
pub struct MockCompletionClient {
    fail_marker: Option<String>,
}

impl MockCompletionClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes any call whose prompt contains `marker` fail with a request
    /// error, leaving all other calls untouched.
    #[must_use]
    pub fn fail_when_prompt_contains(mut self, marker: impl Into<String>) -> Self {
        self.fail_marker = Some(marker.into());
        self
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(
        &self,
        model: &str,
        _system_prompt: &str,
        prompt: &str,
    ) -> Result<String, CompletionClientError> {
        if let Some(marker) = &self.fail_marker {
            if prompt.contains(marker) {
                return Err(CompletionClientError::Request(format!(
                    "injected failure: prompt contains '{marker}'"
                )));
            }
        }
        let digest: String = prompt.chars().take(120).collect();
        Ok(format!("[{model}] {digest}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_embeddings_are_deterministic() {
        let client = MockEmbeddingClient::new();
        let inputs = vec!["alpha".to_string(), "beta".to_string(), "alpha".to_string()];
        let first = client.embed("mock", &inputs).await.unwrap();
        let second = client.embed("mock", &inputs).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0], first[2]);
        assert_ne!(first[0], first[1]);
    }

    #[tokio::test]
    async fn mock_completion_fails_only_on_marker() {
        let client = MockCompletionClient::new().fail_when_prompt_contains("poison");
        assert!(client.complete("m", "sys", "clean text").await.is_ok());
        assert!(client.complete("m", "sys", "poison text").await.is_err());
    }
}
