//! OpenAI-compatible HTTP client.
//!
//! Talks to any backend exposing the `/embeddings` and `/chat/completions`
//! surface: OpenAI itself, or a local Ollama instance through its
//! compatibility layer. One struct implements both collaborator traits so a
//! single handle can serve the whole pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{CompletionClient, CompletionClientError, EmbeddingClient, EmbeddingClientError};

/// HTTP client for OpenAI-compatible embedding and chat endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl OpenAiCompatClient {
    /// Creates a client rooted at `base_url`, e.g.
    /// `http://localhost:11434/v1` for Ollama or `https://api.openai.com/v1`.
    pub fn new(base_url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key: None,
        }
    }

    /// Sets the bearer token sent with every request.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Replaces the underlying HTTP client, e.g. to configure timeouts.
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, String> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| format!("base URL '{}' cannot carry a path", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post_json<B: Serialize>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<reqwest::Response, String> {
        let url = self.endpoint(segments)?;
        let mut request = self.http.post(url).json(body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }
        let response = request.send().await.map_err(|err| err.to_string())?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(format!("{status}: {detail}"));
        }
        Ok(response)
    }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingClient for OpenAiCompatClient {
    async fn embed(
        &self,
        model: &str,
        inputs: &[String],
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .post_json(&["embeddings"], &EmbeddingsRequest { model, input: inputs })
            .await
            .map_err(EmbeddingClientError::Request)?;
        let mut parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|err| EmbeddingClientError::InvalidResponse(err.to_string()))?;
        if parsed.data.len() != inputs.len() {
            return Err(EmbeddingClientError::CountMismatch {
                expected: inputs.len(),
                got: parsed.data.len(),
            });
        }
        // The index field restores input order regardless of response order.
        parsed.data.sort_by_key(|row| row.index);
        Ok(parsed.data.into_iter().map(|row| row.embedding).collect())
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    async fn complete(
        &self,
        model: &str,
        system_prompt: &str,
        prompt: &str,
    ) -> Result<String, CompletionClientError> {
        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };
        let response = self
            .post_json(&["chat", "completions"], &request)
            .await
            .map_err(CompletionClientError::Request)?;
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|err| CompletionClientError::InvalidResponse(err.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(CompletionClientError::EmptyResponse)
    }
}
