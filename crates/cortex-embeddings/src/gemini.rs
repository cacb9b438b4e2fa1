use async_trait::async_trait;
use cortex_core::CortexError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::provider::EmbeddingService;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Thin wrapper around Google's Gemini embedding endpoint. The upstream
/// API has no batch-embed call, so `embed_batch`'s default sequential
/// implementation (see `EmbeddingService`) is the real behaviour here,
/// not a shortcut.
pub struct GeminiEmbeddingService {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiEmbeddingService {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: impl Into<String>, model: impl Into<String>, base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client builds");
        Self {
            client,
            base_url,
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    content: EmbedContent<'a>,
}

#[derive(Serialize)]
struct EmbedContent<'a> {
    parts: Vec<EmbedPart<'a>>,
}

#[derive(Serialize)]
struct EmbedPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[async_trait]
impl EmbeddingService for GeminiEmbeddingService {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, CortexError> {
        let url = format!(
            "{}/models/{}:embedContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = EmbedRequest {
            model: &format!("models/{}", self.model),
            content: EmbedContent {
                parts: vec![EmbedPart { text }],
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CortexError::upstream(format!("embedding provider request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(CortexError::upstream(format!(
                "embedding provider returned {status}: {text}"
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| CortexError::upstream(format!("embedding provider returned malformed response: {e}")))?;

        Ok(parsed.embedding.values)
    }

    async fn dim(&self) -> Result<u32, CortexError> {
        let vector = self.embed_text("dimension probe").await?;
        Ok(vector.len() as u32)
    }
}
