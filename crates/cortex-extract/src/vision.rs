use async_trait::async_trait;
use base64::Engine;
use cortex_core::CortexError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// A vision-capable provider reduced to the two calls the extractor
/// needs: transcribe (OCR) and describe (captioning). Treated as an
/// opaque `ocr(bytes) -> text` collaborator by the rest of the pipeline.
#[async_trait]
pub trait VisionService: Send + Sync {
    async fn ocr_image(&self, bytes: &[u8], mime_type: &str) -> Result<String, CortexError>;
    async fn describe_image(&self, bytes: &[u8], mime_type: &str) -> Result<String, CortexError>;
}

pub struct GeminiVisionService {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiVisionService {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("reqwest client builds");
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    async fn generate(&self, bytes: &[u8], mime_type: &str, prompt: &str) -> Result<String, CortexError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: prompt },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type,
                            data: &encoded,
                        },
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CortexError::upstream(format!("vision provider request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(CortexError::upstream(format!("vision provider returned {status}: {text}")));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| CortexError::upstream(format!("vision provider returned malformed response: {e}")))?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .and_then(|p| match p {
                ResponsePart::Text { text } => Some(text),
            })
            .ok_or_else(|| CortexError::upstream("vision provider returned no candidates".to_string()))
    }
}

#[async_trait]
impl VisionService for GeminiVisionService {
    async fn ocr_image(&self, bytes: &[u8], mime_type: &str) -> Result<String, CortexError> {
        self.generate(
            bytes,
            mime_type,
            "Transcribe all visible text in this image verbatim, with no commentary.",
        )
        .await
    }

    async fn describe_image(&self, bytes: &[u8], mime_type: &str) -> Result<String, CortexError> {
        self.generate(bytes, mime_type, "Describe this image in one or two sentences.")
            .await
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ResponsePart {
    Text { text: String },
}
