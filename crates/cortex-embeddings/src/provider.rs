use async_trait::async_trait;
use cortex_core::CortexError;

/// An embedding backend reduced to the triple the core actually calls:
/// embed one string, embed many, and report the vector dimensionality
/// the collection's vector space was created with.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, CortexError>;

    /// Default implementation calls `embed_text` sequentially, matching
    /// the reference Gemini service, which does not batch requests.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CortexError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed_text(text).await?);
        }
        Ok(out)
    }

    async fn dim(&self) -> Result<u32, CortexError>;
}
