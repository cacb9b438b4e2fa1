pub mod cache;
pub mod gemini;
pub mod provider;

pub use cache::{EmbeddingCache, DEFAULT_PROVIDER_KEY};
pub use gemini::GeminiEmbeddingService;
pub use provider::EmbeddingService;
