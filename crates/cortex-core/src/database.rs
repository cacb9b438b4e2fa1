use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Database {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseCreate {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingProvider {
    pub id: Uuid,
    pub name: String,
    pub provider_type: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub embedding_model: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderCreate {
    pub name: String,
    pub provider: String,
    pub api_key: String,
    pub embedding_model: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}
