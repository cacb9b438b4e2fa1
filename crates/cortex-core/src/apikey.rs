use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyType {
    Admin,
    Database,
    Readonly,
}

impl ApiKeyType {
    /// The prefix segment used when formatting a plaintext key:
    /// admin -> "admin", database -> "live", readonly -> "test".
    pub fn prefix_segment(&self) -> &'static str {
        match self {
            ApiKeyType::Admin => "admin",
            ApiKeyType::Database => "live",
            ApiKeyType::Readonly => "test",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiKeyPermissions {
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub manage_keys: bool,
    #[serde(default)]
    pub manage_databases: bool,
    #[serde(default)]
    pub manage_collections: bool,
    #[serde(default)]
    pub manage_providers: bool,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default)]
    pub databases: Vec<String>,
}

impl ApiKeyPermissions {
    pub fn admin_full() -> Self {
        ApiKeyPermissions {
            admin: true,
            manage_keys: true,
            manage_databases: true,
            manage_collections: true,
            manage_providers: true,
            readonly: false,
            databases: vec![],
        }
    }

    pub fn database_scoped(databases: Vec<String>) -> Self {
        ApiKeyPermissions {
            admin: false,
            manage_keys: false,
            manage_databases: false,
            manage_collections: true,
            manage_providers: false,
            readonly: false,
            databases,
        }
    }

    pub fn readonly_scoped(databases: Vec<String>) -> Self {
        ApiKeyPermissions {
            admin: false,
            manage_keys: false,
            manage_databases: false,
            manage_collections: false,
            manage_providers: false,
            readonly: true,
            databases,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub key_hash: String,
    pub key_prefix: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub key_type: ApiKeyType,
    pub permissions: ApiKeyPermissions,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub enabled: bool,
}

/// Readable set of operations allowed for a readonly key, per
/// `check_readonly`.
pub const READONLY_ALLOWED_OPS: &[&str] = &["read", "search", "list", "get"];

impl ApiKey {
    pub fn check_database_access(&self, database: &str) -> bool {
        self.permissions.admin || self.permissions.databases.iter().any(|d| d == database)
    }

    pub fn check_readonly(&self, op: &str) -> bool {
        !self.permissions.readonly || READONLY_ALLOWED_OPS.contains(&op)
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.expires_at.map(|exp| exp > now).unwrap_or(true)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeyCreate {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub key_type: ApiKeyType,
    #[serde(default)]
    pub databases: Option<Vec<String>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiKeyUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub databases: Option<Vec<String>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyResponse {
    pub id: Uuid,
    pub key_prefix: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub key_type: ApiKeyType,
    pub permissions: ApiKeyPermissions,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub enabled: bool,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(k: ApiKey) -> Self {
        ApiKeyResponse {
            id: k.id,
            key_prefix: k.key_prefix,
            name: k.name,
            description: k.description,
            key_type: k.key_type,
            permissions: k.permissions,
            created_at: k.created_at,
            created_by: k.created_by,
            last_used_at: k.last_used_at,
            expires_at: k.expires_at,
            enabled: k.enabled,
        }
    }
}

/// Returned exactly once, at creation: the only response shape that ever
/// carries the plaintext key.
#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyCreated {
    pub id: Uuid,
    pub key: String,
    pub key_prefix: String,
    pub name: String,
    #[serde(rename = "type")]
    pub key_type: ApiKeyType,
    pub permissions: ApiKeyPermissions,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}
