use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use cortex_core::{ApiKey, CortexError};
use uuid::Uuid;

use crate::cache::ApiKeyCache;
use crate::keygen::{extract_key_from_header, hash_api_key};

/// Persistence seam the auth service needs from the control catalog.
/// Implemented by the Postgres control-catalog adapter; kept as a trait
/// here so `cortex-auth` does not depend on `cortex-store-postgres`.
#[async_trait]
pub trait ApiKeyRepository: Send + Sync {
    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, CortexError>;
    async fn touch_last_used(&self, id: Uuid) -> Result<(), CortexError>;
    async fn count_enabled_admin_keys(&self) -> Result<i64, CortexError>;
    async fn insert(&self, key: ApiKey) -> Result<(), CortexError>;
}

/// Default TTL (seconds) for a validated key's entry in the process-local
/// cache.
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

pub struct AuthService {
    repo: Arc<dyn ApiKeyRepository>,
    cache: ApiKeyCache,
}

impl AuthService {
    pub fn new(repo: Arc<dyn ApiKeyRepository>) -> Self {
        Self::with_cache_ttl(repo, DEFAULT_CACHE_TTL_SECONDS)
    }

    pub fn with_cache_ttl(repo: Arc<dyn ApiKeyRepository>, cache_ttl_seconds: u64) -> Self {
        AuthService {
            repo,
            cache: ApiKeyCache::new(cache_ttl_seconds),
        }
    }

    /// Validate an `Authorization` header value end to end: strip the
    /// optional `Bearer ` prefix, hash, check the TTL cache, fall back to
    /// the repository on miss, verify the key is enabled and unexpired,
    /// populate the cache, and fire off a best-effort `last_used_at`
    /// update that does not block the response.
    pub async fn authenticate(&self, authorization_header: &str) -> Result<ApiKey, CortexError> {
        let plaintext = extract_key_from_header(authorization_header);
        if plaintext.is_empty() {
            return Err(CortexError::Authentication("missing api key".into()));
        }
        let hash = hash_api_key(plaintext);

        if let Some(key) = self.cache.get(&hash) {
            return Ok(key);
        }

        let key = self
            .repo
            .find_by_hash(&hash)
            .await?
            .ok_or_else(|| CortexError::Authentication("invalid api key".into()))?;

        if !key.is_usable(Utc::now()) {
            return Err(CortexError::Authentication("api key is disabled or expired".into()));
        }

        self.cache.set(hash, key.clone());

        let repo = self.repo.clone();
        let id = key.id;
        tokio::spawn(async move {
            if let Err(err) = repo.touch_last_used(id).await {
                tracing::warn!(error = %err, key_id = %id, "failed to update api key last_used_at");
            }
        });

        Ok(key)
    }

    pub fn invalidate(&self, plaintext: &str) {
        self.cache.invalidate(&hash_api_key(plaintext));
    }
}

pub fn require_admin(key: &ApiKey) -> Result<(), CortexError> {
    if key.permissions.admin {
        Ok(())
    } else {
        Err(CortexError::Permission("admin access required".into()))
    }
}

pub fn check_database_access(key: &ApiKey, database: &str) -> Result<(), CortexError> {
    if key.check_database_access(database) {
        Ok(())
    } else {
        Err(CortexError::Permission(format!(
            "api key does not have access to database '{database}'"
        )))
    }
}

/// Database registry (`POST`/`DELETE /databases`) is gated on
/// `permissions.manage_databases`, which only `ApiKeyPermissions::admin_full`
/// sets — database-scoped and readonly keys are never handed a whole
/// server's database registry.
pub fn check_manage_databases(key: &ApiKey) -> Result<(), CortexError> {
    if key.permissions.admin || key.permissions.manage_databases {
        Ok(())
    } else {
        Err(CortexError::Permission("api key cannot manage databases".into()))
    }
}

/// Collection management requires `permissions.manage_collections`, scoped
/// (for non-admin keys) to the collection's own `database` — a
/// database-scoped key can create/drop collections only within the
/// databases it was granted.
pub fn check_manage_collections(key: &ApiKey, database: Option<&str>) -> Result<(), CortexError> {
    if !(key.permissions.admin || key.permissions.manage_collections) {
        return Err(CortexError::Permission("api key cannot manage collections".into()));
    }
    if let Some(database) = database {
        check_database_access(key, database)?;
    }
    Ok(())
}

/// Embedding-provider registry (`POST`/`GET`/`DELETE /providers/embeddings`)
/// is gated on `permissions.manage_providers`.
pub fn check_manage_providers(key: &ApiKey) -> Result<(), CortexError> {
    if key.permissions.admin || key.permissions.manage_providers {
        Ok(())
    } else {
        Err(CortexError::Permission("api key cannot manage embedding providers".into()))
    }
}

/// API-key administration (`/api-keys`) is gated on `permissions.manage_keys`.
pub fn check_manage_keys(key: &ApiKey) -> Result<(), CortexError> {
    if key.permissions.admin || key.permissions.manage_keys {
        Ok(())
    } else {
        Err(CortexError::Permission("api key cannot manage other api keys".into()))
    }
}

pub fn check_readonly(key: &ApiKey, operation: &str) -> Result<(), CortexError> {
    if key.check_readonly(operation) {
        Ok(())
    } else {
        Err(CortexError::Permission(format!(
            "readonly api key cannot perform operation '{operation}'"
        )))
    }
}
