use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cortex_auth::ApiKeyRepository;
use cortex_core::{ApiKey, ApiKeyPermissions, ApiKeyType, CollectionSchema, CortexError, Database, EmbeddingProvider};
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

/// Adapter over the gateway's control database: `_cortex_databases`,
/// `_cortex_collections`, `_cortex_embedding_providers` and `api_keys`.
/// `schema_migrations` is owned by `cortex-migrate`, not this type.
///
/// Registry state always lives in the gateway's own control pool, even for
/// collections that belong to a named database — `database_name` is just a
/// column here, not a separate connection. `admin::create_database` is the
/// one place that also talks to the *other* physical database, to bootstrap
/// that database's own copy of these tables for self-description.
#[derive(Clone)]
pub struct ControlCatalog {
    pool: PgPool,
}

fn upstream(e: sqlx::Error) -> CortexError {
    CortexError::upstream(format!("postgres error: {e}"))
}

impl ControlCatalog {
    pub fn new(pool: PgPool) -> Self {
        ControlCatalog { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // -- databases ----------------------------------------------------

    pub async fn insert_database(&self, database: &Database) -> Result<(), CortexError> {
        sqlx::query(
            "INSERT INTO _cortex_databases (id, name, description, metadata, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(database.id)
        .bind(&database.name)
        .bind(&database.description)
        .bind(&database.metadata)
        .bind(database.created_at)
        .bind(database.updated_at)
        .execute(&self.pool)
        .await
        .map_err(upstream)?;
        Ok(())
    }

    pub async fn get_database(&self, name: &str) -> Result<Option<Database>, CortexError> {
        let row = sqlx::query("SELECT id, name, description, metadata, created_at, updated_at FROM _cortex_databases WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(upstream)?;
        Ok(row.map(|r| Database {
            id: r.get("id"),
            name: r.get("name"),
            description: r.get("description"),
            metadata: r.get("metadata"),
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }

    pub async fn list_databases(&self) -> Result<Vec<Database>, CortexError> {
        let rows = sqlx::query("SELECT id, name, description, metadata, created_at, updated_at FROM _cortex_databases ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(upstream)?;
        Ok(rows
            .into_iter()
            .map(|r| Database {
                id: r.get("id"),
                name: r.get("name"),
                description: r.get("description"),
                metadata: r.get("metadata"),
                created_at: r.get("created_at"),
                updated_at: r.get("updated_at"),
            })
            .collect())
    }

    pub async fn delete_database_row(&self, name: &str) -> Result<bool, CortexError> {
        let result = sqlx::query("DELETE FROM _cortex_databases WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(upstream)?;
        Ok(result.rows_affected() > 0)
    }

    // -- collections ----------------------------------------------------

    /// Upsert a collection's serialised schema. Duplicate `(name,
    /// database_name)` pairs update in place rather than erroring, per the
    /// schema compiler's failure-mode note.
    pub async fn upsert_collection(&self, database_name: Option<&str>, schema: &CollectionSchema) -> Result<(), CortexError> {
        let serialized = serde_json::to_value(schema)
            .map_err(|e| CortexError::validation(format!("collection schema is not serialisable: {e}")))?;

        sqlx::query(
            "INSERT INTO _cortex_collections
                (name, database_name, schema, embedding_model, embedding_provider_id, chunk_size, chunk_overlap, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, now(), now())
             ON CONFLICT (name, database_name) DO UPDATE SET
                schema = EXCLUDED.schema,
                embedding_model = EXCLUDED.embedding_model,
                embedding_provider_id = EXCLUDED.embedding_provider_id,
                chunk_size = EXCLUDED.chunk_size,
                chunk_overlap = EXCLUDED.chunk_overlap,
                updated_at = now()",
        )
        .bind(&schema.name)
        .bind(database_name)
        .bind(serialized)
        .bind(&schema.config.embedding_model)
        .bind(schema.config.embedding_provider_id)
        .bind(schema.config.chunk_size as i32)
        .bind(schema.config.chunk_overlap as i32)
        .execute(&self.pool)
        .await
        .map_err(upstream)?;
        Ok(())
    }

    pub async fn get_collection(
        &self,
        database_name: Option<&str>,
        name: &str,
    ) -> Result<Option<CollectionSchema>, CortexError> {
        let row = sqlx::query(
            "SELECT schema FROM _cortex_collections WHERE name = $1 AND database_name IS NOT DISTINCT FROM $2",
        )
        .bind(name)
        .bind(database_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(upstream)?;

        row.map(|r| {
            let schema: serde_json::Value = r.get("schema");
            serde_json::from_value(schema).map_err(|e| CortexError::upstream(format!("corrupt collection schema row: {e}")))
        })
        .transpose()
    }

    pub async fn list_collections(&self, database_name: Option<&str>) -> Result<Vec<CollectionSchema>, CortexError> {
        let rows = sqlx::query("SELECT schema FROM _cortex_collections WHERE database_name IS NOT DISTINCT FROM $1 ORDER BY name")
            .bind(database_name)
            .fetch_all(&self.pool)
            .await
            .map_err(upstream)?;

        rows.into_iter()
            .map(|r| {
                let schema: serde_json::Value = r.get("schema");
                serde_json::from_value(schema).map_err(|e| CortexError::upstream(format!("corrupt collection schema row: {e}")))
            })
            .collect()
    }

    pub async fn delete_collection(&self, database_name: Option<&str>, name: &str) -> Result<bool, CortexError> {
        let result = sqlx::query("DELETE FROM _cortex_collections WHERE name = $1 AND database_name IS NOT DISTINCT FROM $2")
            .bind(name)
            .bind(database_name)
            .execute(&self.pool)
            .await
            .map_err(upstream)?;
        Ok(result.rows_affected() > 0)
    }

    // -- embedding providers ----------------------------------------------

    pub async fn insert_embedding_provider(&self, provider: &EmbeddingProvider) -> Result<(), CortexError> {
        sqlx::query(
            "INSERT INTO _cortex_embedding_providers (id, name, provider_type, api_key, embedding_model, metadata, enabled)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(provider.id)
        .bind(&provider.name)
        .bind(&provider.provider_type)
        .bind(&provider.api_key)
        .bind(&provider.embedding_model)
        .bind(&provider.metadata)
        .bind(provider.enabled)
        .execute(&self.pool)
        .await
        .map_err(upstream)?;
        Ok(())
    }

    pub async fn get_embedding_provider(&self, id: Uuid) -> Result<Option<EmbeddingProvider>, CortexError> {
        let row = sqlx::query(
            "SELECT id, name, provider_type, api_key, embedding_model, metadata, enabled FROM _cortex_embedding_providers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(upstream)?;
        Ok(row.map(row_to_provider))
    }

    pub async fn get_embedding_provider_by_name(&self, name: &str) -> Result<Option<EmbeddingProvider>, CortexError> {
        let row = sqlx::query(
            "SELECT id, name, provider_type, api_key, embedding_model, metadata, enabled FROM _cortex_embedding_providers WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(upstream)?;
        Ok(row.map(row_to_provider))
    }

    pub async fn list_embedding_providers(&self) -> Result<Vec<EmbeddingProvider>, CortexError> {
        let rows = sqlx::query(
            "SELECT id, name, provider_type, api_key, embedding_model, metadata, enabled FROM _cortex_embedding_providers ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(upstream)?;
        Ok(rows.into_iter().map(row_to_provider).collect())
    }

    pub async fn delete_embedding_provider(&self, id: Uuid) -> Result<bool, CortexError> {
        let result = sqlx::query("DELETE FROM _cortex_embedding_providers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(upstream)?;
        Ok(result.rows_affected() > 0)
    }

    // -- api keys (admin-facing listing beyond the ApiKeyRepository seam) --

    pub async fn list_api_keys(&self) -> Result<Vec<ApiKey>, CortexError> {
        let rows = sqlx::query(
            "SELECT id, key_hash, key_prefix, name, description, key_type, permissions,
                    created_at, created_by, last_used_at, expires_at, enabled
             FROM api_keys ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(upstream)?;
        rows.into_iter().map(row_to_api_key).collect()
    }

    pub async fn update_api_key(&self, id: Uuid, update: &cortex_core::ApiKeyUpdate) -> Result<Option<ApiKey>, CortexError> {
        let mut builder = sqlx::QueryBuilder::new("UPDATE api_keys SET ");
        let mut any = false;

        if let Some(name) = &update.name {
            builder.push("name = ").push_bind(name.clone());
            any = true;
        }
        if let Some(description) = &update.description {
            if any {
                builder.push(", ");
            }
            builder.push("description = ").push_bind(description.clone());
            any = true;
        }
        if let Some(databases) = &update.databases {
            if any {
                builder.push(", ");
            }
            let json = serde_json::to_value(databases).unwrap_or_default();
            builder.push("permissions = jsonb_set(permissions, '{databases}', ").push_bind(json).push(")");
            any = true;
        }
        if let Some(expires_at) = update.expires_at {
            if any {
                builder.push(", ");
            }
            builder.push("expires_at = ").push_bind(expires_at);
            any = true;
        }
        if let Some(enabled) = update.enabled {
            if any {
                builder.push(", ");
            }
            builder.push("enabled = ").push_bind(enabled);
            any = true;
        }

        if !any {
            return self.find_api_key_by_id(id).await;
        }

        builder.push(" WHERE id = ").push_bind(id);
        builder.build().execute(&self.pool).await.map_err(upstream)?;
        self.find_api_key_by_id(id).await
    }

    pub async fn find_api_key_by_id(&self, id: Uuid) -> Result<Option<ApiKey>, CortexError> {
        let row = sqlx::query(
            "SELECT id, key_hash, key_prefix, name, description, key_type, permissions,
                    created_at, created_by, last_used_at, expires_at, enabled
             FROM api_keys WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(upstream)?;
        row.map(row_to_api_key).transpose()
    }

    pub async fn delete_api_key(&self, id: Uuid) -> Result<bool, CortexError> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(upstream)?;
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_provider(row: sqlx::postgres::PgRow) -> EmbeddingProvider {
    EmbeddingProvider {
        id: row.get("id"),
        name: row.get("name"),
        provider_type: row.get("provider_type"),
        api_key: row.get("api_key"),
        embedding_model: row.get("embedding_model"),
        metadata: row.get("metadata"),
        enabled: row.get("enabled"),
    }
}

fn row_to_api_key(row: sqlx::postgres::PgRow) -> Result<ApiKey, CortexError> {
    let key_type_str: String = row.get("key_type");
    let key_type = match key_type_str.as_str() {
        "admin" => ApiKeyType::Admin,
        "database" => ApiKeyType::Database,
        "readonly" => ApiKeyType::Readonly,
        other => return Err(CortexError::upstream(format!("unrecognised api key type '{other}' in database"))),
    };
    let permissions_json: serde_json::Value = row.get("permissions");
    let permissions: ApiKeyPermissions =
        serde_json::from_value(permissions_json).map_err(|e| CortexError::upstream(format!("corrupt api key permissions: {e}")))?;

    Ok(ApiKey {
        id: row.get("id"),
        key_hash: row.get("key_hash"),
        key_prefix: row.get("key_prefix"),
        name: row.get("name"),
        description: row.get("description"),
        key_type,
        permissions,
        created_at: row.get("created_at"),
        created_by: row.get("created_by"),
        last_used_at: row.get("last_used_at"),
        expires_at: row.get("expires_at"),
        enabled: row.get("enabled"),
    })
}

fn key_type_str(key_type: ApiKeyType) -> &'static str {
    match key_type {
        ApiKeyType::Admin => "admin",
        ApiKeyType::Database => "database",
        ApiKeyType::Readonly => "readonly",
    }
}

#[async_trait]
impl ApiKeyRepository for ControlCatalog {
    async fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, CortexError> {
        let row = sqlx::query(
            "SELECT id, key_hash, key_prefix, name, description, key_type, permissions,
                    created_at, created_by, last_used_at, expires_at, enabled
             FROM api_keys WHERE key_hash = $1",
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(upstream)?;
        row.map(row_to_api_key).transpose()
    }

    async fn touch_last_used(&self, id: Uuid) -> Result<(), CortexError> {
        sqlx::query("UPDATE api_keys SET last_used_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(upstream)?;
        Ok(())
    }

    async fn count_enabled_admin_keys(&self) -> Result<i64, CortexError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM api_keys WHERE enabled AND (permissions->>'admin')::boolean")
            .fetch_one(&self.pool)
            .await
            .map_err(upstream)?;
        Ok(count)
    }

    async fn insert(&self, key: ApiKey) -> Result<(), CortexError> {
        let permissions = serde_json::to_value(&key.permissions)
            .map_err(|e| CortexError::validation(format!("api key permissions are not serialisable: {e}")))?;
        sqlx::query(
            "INSERT INTO api_keys
                (id, key_hash, key_prefix, name, description, key_type, permissions,
                 created_at, created_by, last_used_at, expires_at, enabled)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(key.id)
        .bind(&key.key_hash)
        .bind(&key.key_prefix)
        .bind(&key.name)
        .bind(&key.description)
        .bind(key_type_str(key.key_type))
        .bind(permissions)
        .bind(key.created_at)
        .bind(key.created_by)
        .bind(key.last_used_at)
        .bind(key.expires_at)
        .bind(key.enabled)
        .execute(&self.pool)
        .await
        .map_err(upstream)?;
        Ok(())
    }
}
