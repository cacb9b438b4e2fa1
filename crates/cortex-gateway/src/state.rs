use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use cortex_auth::AuthService;
use cortex_core::{CollectionSchema, CortexError};
use cortex_embeddings::{EmbeddingCache, EmbeddingService, GeminiEmbeddingService, DEFAULT_PROVIDER_KEY};
use cortex_extract::VisionService;
use cortex_store_object::ObjectStore;
use cortex_store_postgres::ControlCatalog;
use cortex_store_qdrant::QdrantStore;
use sqlx::postgres::PgPool;

use crate::config::Config;

/// Everything a request handler needs, constructed once at startup and
/// threaded through `axum::extract::State` — the redesign called out for
/// the source's process-wide lazily-initialised globals. Cheaply `Clone`:
/// every field is an `Arc` (or, for the database-pool registry, an `Arc`
/// around a `Mutex`).
#[derive(Clone)]
pub struct Services {
    pub config: Arc<Config>,
    pub control: Arc<ControlCatalog>,
    pub object_store: Arc<ObjectStore>,
    pub vector_store: Arc<QdrantStore>,
    pub embeddings: Arc<EmbeddingCache>,
    pub auth: Arc<AuthService>,
    pub vision: Option<Arc<dyn VisionService>>,
    database_pools: Arc<Mutex<HashMap<String, PgPool>>>,
}

impl AsRef<AuthService> for Services {
    fn as_ref(&self) -> &AuthService {
        &self.auth
    }
}

impl Services {
    pub fn new(
        config: Arc<Config>,
        control: ControlCatalog,
        object_store: ObjectStore,
        vector_store: QdrantStore,
        embeddings: EmbeddingCache,
        auth: AuthService,
        vision: Option<Arc<dyn VisionService>>,
    ) -> Self {
        Services {
            config,
            control: Arc::new(control),
            object_store: Arc::new(object_store),
            vector_store: Arc::new(vector_store),
            embeddings: Arc::new(embeddings),
            auth: Arc::new(auth),
            vision,
            database_pools: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Resolve the relational pool for a record/collection operation:
    /// the control pool for `database = None`, a lazily-connected and
    /// cached pool for a named database.
    pub async fn pool_for(&self, database: Option<&str>) -> Result<PgPool, CortexError> {
        let Some(name) = database else {
            return Ok(self.control.pool().clone());
        };

        if let Some(pool) = self.database_pools.lock().expect("database pool registry lock poisoned").get(name) {
            return Ok(pool.clone());
        }

        let pool = cortex_store_postgres::connect_named_database(
            &self.config.maintenance_database_url,
            name,
            self.config.postgres_max_connections,
        )
        .await?;

        self.database_pools
            .lock()
            .expect("database pool registry lock poisoned")
            .insert(name.to_string(), pool.clone());
        Ok(pool)
    }

    /// Drop a cached pool, e.g. after the database it points at is deleted.
    pub fn forget_pool(&self, database: &str) {
        self.database_pools.lock().expect("database pool registry lock poisoned").remove(database);
    }

    /// Resolve (constructing and caching on first use) the embedding
    /// client bound to a collection: its explicit `embedding_provider_id`
    /// if set, otherwise the instance-wide default provider.
    pub async fn embedding_service_for(&self, schema: &CollectionSchema) -> Result<Arc<dyn EmbeddingService>, CortexError> {
        let provider = match schema.config.embedding_provider_id {
            Some(id) => self
                .control
                .get_embedding_provider(id)
                .await?
                .ok_or_else(|| CortexError::not_found(format!("embedding provider '{id}' not found")))?,
            None => {
                let providers = self.control.list_embedding_providers().await?;
                providers
                    .into_iter()
                    .find(|p| p.enabled)
                    .ok_or_else(|| CortexError::validation("no embedding provider configured".to_string()))?
            }
        };

        if !provider.enabled {
            return Err(CortexError::validation(format!("embedding provider '{}' is disabled", provider.name)));
        }

        let cache_key = schema
            .config
            .embedding_provider_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| DEFAULT_PROVIDER_KEY.to_string());

        self.embeddings
            .get_or_create(&cache_key, || async move {
                Ok(Arc::new(GeminiEmbeddingService::new(provider.api_key, provider.embedding_model)) as Arc<dyn EmbeddingService>)
            })
            .await
    }
}
