use std::sync::Arc;

use cortex_auth::AuthService;
use cortex_embeddings::EmbeddingCache;
use cortex_extract::{GeminiVisionService, VisionService};
use cortex_gateway::config::Config;
use cortex_gateway::state::Services;
use cortex_migrate::MigrationRunner;
use cortex_store_object::{ObjectStore, ObjectStoreConfig};
use cortex_store_postgres::ControlCatalog;
use cortex_store_qdrant::QdrantStore;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = Config::from_env();

    info!(host = %config.host, port = config.port, "starting CortexDB gateway");

    let control_pool = cortex_store_postgres::connect_pool(&config.control_database_url, config.postgres_max_connections).await?;

    info!("running pending control-catalog migrations");
    let outcomes = MigrationRunner::new(control_pool.clone()).run_pending().await?;
    for outcome in &outcomes {
        if outcome.applied {
            info!(filename = %outcome.filename, "migration applied");
        } else if let Some(error) = &outcome.error {
            tracing::error!(filename = %outcome.filename, error, "migration failed");
        }
    }

    let control = ControlCatalog::new(control_pool);

    let vector_store = QdrantStore::connect(&config.qdrant_url).await?;

    let object_store = ObjectStore::connect(&ObjectStoreConfig {
        region: config.object_store_region.clone(),
        endpoint: config.object_store_endpoint.clone(),
        access_key_id: config.object_store_access_key_id.clone(),
        secret_access_key: config.object_store_secret_access_key.clone(),
    })
    .await?;

    cortex_auth::bootstrap_admin_key(&control, &config.host, config.port).await?;

    let auth = AuthService::with_cache_ttl(
        Arc::new(control.clone()) as Arc<dyn cortex_auth::ApiKeyRepository>,
        config.api_key_cache_ttl_seconds,
    );

    let vision: Option<Arc<dyn VisionService>> = match (
        std::env::var("CORTEXDB_VISION_API_KEY").ok().filter(|v| !v.is_empty()),
        std::env::var("CORTEXDB_VISION_MODEL").ok(),
    ) {
        (Some(api_key), model) => Some(Arc::new(GeminiVisionService::new(api_key, model.unwrap_or_else(|| "gemini-1.5-flash".to_string())))),
        (None, _) => None,
    };

    let services = Services::new(Arc::new(config.clone()), control, object_store, vector_store, EmbeddingCache::new(), auth, vision);

    let app = cortex_gateway::build_router(services);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!(address = %listener.local_addr()?, "CortexDB gateway listening");
    axum::serve(listener, app).await?;

    Ok(())
}
