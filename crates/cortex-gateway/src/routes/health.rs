use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::Services;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Plain liveness: the process is up and serving requests. No dependency
/// is checked here — that's what `/health/all` is for.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreHealth {
    pub status: &'static str,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthAllResponse {
    pub status: &'static str,
    pub details: StoreHealthDetails,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreHealthDetails {
    pub postgres: StoreHealth,
    pub qdrant: StoreHealth,
    pub object_store: StoreHealth,
}

fn store_health(result: Result<(), cortex_core::CortexError>) -> StoreHealth {
    match result {
        Ok(()) => StoreHealth { status: "ok", error: None },
        Err(err) => StoreHealth {
            status: "error",
            error: Some(err.to_string()),
        },
    }
}

/// Liveness of every backing store the gateway depends on: the control
/// Postgres pool, Qdrant, and the object store. Reports per-store detail
/// rather than failing the whole request on one store's outage.
pub async fn health_all(State(services): State<Services>) -> Json<HealthAllResponse> {
    let postgres = store_health(
        sqlx::query("SELECT 1")
            .execute(services.control.pool())
            .await
            .map(|_| ())
            .map_err(|e| cortex_core::CortexError::upstream(format!("postgres error: {e}"))),
    );
    let qdrant = store_health(services.vector_store.health_check().await);
    let object_store = store_health(services.object_store.health_check().await);

    let all_ok = postgres.status == "ok" && qdrant.status == "ok" && object_store.status == "ok";

    Json(HealthAllResponse {
        status: if all_ok { "ok" } else { "degraded" },
        details: StoreHealthDetails {
            postgres,
            qdrant,
            object_store,
        },
    })
}
