use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use cortex_auth::{check_manage_providers, CurrentApiKey};
use cortex_core::{CortexError, EmbeddingProvider, EmbeddingProviderCreate};
use uuid::Uuid;

use crate::error::GatewayResult;
use crate::state::Services;

pub async fn create_provider(
    State(services): State<Services>,
    CurrentApiKey(key): CurrentApiKey,
    Json(input): Json<EmbeddingProviderCreate>,
) -> GatewayResult<(StatusCode, Json<EmbeddingProvider>)> {
    check_manage_providers(&key)?;

    if services.control.get_embedding_provider_by_name(&input.name).await?.is_some() {
        return Err(CortexError::Conflict(format!("embedding provider '{}' already exists", input.name)).into());
    }

    let provider = EmbeddingProvider {
        id: Uuid::new_v4(),
        name: input.name,
        provider_type: input.provider,
        api_key: input.api_key,
        embedding_model: input.embedding_model,
        metadata: input.metadata,
        enabled: true,
    };

    services.control.insert_embedding_provider(&provider).await?;

    Ok((StatusCode::CREATED, Json(provider)))
}

pub async fn list_providers(
    State(services): State<Services>,
    CurrentApiKey(_key): CurrentApiKey,
) -> GatewayResult<Json<Vec<EmbeddingProvider>>> {
    let providers = services.control.list_embedding_providers().await?;
    Ok(Json(providers))
}

pub async fn delete_provider(
    State(services): State<Services>,
    CurrentApiKey(key): CurrentApiKey,
    Path(id): Path<Uuid>,
) -> GatewayResult<StatusCode> {
    check_manage_providers(&key)?;

    let deleted = services.control.delete_embedding_provider(id).await?;
    if !deleted {
        return Err(CortexError::not_found(format!("embedding provider '{id}' not found")).into());
    }

    services.embeddings.invalidate(&id.to_string());
    services.embeddings.invalidate(cortex_embeddings::DEFAULT_PROVIDER_KEY);

    Ok(StatusCode::NO_CONTENT)
}
