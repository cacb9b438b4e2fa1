use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use cortex_auth::{check_manage_keys, generate_api_key, ApiKeyRepository, CurrentApiKey};
use cortex_core::{ApiKey, ApiKeyCreate, ApiKeyCreated, ApiKeyPermissions, ApiKeyResponse, ApiKeyType, ApiKeyUpdate, CortexError};
use uuid::Uuid;

use crate::error::GatewayResult;
use crate::state::Services;

fn permissions_for(key_type: ApiKeyType, databases: Vec<String>) -> ApiKeyPermissions {
    match key_type {
        ApiKeyType::Admin => ApiKeyPermissions::admin_full(),
        ApiKeyType::Database => ApiKeyPermissions::database_scoped(databases),
        ApiKeyType::Readonly => ApiKeyPermissions::readonly_scoped(databases),
    }
}

pub async fn create_api_key(
    State(services): State<Services>,
    CurrentApiKey(key): CurrentApiKey,
    Json(input): Json<ApiKeyCreate>,
) -> GatewayResult<(StatusCode, Json<ApiKeyCreated>)> {
    check_manage_keys(&key)?;

    let databases = input.databases.clone().unwrap_or_default();
    let permissions = permissions_for(input.key_type, databases);
    let (plaintext, key_hash, key_prefix) = generate_api_key(input.key_type);

    let created = ApiKey {
        id: Uuid::new_v4(),
        key_hash,
        key_prefix: key_prefix.clone(),
        name: input.name.clone(),
        description: input.description.clone(),
        key_type: input.key_type,
        permissions: permissions.clone(),
        created_at: Utc::now(),
        created_by: Some(key.id),
        last_used_at: None,
        expires_at: input.expires_at,
        enabled: true,
    };

    services.control.insert(created.clone()).await?;

    let response = ApiKeyCreated {
        id: created.id,
        key: plaintext,
        key_prefix: created.key_prefix,
        name: created.name,
        key_type: created.key_type,
        permissions: created.permissions,
        created_at: created.created_at,
        expires_at: created.expires_at,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn list_api_keys(
    State(services): State<Services>,
    CurrentApiKey(key): CurrentApiKey,
) -> GatewayResult<Json<Vec<ApiKeyResponse>>> {
    check_manage_keys(&key)?;
    let keys = services.control.list_api_keys().await?;
    Ok(Json(keys.into_iter().map(ApiKeyResponse::from).collect()))
}

pub async fn get_api_key(
    State(services): State<Services>,
    CurrentApiKey(key): CurrentApiKey,
    Path(id): Path<Uuid>,
) -> GatewayResult<Json<ApiKeyResponse>> {
    check_manage_keys(&key)?;
    let found = services
        .control
        .find_api_key_by_id(id)
        .await?
        .ok_or_else(|| CortexError::not_found(format!("api key '{id}' not found")))?;
    Ok(Json(found.into()))
}

pub async fn update_api_key(
    State(services): State<Services>,
    CurrentApiKey(key): CurrentApiKey,
    Path(id): Path<Uuid>,
    Json(input): Json<ApiKeyUpdate>,
) -> GatewayResult<Json<ApiKeyResponse>> {
    check_manage_keys(&key)?;
    let updated = services
        .control
        .update_api_key(id, &input)
        .await?
        .ok_or_else(|| CortexError::not_found(format!("api key '{id}' not found")))?;
    Ok(Json(updated.into()))
}

pub async fn delete_api_key(
    State(services): State<Services>,
    CurrentApiKey(key): CurrentApiKey,
    Path(id): Path<Uuid>,
) -> GatewayResult<StatusCode> {
    check_manage_keys(&key)?;
    let deleted = services.control.delete_api_key(id).await?;
    if !deleted {
        return Err(CortexError::not_found(format!("api key '{id}' not found")).into());
    }
    Ok(StatusCode::NO_CONTENT)
}
