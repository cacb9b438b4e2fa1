use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use cortex_auth::{check_manage_databases, CurrentApiKey};
use cortex_core::{valid_identifier, CortexError, Database, DatabaseCreate};
use uuid::Uuid;

use crate::error::GatewayResult;
use crate::state::Services;

pub async fn create_database(
    State(services): State<Services>,
    CurrentApiKey(key): CurrentApiKey,
    Json(input): Json<DatabaseCreate>,
) -> GatewayResult<(StatusCode, Json<Database>)> {
    check_manage_databases(&key)?;

    if !valid_identifier(&input.name) {
        return Err(CortexError::validation(format!(
            "database name '{}' must match ^[A-Za-z_][A-Za-z0-9_]*$",
            input.name
        ))
        .into());
    }

    if services.control.get_database(&input.name).await?.is_some() {
        return Err(CortexError::Conflict(format!("database '{}' already exists", input.name)).into());
    }

    cortex_store_postgres::create_database(&services.config.maintenance_database_url, &input.name).await?;

    let now = Utc::now();
    let database = Database {
        id: Uuid::new_v4(),
        name: input.name,
        description: input.description,
        metadata: input.metadata,
        created_at: now,
        updated_at: now,
    };
    services.control.insert_database(&database).await?;

    Ok((StatusCode::CREATED, Json(database)))
}

pub async fn list_databases(
    State(services): State<Services>,
    CurrentApiKey(_key): CurrentApiKey,
) -> GatewayResult<Json<Vec<Database>>> {
    let databases = services.control.list_databases().await?;
    Ok(Json(databases))
}

pub async fn get_database(
    State(services): State<Services>,
    CurrentApiKey(_key): CurrentApiKey,
    Path(name): Path<String>,
) -> GatewayResult<Json<Database>> {
    let database = services
        .control
        .get_database(&name)
        .await?
        .ok_or_else(|| CortexError::not_found(format!("database '{name}' not found")))?;
    Ok(Json(database))
}

pub async fn delete_database(
    State(services): State<Services>,
    CurrentApiKey(key): CurrentApiKey,
    Path(name): Path<String>,
) -> GatewayResult<StatusCode> {
    check_manage_databases(&key)?;

    services
        .control
        .get_database(&name)
        .await?
        .ok_or_else(|| CortexError::not_found(format!("database '{name}' not found")))?;

    cortex_store_postgres::delete_database(&services.config.maintenance_database_url, &name).await?;
    services.control.delete_database_row(&name).await?;
    services.forget_pool(&name);

    Ok(StatusCode::NO_CONTENT)
}
