use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use cortex_auth::{check_database_access, check_manage_collections, CurrentApiKey};
use cortex_core::CortexError;
use cortex_schema::{compile_ddl, compile_vector_spec};
use serde::Serialize;

use crate::error::GatewayResult;
use crate::routes::find_collection;
use crate::state::Services;

#[derive(Debug, Clone, Serialize)]
pub struct CollectionCreateResponse {
    pub status: &'static str,
    pub collection: String,
    pub postgres_table: String,
    pub qdrant_collection: Option<String>,
    pub minio_bucket: Option<String>,
}

pub async fn create_collection(
    State(services): State<Services>,
    CurrentApiKey(key): CurrentApiKey,
    body: String,
) -> GatewayResult<(StatusCode, Json<CollectionCreateResponse>)> {
    let schema = cortex_schema::parse_schema(&body)?;
    check_manage_collections(&key, schema.database.as_deref())?;

    let pool = services.pool_for(schema.database.as_deref()).await?;
    let plan = compile_ddl(&schema);
    cortex_store_postgres::execute_ddl(&pool, &plan, &schema).await?;

    let qdrant_collection = if schema.requires_vectors() {
        let embedder = services.embedding_service_for(&schema).await?;
        let dim = embedder.dim().await?;
        let collection_name = schema.qdrant_collection_name();
        services.vector_store.ensure_collection(&collection_name, dim as u64).await?;
        if let Some(spec) = compile_vector_spec(&schema) {
            services.vector_store.ensure_payload_indexes(&collection_name, &spec.payload_indexes).await?;
        }
        Some(collection_name)
    } else {
        None
    };

    let minio_bucket = if schema.requires_blob_storage() {
        let bucket = schema.bucket_name();
        services.object_store.ensure_bucket(&bucket).await?;
        Some(bucket)
    } else {
        None
    };

    services.control.upsert_collection(schema.database.as_deref(), &schema).await?;

    Ok((
        StatusCode::CREATED,
        Json(CollectionCreateResponse {
            status: "created",
            collection: schema.name.clone(),
            postgres_table: plan.primary_table.name.clone(),
            qdrant_collection,
            minio_bucket,
        }),
    ))
}

pub async fn list_collections(
    State(services): State<Services>,
    CurrentApiKey(_key): CurrentApiKey,
) -> GatewayResult<Json<Vec<cortex_core::CollectionSchema>>> {
    let mut all = services.control.list_collections(None).await?;
    for database in services.control.list_databases().await? {
        all.extend(services.control.list_collections(Some(&database.name)).await?);
    }
    Ok(Json(all))
}

pub async fn get_collection(
    State(services): State<Services>,
    CurrentApiKey(_key): CurrentApiKey,
    Path(name): Path<String>,
) -> GatewayResult<Json<cortex_core::CollectionSchema>> {
    let schema = find_collection(&services, &name).await?;
    Ok(Json(schema))
}

pub async fn delete_collection(
    State(services): State<Services>,
    CurrentApiKey(key): CurrentApiKey,
    Path(name): Path<String>,
) -> GatewayResult<StatusCode> {
    let schema = find_collection(&services, &name).await?;
    check_manage_collections(&key, schema.database.as_deref())?;
    if let Some(database) = &schema.database {
        check_database_access(&key, database)?;
    }

    let pool = services.pool_for(schema.database.as_deref()).await?;
    let plan = compile_ddl(&schema);
    cortex_store_postgres::drop_collection_tables(&pool, &plan).await?;

    if schema.requires_vectors() {
        let collection_name = schema.qdrant_collection_name();
        if let Err(err) = services.vector_store.drop_collection(&collection_name).await {
            tracing::warn!(collection = %collection_name, error = %err, "failed to drop vector collection");
        }
    }

    if schema.requires_blob_storage() {
        let bucket = schema.bucket_name();
        if let Err(err) = services.object_store.delete_bucket(&bucket).await {
            tracing::warn!(bucket = %bucket, error = %err, "failed to delete object store bucket");
        }
    }

    let deleted = services.control.delete_collection(schema.database.as_deref(), &name).await?;
    if !deleted {
        return Err(CortexError::not_found(format!("collection '{name}' not found")).into());
    }

    Ok(StatusCode::NO_CONTENT)
}
