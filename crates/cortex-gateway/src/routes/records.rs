use std::collections::HashMap;

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::Json;
use cortex_auth::{check_database_access, check_readonly, CurrentApiKey};
use cortex_core::{CollectionSchema, CortexError, FieldType};
use cortex_schema::compile_ddl;
use serde::Serialize;
use uuid::Uuid;

use crate::error::GatewayResult;
use crate::multipart::parse_record_input;
use crate::pipeline::{self, IngestOutcome};
use crate::routes::find_collection;
use crate::search::attach_file_urls;
use crate::state::Services;

#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub id: Uuid,
    pub vectors_created: usize,
    pub files: HashMap<String, String>,
}

impl From<IngestOutcome> for IngestResponse {
    fn from(outcome: IngestOutcome) -> Self {
        IngestResponse {
            id: outcome.id,
            vectors_created: outcome.vectors_created,
            files: outcome.files,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordResponse {
    pub id: Uuid,
    pub record: serde_json::Map<String, serde_json::Value>,
    pub files: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct VectorPointView {
    pub id: Uuid,
    pub field: String,
    pub chunk_index: i64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VectorsResponse {
    pub vectors: Vec<VectorPointView>,
}

fn files_from_record(schema: &CollectionSchema, record: &serde_json::Map<String, serde_json::Value>) -> HashMap<String, String> {
    let mut files = HashMap::new();
    for field in &schema.fields {
        if field.field_type != FieldType::File {
            continue;
        }
        if let Some(url) = record.get(&field.name).and_then(|v| v.as_str()) {
            files.insert(field.name.clone(), url.to_string());
        }
    }
    files
}

pub async fn create_record(
    State(services): State<Services>,
    CurrentApiKey(key): CurrentApiKey,
    Path(collection): Path<String>,
    request: Request,
) -> GatewayResult<(StatusCode, Json<IngestResponse>)> {
    let schema = find_collection(&services, &collection).await?;
    if let Some(database) = &schema.database {
        check_database_access(&key, database)?;
    }
    check_readonly(&key, "create")?;

    let input = parse_record_input(request).await?;
    let outcome = pipeline::create_record(&services, schema.database.as_deref(), &schema, input).await?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

pub async fn get_record(
    State(services): State<Services>,
    CurrentApiKey(key): CurrentApiKey,
    Path((collection, id)): Path<(String, Uuid)>,
) -> GatewayResult<Json<RecordResponse>> {
    let schema = find_collection(&services, &collection).await?;
    if let Some(database) = &schema.database {
        check_database_access(&key, database)?;
    }
    check_readonly(&key, "get")?;

    let pool = services.pool_for(schema.database.as_deref()).await?;
    let plan = compile_ddl(&schema);
    let mut record = cortex_store_postgres::get_record(&pool, &plan, id)
        .await?
        .ok_or_else(|| CortexError::not_found(format!("record '{id}' not found")))?;

    attach_file_urls(&services, &schema, &mut record).await;
    let files = files_from_record(&schema, &record);

    Ok(Json(RecordResponse { id, record, files }))
}

pub async fn update_record(
    State(services): State<Services>,
    CurrentApiKey(key): CurrentApiKey,
    Path((collection, id)): Path<(String, Uuid)>,
    request: Request,
) -> GatewayResult<Json<IngestResponse>> {
    let schema = find_collection(&services, &collection).await?;
    if let Some(database) = &schema.database {
        check_database_access(&key, database)?;
    }
    check_readonly(&key, "update")?;

    let input = parse_record_input(request).await?;
    let outcome = pipeline::update_record(&services, schema.database.as_deref(), &schema, id, input).await?;
    Ok(Json(outcome.into()))
}

pub async fn delete_record(
    State(services): State<Services>,
    CurrentApiKey(key): CurrentApiKey,
    Path((collection, id)): Path<(String, Uuid)>,
) -> GatewayResult<Json<DeleteResponse>> {
    let schema = find_collection(&services, &collection).await?;
    if let Some(database) = &schema.database {
        check_database_access(&key, database)?;
    }
    check_readonly(&key, "delete")?;

    pipeline::delete_record(&services, schema.database.as_deref(), &schema, id).await?;
    Ok(Json(DeleteResponse { status: "deleted" }))
}

pub async fn get_record_vectors(
    State(services): State<Services>,
    CurrentApiKey(key): CurrentApiKey,
    Path((collection, id)): Path<(String, Uuid)>,
) -> GatewayResult<Json<VectorsResponse>> {
    let schema = find_collection(&services, &collection).await?;
    if let Some(database) = &schema.database {
        check_database_access(&key, database)?;
    }
    check_readonly(&key, "get")?;

    if !schema.requires_vectors() {
        return Ok(Json(VectorsResponse { vectors: Vec::new() }));
    }

    let collection_name = schema.qdrant_collection_name();
    let hits = services.vector_store.list_by_record_id(&collection_name, id).await?;

    let vectors = hits
        .into_iter()
        .map(|hit| VectorPointView {
            id: hit.id,
            field: hit.payload.get("field").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
            chunk_index: hit.payload.get("chunk_index").and_then(|v| v.as_i64()).unwrap_or(0),
            text: hit.payload.get("text").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        })
        .collect();

    Ok(Json(VectorsResponse { vectors }))
}
