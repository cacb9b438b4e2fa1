use axum::extract::{Path, State};
use axum::Json;
use cortex_auth::{check_database_access, check_readonly, CurrentApiKey};
use serde::Deserialize;

use crate::config::{clamp_query_limit, clamp_search_limit};
use crate::error::GatewayResult;
use crate::routes::find_collection;
use crate::search::{hybrid_search, query_records, QueryResponse, SearchResponse};
use crate::state::Services;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub filters: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub limit: Option<i64>,
}

pub async fn search_collection(
    State(services): State<Services>,
    CurrentApiKey(key): CurrentApiKey,
    Path(collection): Path<String>,
    Json(body): Json<SearchRequest>,
) -> GatewayResult<Json<SearchResponse>> {
    let schema = find_collection(&services, &collection).await?;
    if let Some(database) = &schema.database {
        check_database_access(&key, database)?;
    }
    check_readonly(&key, "search")?;

    let limit = clamp_search_limit(body.limit);
    let response = hybrid_search(&services, schema.database.as_deref(), &schema, &body.query, body.filters.as_ref(), limit).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub filters: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

pub async fn query_collection(
    State(services): State<Services>,
    CurrentApiKey(key): CurrentApiKey,
    Path(collection): Path<String>,
    Json(body): Json<QueryRequest>,
) -> GatewayResult<Json<QueryResponse>> {
    let schema = find_collection(&services, &collection).await?;
    if let Some(database) = &schema.database {
        check_database_access(&key, database)?;
    }
    check_readonly(&key, "list")?;

    let limit = clamp_query_limit(body.limit);
    let offset = body.offset.unwrap_or(0).max(0);
    let response = query_records(&services, schema.database.as_deref(), &schema, body.filters.as_ref(), limit, offset).await?;
    Ok(Json(response))
}
