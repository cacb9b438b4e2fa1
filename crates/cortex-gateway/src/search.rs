//! Hybrid (vector + relational) search and plain filtered query, §4.5/§6.

use std::collections::HashMap;

use cortex_core::{parse_filters, CollectionSchema, CortexError, FieldType};
use cortex_schema::compile_ddl;
use serde::Serialize;
use uuid::Uuid;

use crate::state::Services;

const OVER_FETCH_FACTOR: u64 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct Highlight {
    pub field: String,
    pub chunk_index: i64,
    pub text: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub record: serde_json::Map<String, serde_json::Value>,
    pub score: f32,
    pub highlights: Vec<Highlight>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total: usize,
    pub took_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub results: Vec<serde_json::Map<String, serde_json::Value>>,
    pub total: i64,
}

struct Aggregated {
    record_id: Uuid,
    score: f32,
    highlights: Vec<Highlight>,
}

fn aggregate_by_record(hits: Vec<cortex_store_qdrant::SearchHit>) -> Vec<Aggregated> {
    let mut by_record: HashMap<Uuid, Aggregated> = HashMap::new();

    for hit in hits {
        let Some(record_id) = hit
            .payload
            .get("record_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
        else {
            continue;
        };

        let field = hit.payload.get("field").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let chunk_index = hit.payload.get("chunk_index").and_then(|v| v.as_i64()).unwrap_or(0);
        let text = hit.payload.get("text").and_then(|v| v.as_str()).unwrap_or_default().to_string();

        let entry = by_record.entry(record_id).or_insert_with(|| Aggregated {
            record_id,
            score: f32::MIN,
            highlights: Vec::new(),
        });
        entry.score = entry.score.max(hit.score);
        entry.highlights.push(Highlight {
            field,
            chunk_index,
            text,
            score: hit.score,
        });
    }

    let mut aggregated: Vec<Aggregated> = by_record.into_values().collect();
    aggregated.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    aggregated
}

/// Attach a presigned GET URL to every file field present on `record`,
/// degrading to `null` (never the raw path) on presign failure, per the
/// ingestion-wide presign normalization.
pub(crate) async fn attach_file_urls(
    services: &Services,
    schema: &CollectionSchema,
    record: &mut serde_json::Map<String, serde_json::Value>,
) {
    if !schema.requires_blob_storage() {
        return;
    }
    let bucket = schema.bucket_name();

    for field in &schema.fields {
        if field.field_type != FieldType::File {
            continue;
        }
        let Some(path) = record.get(&field.name).and_then(|v| v.as_str()).map(str::to_string) else {
            continue;
        };

        let url = services
            .object_store
            .presigned_get_url(&bucket, &path, services.config.presign_ttl_seconds)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(field = %field.name, path = %path, error = %err, "presign failed, returning null url");
                String::new()
            });

        record.insert(
            field.name.clone(),
            if url.is_empty() { serde_json::Value::Null } else { serde_json::Value::String(url) },
        );
    }
}

pub async fn hybrid_search(
    services: &Services,
    database: Option<&str>,
    schema: &CollectionSchema,
    query: &str,
    filters: Option<&serde_json::Map<String, serde_json::Value>>,
    limit: i64,
) -> Result<SearchResponse, CortexError> {
    let started = std::time::Instant::now();

    if !schema.requires_vectors() {
        return Err(CortexError::validation(format!("collection '{}' has no vector collection", schema.name)));
    }

    let clauses = match filters {
        Some(raw) => parse_filters(raw)?,
        None => Vec::new(),
    };
    // $ne is not representable at the vector layer; it's applied as a
    // post-filter against the hydrated relational rows instead.
    let (vector_clauses, post_clauses): (Vec<_>, Vec<_>) =
        clauses.into_iter().partition(|c| c.op != cortex_core::FilterOp::Ne);

    let embedder = services.embedding_service_for(schema).await?;
    let query_vector = embedder.embed_text(query).await?;

    let collection_name = schema.qdrant_collection_name();
    let over_fetch = (limit.max(1) as u64) * OVER_FETCH_FACTOR;
    let hits = services.vector_store.search(&collection_name, query_vector, over_fetch, &vector_clauses).await?;

    let mut aggregated = aggregate_by_record(hits);
    aggregated.truncate(limit.max(0) as usize);

    let ids: Vec<Uuid> = aggregated.iter().map(|a| a.record_id).collect();

    let pool = services.pool_for(database).await?;
    let plan = compile_ddl(schema);
    let rows = cortex_store_postgres::get_records_by_ids(&pool, &plan, &ids).await?;
    let rows_by_id: HashMap<Uuid, serde_json::Map<String, serde_json::Value>> = rows
        .into_iter()
        .filter_map(|row| {
            let id = row.get("id").and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok())?;
            Some((id, row))
        })
        .collect();

    let mut results = Vec::with_capacity(aggregated.len());
    for agg in aggregated {
        let Some(mut record) = rows_by_id.get(&agg.record_id).cloned() else {
            continue;
        };

        if !post_clauses.is_empty() && !passes_post_filters(&record, &post_clauses) {
            continue;
        }

        attach_file_urls(services, schema, &mut record).await;

        results.push(SearchResult {
            record,
            score: agg.score,
            highlights: agg.highlights,
        });
    }

    Ok(SearchResponse {
        total: results.len(),
        results,
        took_ms: started.elapsed().as_millis(),
    })
}

fn passes_post_filters(record: &serde_json::Map<String, serde_json::Value>, clauses: &[cortex_core::FilterClause]) -> bool {
    clauses.iter().all(|clause| {
        let actual = record.get(&clause.field);
        match clause.op {
            cortex_core::FilterOp::Ne => actual != Some(&clause.value),
            _ => true,
        }
    })
}

/// Plain filtered listing, `POST /collections/{c}/query`: no embedding, no
/// vector store involvement, relational-only.
pub async fn query_records(
    services: &Services,
    database: Option<&str>,
    schema: &CollectionSchema,
    filters: Option<&serde_json::Map<String, serde_json::Value>>,
    limit: i64,
    offset: i64,
) -> Result<QueryResponse, CortexError> {
    let clauses = match filters {
        Some(raw) => parse_filters(raw)?,
        None => Vec::new(),
    };

    let pool = services.pool_for(database).await?;
    let plan = compile_ddl(schema);
    let (mut records, total) = cortex_store_postgres::list_records(&pool, &plan, &clauses, limit, offset).await?;

    for record in &mut records {
        attach_file_urls(services, schema, record).await;
    }

    Ok(QueryResponse { results: records, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_store_qdrant::SearchHit;
    use serde_json::json;

    fn hit(record_id: Uuid, field: &str, chunk_index: i64, text: &str, score: f32) -> SearchHit {
        let mut payload = serde_json::Map::new();
        payload.insert("record_id".to_string(), json!(record_id.to_string()));
        payload.insert("field".to_string(), json!(field));
        payload.insert("chunk_index".to_string(), json!(chunk_index));
        payload.insert("text".to_string(), json!(text));
        SearchHit { id: Uuid::new_v4(), score, payload }
    }

    #[test]
    fn aggregation_takes_max_score_per_record_and_orders_descending() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let hits = vec![
            hit(a, "content", 0, "a chunk 0", 0.5),
            hit(a, "content", 1, "a chunk 1", 0.9),
            hit(b, "content", 0, "b chunk 0", 0.7),
        ];

        let aggregated = aggregate_by_record(hits);
        assert_eq!(aggregated.len(), 2);
        assert_eq!(aggregated[0].record_id, a);
        assert_eq!(aggregated[0].score, 0.9);
        assert_eq!(aggregated[0].highlights.len(), 2);
        assert_eq!(aggregated[1].record_id, b);
        assert_eq!(aggregated[1].score, 0.7);
    }

    #[test]
    fn hits_with_unparsable_record_id_are_skipped() {
        let mut payload = serde_json::Map::new();
        payload.insert("field".to_string(), json!("content"));
        let bad_hit = SearchHit { id: Uuid::new_v4(), score: 1.0, payload };
        let aggregated = aggregate_by_record(vec![bad_hit]);
        assert!(aggregated.is_empty());
    }
}
