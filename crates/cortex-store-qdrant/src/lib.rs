use std::sync::Arc;

use cortex_core::{CortexError, FilterClause, FilterOp};
use cortex_schema::{PayloadFieldKind, PayloadIndexSpec};
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder, DeletePointsBuilder, Distance,
    FieldType as QdrantFieldType, Filter, PointStruct, Range, ScrollPointsBuilder, SearchPointsBuilder,
    UpsertPointsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use uuid::Uuid;

/// One point to upsert: the deterministic vector-point id from
/// `cortex_core::vector_point_id`, the embedding, and the flat payload
/// (record_id/collection/field/chunk_index plus any `vector_payload`
/// fields).
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: Uuid,
    pub vector: Vec<f32>,
    pub payload: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: Uuid,
    pub score: f32,
    pub payload: serde_json::Map<String, serde_json::Value>,
}

#[derive(Clone)]
pub struct QdrantStore {
    client: Arc<Qdrant>,
}

fn upstream(e: impl std::fmt::Display) -> CortexError {
    CortexError::upstream(format!("qdrant error: {e}"))
}

impl QdrantStore {
    pub async fn connect(url: &str) -> Result<Self, CortexError> {
        let client = Qdrant::from_url(url).build().map_err(upstream)?;
        Ok(QdrantStore { client: Arc::new(client) })
    }

    /// Create `collection` with a single cosine-distance dense vector of
    /// `dimension` if it does not already exist. Idempotent: a collection
    /// that is already present is left untouched.
    pub async fn ensure_collection(&self, collection: &str, dimension: u64) -> Result<(), CortexError> {
        let exists = self.client.collection_exists(collection).await.map_err(upstream)?;
        if exists {
            return Ok(());
        }

        self.client
            .create_collection(CreateCollectionBuilder::new(collection).vectors_config(
                qdrant_client::qdrant::VectorParamsBuilder::new(dimension, Distance::Cosine),
            ))
            .await
            .map_err(upstream)?;
        Ok(())
    }

    /// Create a payload index for every entry in `indexes`, skipping ones
    /// that already exist (Qdrant reports this as an error we swallow).
    pub async fn ensure_payload_indexes(&self, collection: &str, indexes: &[PayloadIndexSpec]) -> Result<(), CortexError> {
        for index in indexes {
            let field_type = match index.kind {
                PayloadFieldKind::Keyword => QdrantFieldType::Keyword,
                PayloadFieldKind::Integer => QdrantFieldType::Integer,
                PayloadFieldKind::Float => QdrantFieldType::Float,
                PayloadFieldKind::Boolean => QdrantFieldType::Bool,
            };
            let result = self
                .client
                .create_field_index(CreateFieldIndexCollectionBuilder::new(collection, index.field.clone(), field_type))
                .await;
            if let Err(err) = result {
                tracing::debug!(collection, field = %index.field, error = %err, "payload index create skipped");
            }
        }
        Ok(())
    }

    pub async fn drop_collection(&self, collection: &str) -> Result<(), CortexError> {
        self.client.delete_collection(collection).await.map_err(upstream)?;
        Ok(())
    }

    /// Cheapest call that proves the client can reach and authenticate
    /// against the server, for `/health/all`.
    pub async fn health_check(&self) -> Result<(), CortexError> {
        self.client.list_collections().await.map_err(upstream)?;
        Ok(())
    }

    pub async fn upsert_points(&self, collection: &str, points: Vec<VectorPoint>) -> Result<(), CortexError> {
        if points.is_empty() {
            return Ok(());
        }

        let converted = points
            .into_iter()
            .map(|point| {
                let payload: Payload = serde_json::Value::Object(point.payload)
                    .try_into()
                    .map_err(|e| CortexError::upstream(format!("qdrant payload conversion failed: {e}")))?;
                Ok(PointStruct::new(point.id.to_string(), point.vector, payload))
            })
            .collect::<Result<Vec<_>, CortexError>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, converted))
            .await
            .map_err(upstream)?;
        Ok(())
    }

    /// Search `collection` for the `limit` nearest neighbours of
    /// `query_vector`, optionally narrowed by `clauses` translated into a
    /// Qdrant payload filter.
    pub async fn search(
        &self,
        collection: &str,
        query_vector: Vec<f32>,
        limit: u64,
        clauses: &[FilterClause],
    ) -> Result<Vec<SearchHit>, CortexError> {
        let mut builder = SearchPointsBuilder::new(collection, query_vector, limit).with_payload(true);
        if let Some(filter) = build_filter(clauses) {
            builder = builder.filter(filter);
        }

        let response = self.client.search_points(builder).await.map_err(upstream)?;

        response
            .result
            .into_iter()
            .map(|scored| {
                let id = point_id_to_uuid(&scored.id)?;
                let payload = payload_to_json_map(scored.payload);
                Ok(SearchHit { id, score: scored.score, payload })
            })
            .collect()
    }

    /// Delete every point belonging to `record_id`, across all vectorised
    /// fields — used when a record is deleted or fully overwritten.
    pub async fn delete_by_record_id(&self, collection: &str, record_id: Uuid) -> Result<(), CortexError> {
        let filter = Filter::must([Condition::matches("record_id", record_id.to_string())]);
        self.client
            .delete_points(DeletePointsBuilder::new(collection).points(filter))
            .await
            .map_err(upstream)?;
        Ok(())
    }

    /// List every point belonging to `record_id`, across all vectorised
    /// fields — backs `GET /collections/{c}/records/{id}/vectors`. Scrolls
    /// without a vector query since this is a payload-filtered listing, not
    /// a similarity search.
    pub async fn list_by_record_id(&self, collection: &str, record_id: Uuid) -> Result<Vec<SearchHit>, CortexError> {
        let filter = Filter::must([Condition::matches("record_id", record_id.to_string())]);
        let response = self
            .client
            .scroll(
                ScrollPointsBuilder::new(collection)
                    .filter(filter)
                    .with_payload(true)
                    .limit(10_000),
            )
            .await
            .map_err(upstream)?;

        response
            .result
            .into_iter()
            .map(|point| {
                let id = point_id_to_uuid(&point.id)?;
                let payload = payload_to_json_map(point.payload);
                Ok(SearchHit { id, score: 0.0, payload })
            })
            .collect()
    }

    /// Delete only the points belonging to one field of `record_id` — used
    /// when a record update replaces that field's chunks.
    pub async fn delete_by_record_and_field(&self, collection: &str, record_id: Uuid, field: &str) -> Result<(), CortexError> {
        let filter = Filter::must([
            Condition::matches("record_id", record_id.to_string()),
            Condition::matches("field", field.to_string()),
        ]);
        self.client
            .delete_points(DeletePointsBuilder::new(collection).points(filter))
            .await
            .map_err(upstream)?;
        Ok(())
    }
}

fn build_filter(clauses: &[FilterClause]) -> Option<Filter> {
    if clauses.is_empty() {
        return None;
    }

    let mut must = Vec::new();
    let mut must_not = Vec::new();

    for clause in clauses {
        match clause.op {
            FilterOp::Eq => must.push(match_condition(&clause.field, &clause.value)),
            FilterOp::Ne => must_not.push(match_condition(&clause.field, &clause.value)),
            FilterOp::Gte => must.push(range_condition(&clause.field, Range { gte: clause.value.as_f64(), ..Default::default() })),
            FilterOp::Lte => must.push(range_condition(&clause.field, Range { lte: clause.value.as_f64(), ..Default::default() })),
            FilterOp::Gt => must.push(range_condition(&clause.field, Range { gt: clause.value.as_f64(), ..Default::default() })),
            FilterOp::Lt => must.push(range_condition(&clause.field, Range { lt: clause.value.as_f64(), ..Default::default() })),
        }
    }

    Some(Filter { must, must_not, ..Default::default() })
}

fn match_condition(field: &str, value: &serde_json::Value) -> Condition {
    match value {
        serde_json::Value::String(s) => Condition::matches(field, s.clone()),
        serde_json::Value::Bool(b) => Condition::matches(field, *b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Condition::matches(field, i)
            } else {
                Condition::matches(field, n.as_f64().unwrap_or(0.0).to_string())
            }
        }
        other => Condition::matches(field, other.to_string()),
    }
}

fn range_condition(field: &str, range: Range) -> Condition {
    Condition::range(field, range)
}

fn point_id_to_uuid(point_id: &Option<qdrant_client::qdrant::PointId>) -> Result<Uuid, CortexError> {
    let options = point_id
        .as_ref()
        .and_then(|id| id.point_id_options.as_ref())
        .ok_or_else(|| CortexError::upstream("qdrant returned a point with no id"))?;

    match options {
        PointIdOptions::Uuid(s) => Uuid::parse_str(s).map_err(|e| CortexError::upstream(format!("qdrant returned an unparsable point id: {e}"))),
        PointIdOptions::Num(n) => Err(CortexError::upstream(format!(
            "qdrant returned a numeric point id {n}, expected a uuid"
        ))),
    }
}

fn payload_to_json_map(
    payload: std::collections::HashMap<String, qdrant_client::qdrant::Value>,
) -> serde_json::Map<String, serde_json::Value> {
    payload
        .into_iter()
        .map(|(key, value)| {
            let json: serde_json::Value = value.into_json();
            (key, json)
        })
        .collect()
}

trait IntoJson {
    fn into_json(self) -> serde_json::Value;
}

impl IntoJson for qdrant_client::qdrant::Value {
    fn into_json(self) -> serde_json::Value {
        serde_json::to_value(&self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn build_filter_is_none_for_empty_clauses() {
        assert!(build_filter(&[]).is_none());
    }

    #[test]
    fn equality_clause_becomes_must_condition() {
        let clauses = vec![FilterClause {
            field: "year".to_string(),
            op: FilterOp::Eq,
            value: json!(2024),
        }];
        let filter = build_filter(&clauses).unwrap();
        assert_eq!(filter.must.len(), 1);
        assert!(filter.must_not.is_empty());
    }

    #[test]
    fn not_equal_clause_becomes_must_not_condition() {
        let clauses = vec![FilterClause {
            field: "status".to_string(),
            op: FilterOp::Ne,
            value: json!("draft"),
        }];
        let filter = build_filter(&clauses).unwrap();
        assert!(filter.must.is_empty());
        assert_eq!(filter.must_not.len(), 1);
    }
}
