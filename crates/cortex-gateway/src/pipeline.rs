//! Record ingestion: per-field routing, blob upload, extraction,
//! chunking, embedding, and the coordinated blob → relational → vector
//! write, with best-effort blob compensation on failure.

use std::collections::{BTreeMap, HashMap};

use cortex_core::{coerce, vector_point_id, CollectionSchema, CortexError, FieldDefinition, FieldType, StoreLocation, TypedValue, Value};
use cortex_extract::extract_and_chunk;
use cortex_schema::compile_ddl;
use cortex_store_object::object_path;
use cortex_store_qdrant::VectorPoint;
use uuid::Uuid;

use crate::state::Services;

#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A not-yet-typed record payload as it arrives over the wire: either a
/// plain JSON body or the decoded fields of a multipart request, plus any
/// file-field uploads carried alongside it.
#[derive(Debug, Clone, Default)]
pub struct RecordInput {
    pub values: BTreeMap<String, Value>,
    pub files: HashMap<String, UploadedFile>,
}

#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub id: Uuid,
    pub vectors_created: usize,
    /// field name -> presigned URL (or raw object path if presigning failed)
    pub files: HashMap<String, String>,
}

struct PreparedField {
    values: BTreeMap<String, TypedValue>,
    arrays: BTreeMap<String, Vec<BTreeMap<String, TypedValue>>>,
    fragments: Vec<Fragment>,
}

struct Fragment {
    field: String,
    text: String,
    vector_payload_extra: serde_json::Map<String, serde_json::Value>,
}

fn vector_payload_snapshot(schema: &CollectionSchema, values: &BTreeMap<String, TypedValue>) -> serde_json::Map<String, serde_json::Value> {
    let mut snapshot = serde_json::Map::new();
    for field in &schema.fields {
        if field.store_in.contains(&StoreLocation::VectorPayload) {
            if let Some(value) = values.get(&field.name) {
                snapshot.insert(field.name.clone(), typed_value_to_json(value));
            }
        }
    }
    snapshot
}

fn typed_value_to_json(value: &TypedValue) -> serde_json::Value {
    match value {
        TypedValue::Null => serde_json::Value::Null,
        TypedValue::Text(s) => serde_json::Value::String(s.clone()),
        TypedValue::Int(i) => serde_json::Value::Number((*i).into()),
        TypedValue::Float(f) => serde_json::Number::from_f64(*f).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null),
        TypedValue::Bool(b) => serde_json::Value::Bool(*b),
        TypedValue::Date(d) => serde_json::Value::String(d.to_string()),
        TypedValue::DateTime(dt) => serde_json::Value::String(dt.to_rfc3339()),
        TypedValue::Json(v) => v.clone(),
    }
}

/// Process one array field's rows against its nested schema, coercing
/// every nested scalar. Array fields never vectorize directly (only
/// their nested scalar fields could, but nesting vectorize is not part
/// of the grammar), so this never contributes embedding fragments.
fn prepare_array_field(field: &FieldDefinition, value: Option<&Value>) -> Result<Vec<BTreeMap<String, TypedValue>>, CortexError> {
    let nested_schema = field.schema.as_deref().unwrap_or(&[]);
    let items = match value {
        Some(Value::List(items)) => items.as_slice(),
        Some(Value::Null) | None => &[],
        _ => {
            return Err(CortexError::validation(format!(
                "field '{}' must be a list of objects",
                field.name
            )))
        }
    };

    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        let map = item
            .as_map()
            .ok_or_else(|| CortexError::validation(format!("field '{}': each item must be an object", field.name)))?;
        let mut row = BTreeMap::new();
        for nested_field in nested_schema {
            if !nested_field.store_in.contains(&StoreLocation::Relational) {
                continue;
            }
            let nested_value = map.get(&nested_field.name);
            row.insert(nested_field.name.clone(), coerce(nested_value, nested_field)?);
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Run every field of `schema` through per-field processing (§4.2),
/// uploading file blobs as they're encountered. Returns the prepared
/// relational values/arrays and embedding fragments. `uploaded_paths` is
/// an out-param rather than part of the return value so that a caller
/// still has every blob path uploaded so far even when this function
/// returns early with an error partway through the field loop.
async fn prepare_fields(
    services: &Services,
    schema: &CollectionSchema,
    collection_name: &str,
    bucket: Option<&str>,
    record_id: Uuid,
    input: &RecordInput,
    chunk_size: u32,
    chunk_overlap: u32,
    uploaded_paths: &mut Vec<(String, String)>,
) -> Result<PreparedField, CortexError> {
    let mut values = BTreeMap::new();
    let mut arrays = BTreeMap::new();
    let mut fragments = Vec::new();

    for field in &schema.fields {
        match field.field_type {
            FieldType::File => {
                let upload = input.files.get(&field.name);
                let Some(upload) = upload else {
                    if field.required {
                        return Err(CortexError::validation(format!("field '{}' is required", field.name)));
                    }
                    continue;
                };

                let bucket = bucket.ok_or_else(|| CortexError::validation("collection has no blob storage configured".to_string()))?;
                let path = object_path(collection_name, record_id, &upload.filename);
                services
                    .object_store
                    .put_object(bucket, &path, upload.bytes.clone(), Some(&upload.content_type))
                    .await?;
                uploaded_paths.push((field.name.clone(), path.clone()));

                if field.store_in.contains(&StoreLocation::Relational) {
                    values.insert(field.name.clone(), TypedValue::Text(path.clone()));
                }

                if field.vectorize {
                    let chunks = extract_and_chunk(
                        &upload.content_type,
                        &upload.filename,
                        &upload.bytes,
                        field.extract_config.as_ref(),
                        chunk_size,
                        chunk_overlap,
                        services.vision.as_deref(),
                    )
                    .await?;
                    for text in chunks {
                        let mut extra = serde_json::Map::new();
                        if field.store_in.contains(&StoreLocation::VectorPayload) {
                            extra.insert(field.name.clone(), serde_json::Value::String(path.clone()));
                        }
                        fragments.push(Fragment {
                            field: field.name.clone(),
                            text,
                            vector_payload_extra: extra,
                        });
                    }
                }
            }
            FieldType::Array => {
                let rows = prepare_array_field(field, input.values.get(&field.name))?;
                if field.store_in.contains(&StoreLocation::Relational) {
                    arrays.insert(field.name.clone(), rows);
                }
            }
            _ => {
                let raw = input.values.get(&field.name);
                let typed = coerce(raw, field)?;

                if field.vectorize || field.store_in.contains(&StoreLocation::Vector) {
                    let text = typed.stringify();
                    if !text.trim().is_empty() {
                        for chunk in cortex_chunking::chunk_text(&text, chunk_size as usize, chunk_overlap as usize) {
                            fragments.push(Fragment {
                                field: field.name.clone(),
                                text: chunk,
                                vector_payload_extra: serde_json::Map::new(),
                            });
                        }
                    }
                }

                if field.store_in.contains(&StoreLocation::Relational) {
                    values.insert(field.name.clone(), typed);
                }
            }
        }
    }

    Ok(PreparedField { values, arrays, fragments })
}

/// Best-effort removal of every blob uploaded so far; failures are
/// logged, not propagated — we're already unwinding a harder failure.
async fn compensate_blobs(services: &Services, bucket: &str, paths: &[(String, String)]) {
    for (field, path) in paths {
        if let Err(err) = services.object_store.delete_object(bucket, path).await {
            tracing::warn!(field = %field, path = %path, error = %err, "failed to compensate uploaded blob");
        }
    }
}

/// Embed every fragment (grouped implicitly by call order) and build the
/// vector points to upsert, per the deterministic id contract.
async fn embed_fragments(
    services: &Services,
    schema: &CollectionSchema,
    record_id: Uuid,
    fragments: &[Fragment],
    base_payload: &serde_json::Map<String, serde_json::Value>,
) -> Result<Vec<VectorPoint>, CortexError> {
    if fragments.is_empty() {
        return Ok(Vec::new());
    }

    let embedder = services.embedding_service_for(schema).await?;
    let texts: Vec<String> = fragments.iter().map(|f| f.text.clone()).collect();
    let vectors = embedder.embed_batch(&texts).await?;

    let mut per_field_index: HashMap<&str, usize> = HashMap::new();
    let mut points = Vec::with_capacity(fragments.len());

    for (fragment, vector) in fragments.iter().zip(vectors.into_iter()) {
        let index = per_field_index.entry(fragment.field.as_str()).or_insert(0);
        let id = vector_point_id(record_id, &fragment.field, *index);
        *index += 1;

        let mut payload = base_payload.clone();
        payload.insert("record_id".to_string(), serde_json::Value::String(record_id.to_string()));
        payload.insert("collection".to_string(), serde_json::Value::String(schema.name.clone()));
        payload.insert("field".to_string(), serde_json::Value::String(fragment.field.clone()));
        payload.insert("chunk_index".to_string(), serde_json::Value::Number((*index as i64 - 1).into()));
        payload.insert("text".to_string(), serde_json::Value::String(fragment.text.clone()));
        for (k, v) in &fragment.vector_payload_extra {
            payload.insert(k.clone(), v.clone());
        }

        points.push(VectorPoint { id, vector, payload });
    }

    Ok(points)
}

/// Issue a presigned URL for every file field, degrading to the raw
/// object path on presign failure rather than failing the response.
async fn presign_file_urls(services: &Services, bucket: &str, uploaded_paths: &[(String, String)]) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for (field, path) in uploaded_paths {
        let url = services
            .object_store
            .presigned_get_url(bucket, path, services.config.presign_ttl_seconds)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(field = %field, path = %path, error = %err, "presign failed, returning raw object path");
                path.clone()
            });
        out.insert(field.clone(), url);
    }
    out
}

/// Create a new record: §4.2's full coordinated write.
pub async fn create_record(services: &Services, database: Option<&str>, schema: &CollectionSchema, input: RecordInput) -> Result<IngestOutcome, CortexError> {
    let pool = services.pool_for(database).await?;
    let plan = compile_ddl(schema);
    let record_id = Uuid::new_v4();
    let bucket = schema.requires_blob_storage().then(|| schema.bucket_name());
    if let Some(bucket) = &bucket {
        services.object_store.ensure_bucket(bucket).await?;
    }

    let mut uploaded_paths = Vec::new();
    let prepared = match prepare_fields(
        services,
        schema,
        &schema.name,
        bucket.as_deref(),
        record_id,
        &input,
        schema.config.chunk_size,
        schema.config.chunk_overlap,
        &mut uploaded_paths,
    )
    .await
    {
        Ok(p) => p,
        Err(err) => {
            // Fields are processed in order; any blob uploaded before the
            // failing field must still be compensated even though we
            // never reached the relational insert.
            if let Some(bucket) = &bucket {
                compensate_blobs(services, bucket, &uploaded_paths).await;
            }
            return Err(err);
        }
    };

    let insert_result = cortex_store_postgres::insert_record(&pool, &plan, record_id, &prepared.values, &prepared.arrays).await;
    let record_row = match insert_result {
        Ok(row) => row,
        Err(err) => {
            if let Some(bucket) = &bucket {
                compensate_blobs(services, bucket, &uploaded_paths).await;
            }
            return Err(err);
        }
    };

    let mut vectors_created = 0usize;
    if schema.requires_vectors() && !prepared.fragments.is_empty() {
        let collection_name = schema.qdrant_collection_name();
        let embedder = services.embedding_service_for(schema).await?;
        let dim = embedder.dim().await?;
        services.vector_store.ensure_collection(&collection_name, dim as u64).await?;
        if let Some(spec) = cortex_schema::compile_vector_spec(schema) {
            services.vector_store.ensure_payload_indexes(&collection_name, &spec.payload_indexes).await?;
        }

        let base_payload = vector_payload_snapshot(schema, &prepared.values);
        let points = embed_fragments(services, schema, record_id, &prepared.fragments, &base_payload).await?;
        vectors_created = points.len();
        // Vector upsert failure after a successful relational commit is
        // reported but not rolled back: the record is authoritative, and
        // re-running update will re-upsert the same deterministic ids.
        services.vector_store.upsert_points(&collection_name, points).await?;
    }
    let _ = record_row;

    let files = match &bucket {
        Some(bucket) => presign_file_urls(services, bucket, &uploaded_paths).await,
        None => HashMap::new(),
    };

    Ok(IngestOutcome {
        id: record_id,
        vectors_created,
        files,
    })
}

/// Update an existing record. Per §4.2: new blobs are uploaded before the
/// relational row is touched; old blobs for replaced file fields are
/// removed only after the row update succeeds; vector points for any
/// touched field are deleted and re-upserted.
pub async fn update_record(
    services: &Services,
    database: Option<&str>,
    schema: &CollectionSchema,
    record_id: Uuid,
    input: RecordInput,
) -> Result<IngestOutcome, CortexError> {
    let pool = services.pool_for(database).await?;
    let plan = compile_ddl(schema);
    let bucket = schema.requires_blob_storage().then(|| schema.bucket_name());

    let existing = cortex_store_postgres::get_record(&pool, &plan, record_id)
        .await?
        .ok_or_else(|| CortexError::not_found(format!("record '{record_id}' not found")))?;

    let mut uploaded_paths = Vec::new();
    let prepared = match prepare_fields(
        services,
        schema,
        &schema.name,
        bucket.as_deref(),
        record_id,
        &input,
        schema.config.chunk_size,
        schema.config.chunk_overlap,
        &mut uploaded_paths,
    )
    .await
    {
        Ok(p) => p,
        Err(err) => {
            if let Some(bucket) = &bucket {
                compensate_blobs(services, bucket, &uploaded_paths).await;
            }
            return Err(err);
        }
    };

    let updated = match cortex_store_postgres::update_record(&pool, &plan, record_id, &prepared.values, &prepared.arrays).await {
        Ok(updated) => updated,
        Err(err) => {
            if let Some(bucket) = &bucket {
                compensate_blobs(services, bucket, &uploaded_paths).await;
            }
            return Err(err);
        }
    };
    if !updated {
        if let Some(bucket) = &bucket {
            compensate_blobs(services, bucket, &uploaded_paths).await;
        }
        return Err(CortexError::not_found(format!("record '{record_id}' not found")));
    }

    // Delete the old blob for every file field touched by this update,
    // now that the new blob is up and the row points at it.
    if let Some(bucket) = &bucket {
        for (field, _new_path) in &uploaded_paths {
            if let Some(old_value) = existing.get(field).and_then(|v| v.as_str()) {
                if let Err(err) = services.object_store.delete_object(bucket, old_value).await {
                    tracing::warn!(field = %field, path = old_value, error = %err, "failed to delete superseded blob");
                }
            }
        }
    }

    let mut vectors_created = 0usize;
    if schema.requires_vectors() {
        let collection_name = schema.qdrant_collection_name();

        // Field-level last-writer-wins: delete then re-upsert only the
        // fields this update actually touched fragments for.
        let touched_fields: std::collections::HashSet<&str> = prepared.fragments.iter().map(|f| f.field.as_str()).collect();
        for field in &touched_fields {
            services.vector_store.delete_by_record_and_field(&collection_name, record_id, field).await?;
        }

        if !prepared.fragments.is_empty() {
            let base_payload = vector_payload_snapshot(schema, &prepared.values);
            let points = embed_fragments(services, schema, record_id, &prepared.fragments, &base_payload).await?;
            vectors_created = points.len();
            services.vector_store.upsert_points(&collection_name, points).await?;
        }
    }

    let files = match &bucket {
        Some(bucket) => presign_file_urls(services, bucket, &uploaded_paths).await,
        None => HashMap::new(),
    };

    Ok(IngestOutcome {
        id: record_id,
        vectors_created,
        files,
    })
}

/// Delete a record and everything it owns: its blobs, its vector points,
/// and (cascading) its array child rows.
pub async fn delete_record(services: &Services, database: Option<&str>, schema: &CollectionSchema, record_id: Uuid) -> Result<(), CortexError> {
    let pool = services.pool_for(database).await?;
    let plan = compile_ddl(schema);

    let existing = cortex_store_postgres::get_record(&pool, &plan, record_id)
        .await?
        .ok_or_else(|| CortexError::not_found(format!("record '{record_id}' not found")))?;

    if schema.requires_blob_storage() {
        let bucket = schema.bucket_name();
        for field in &schema.fields {
            if field.field_type != FieldType::File {
                continue;
            }
            if let Some(path) = existing.get(&field.name).and_then(|v| v.as_str()) {
                if let Err(err) = services.object_store.delete_object(&bucket, path).await {
                    tracing::warn!(field = %field.name, path, error = %err, "failed to delete blob on record deletion");
                }
            }
        }
    }

    if schema.requires_vectors() {
        let collection_name = schema.qdrant_collection_name();
        services.vector_store.delete_by_record_id(&collection_name, record_id).await?;
    }

    let deleted = cortex_store_postgres::delete_record(&pool, &plan, record_id).await?;
    if !deleted {
        return Err(CortexError::not_found(format!("record '{record_id}' not found")));
    }
    Ok(())
}
