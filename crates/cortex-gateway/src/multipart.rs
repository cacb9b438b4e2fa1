//! Dual-mode record body decoding: a plain JSON object, or a
//! `multipart/form-data` body carrying file uploads alongside scalar
//! fields, per §4.1's "JSON or multipart" ingestion contract.

use std::collections::{BTreeMap, HashMap};

use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::Json;
use cortex_core::{CortexError, Value};

use crate::pipeline::{RecordInput, UploadedFile};

pub async fn parse_record_input(request: Request) -> Result<RecordInput, CortexError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if content_type.starts_with("multipart/form-data") {
        parse_multipart(request).await
    } else {
        parse_json(request).await
    }
}

async fn parse_json(request: Request) -> Result<RecordInput, CortexError> {
    let Json(body): Json<serde_json::Value> = Json::from_request(request, &())
        .await
        .map_err(|e| CortexError::validation(format!("invalid JSON body: {e}")))?;

    let object = body
        .as_object()
        .ok_or_else(|| CortexError::validation("record body must be a JSON object"))?;

    let values = object.iter().map(|(k, v)| (k.clone(), Value::from(v.clone()))).collect();
    Ok(RecordInput { values, files: HashMap::new() })
}

async fn parse_multipart(request: Request) -> Result<RecordInput, CortexError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| CortexError::validation(format!("invalid multipart body: {e}")))?;

    let mut values = BTreeMap::new();
    let mut files = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CortexError::validation(format!("invalid multipart field: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if let Some(filename) = field.file_name().map(str::to_string) {
            let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| CortexError::validation(format!("failed to read upload '{name}': {e}")))?
                .to_vec();
            files.insert(name, UploadedFile { filename, content_type, bytes });
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| CortexError::validation(format!("failed to read field '{name}': {e}")))?;
            values.insert(name, scalar_from_text(&text));
        }
    }

    Ok(RecordInput { values, files })
}

/// A multipart text field arrives as a string; try JSON first so array
/// and object fields (sent JSON-encoded, since multipart has no native
/// nesting) survive, falling back to a bare string otherwise.
fn scalar_from_text(text: &str) -> Value {
    serde_json::from_str::<serde_json::Value>(text)
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(text.to_string()))
}
