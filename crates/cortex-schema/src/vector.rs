use cortex_core::{CollectionSchema, FieldType, StoreLocation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFieldKind {
    Keyword,
    Integer,
    Float,
    Boolean,
}

#[derive(Debug, Clone)]
pub struct PayloadIndexSpec {
    pub field: String,
    pub kind: PayloadFieldKind,
}

#[derive(Debug, Clone)]
pub struct VectorCollectionSpec {
    pub name: String,
    pub payload_indexes: Vec<PayloadIndexSpec>,
}

fn payload_kind_for(field_type: FieldType) -> PayloadFieldKind {
    match field_type {
        FieldType::Int => PayloadFieldKind::Integer,
        FieldType::Float => PayloadFieldKind::Float,
        FieldType::Boolean => PayloadFieldKind::Boolean,
        _ => PayloadFieldKind::Keyword,
    }
}

/// Derive the vector-collection spec for a schema, or `None` if no field
/// is vectorised or stores `vector` directly. Always includes the fixed
/// `record_id, collection, field, chunk_index` payload indexes, plus one
/// per field whose `store_in` mentions `vector` or `vector_payload`.
pub fn compile_vector_spec(schema: &CollectionSchema) -> Option<VectorCollectionSpec> {
    if !schema.requires_vectors() {
        return None;
    }

    let mut payload_indexes = vec![
        PayloadIndexSpec {
            field: "record_id".to_string(),
            kind: PayloadFieldKind::Keyword,
        },
        PayloadIndexSpec {
            field: "collection".to_string(),
            kind: PayloadFieldKind::Keyword,
        },
        PayloadIndexSpec {
            field: "field".to_string(),
            kind: PayloadFieldKind::Keyword,
        },
        PayloadIndexSpec {
            field: "chunk_index".to_string(),
            kind: PayloadFieldKind::Integer,
        },
    ];

    for field in &schema.fields {
        if field.store_in.contains(&StoreLocation::Vector) || field.store_in.contains(&StoreLocation::VectorPayload) {
            payload_indexes.push(PayloadIndexSpec {
                field: field.name.clone(),
                kind: payload_kind_for(field.field_type),
            });
        }
    }

    Some(VectorCollectionSpec {
        name: schema.qdrant_collection_name(),
        payload_indexes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_core::{CollectionConfig, FieldDefinition};

    fn field(name: &str, field_type: FieldType, vectorize: bool, store_in: Vec<StoreLocation>) -> FieldDefinition {
        FieldDefinition {
            name: name.to_string(),
            field_type,
            required: false,
            indexed: false,
            unique: false,
            filterable: false,
            vectorize,
            default: None,
            values: None,
            store_in,
            schema: None,
            extract_config: None,
        }
    }

    #[test]
    fn no_vector_spec_without_vectorized_fields() {
        let schema = CollectionSchema {
            name: "docs".to_string(),
            database: None,
            description: None,
            fields: vec![field("title", FieldType::String, false, vec![StoreLocation::Relational])],
            config: CollectionConfig::default(),
        };
        assert!(compile_vector_spec(&schema).is_none());
    }

    #[test]
    fn vectorized_field_yields_spec_with_fixed_indexes() {
        let schema = CollectionSchema {
            name: "docs".to_string(),
            database: Some("kb".to_string()),
            description: None,
            fields: vec![field("content", FieldType::Text, true, vec![StoreLocation::Vector])],
            config: CollectionConfig::default(),
        };
        let spec = compile_vector_spec(&schema).unwrap();
        assert_eq!(spec.name, "kb__docs");
        assert!(spec.payload_indexes.iter().any(|p| p.field == "record_id"));
        assert!(spec.payload_indexes.iter().any(|p| p.field == "chunk_index"));
    }

    #[test]
    fn vector_payload_field_gets_typed_payload_index() {
        let schema = CollectionSchema {
            name: "docs".to_string(),
            database: None,
            description: None,
            fields: vec![
                field("content", FieldType::Text, true, vec![StoreLocation::Vector]),
                field(
                    "year",
                    FieldType::Int,
                    false,
                    vec![StoreLocation::Relational, StoreLocation::VectorPayload],
                ),
            ],
            config: CollectionConfig::default(),
        };
        let spec = compile_vector_spec(&schema).unwrap();
        let year_index = spec.payload_indexes.iter().find(|p| p.field == "year").unwrap();
        assert_eq!(year_index.kind, PayloadFieldKind::Integer);
    }
}
