use serde::{Deserialize, Serialize};

use crate::error::CortexError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Text,
    Int,
    Float,
    Boolean,
    Date,
    DateTime,
    Enum,
    Array,
    File,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreLocation {
    Relational,
    Vector,
    VectorPayload,
    Blob,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractConfig {
    #[serde(default)]
    pub ocr_if_needed: bool,
    #[serde(default)]
    pub structured: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub filterable: bool,
    #[serde(default)]
    pub vectorize: bool,
    #[serde(default)]
    pub default: Option<crate::value::Value>,
    #[serde(default)]
    pub values: Option<Vec<String>>,
    #[serde(default)]
    pub store_in: Vec<StoreLocation>,
    #[serde(default)]
    pub schema: Option<Vec<FieldDefinition>>,
    #[serde(default)]
    pub extract_config: Option<ExtractConfig>,
}

impl FieldDefinition {
    /// Validate the invariants from the field model: `values` iff enum,
    /// `vectorize` only on text/string/file, `schema` iff array, nested
    /// arrays forbidden, `extract_config` only on file, `unique` only on
    /// scalar string/int/float, and at least one store location.
    pub fn validate(&self) -> Result<(), CortexError> {
        if !valid_identifier(&self.name) {
            return Err(CortexError::validation(format!(
                "field name '{}' must match ^[A-Za-z_][A-Za-z0-9_]*$",
                self.name
            )));
        }

        if self.store_in.is_empty() {
            return Err(CortexError::validation(format!(
                "field '{}' must declare at least one store_in location",
                self.name
            )));
        }

        match self.field_type {
            FieldType::Enum => {
                if self.values.as_ref().map(|v| v.is_empty()).unwrap_or(true) {
                    return Err(CortexError::validation(format!(
                        "field '{}' is an enum and must declare non-empty values",
                        self.name
                    )));
                }
            }
            _ => {
                if self.values.is_some() {
                    return Err(CortexError::validation(format!(
                        "field '{}' is not an enum and must not declare values",
                        self.name
                    )));
                }
            }
        }

        if self.vectorize
            && !matches!(self.field_type, FieldType::Text | FieldType::String | FieldType::File)
        {
            return Err(CortexError::validation(format!(
                "field '{}' cannot be vectorized: only text, string, and file fields support vectorize",
                self.name
            )));
        }

        match self.field_type {
            FieldType::Array => {
                let nested = self.schema.as_ref().ok_or_else(|| {
                    CortexError::validation(format!("array field '{}' must declare a nested schema", self.name))
                })?;
                for nested_field in nested {
                    if nested_field.field_type == FieldType::Array {
                        return Err(CortexError::validation(format!(
                            "field '{}': nested arrays are not supported",
                            nested_field.name
                        )));
                    }
                    nested_field.validate()?;
                }
            }
            _ => {
                if self.schema.is_some() {
                    return Err(CortexError::validation(format!(
                        "field '{}' is not an array and must not declare a nested schema",
                        self.name
                    )));
                }
            }
        }

        if self.extract_config.is_some() && self.field_type != FieldType::File {
            return Err(CortexError::validation(format!(
                "field '{}' is not a file field and must not declare extract_config",
                self.name
            )));
        }

        if self.unique
            && !matches!(self.field_type, FieldType::String | FieldType::Int | FieldType::Float)
        {
            return Err(CortexError::validation(format!(
                "field '{}': unique is only valid on scalar string, int, or float fields",
                self.name
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionConfig {
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default)]
    pub embedding_provider_id: Option<uuid::Uuid>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: u32,
}

fn default_chunk_size() -> u32 {
    500
}

fn default_chunk_overlap() -> u32 {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionSchema {
    pub name: String,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub fields: Vec<FieldDefinition>,
    #[serde(default)]
    pub config: CollectionConfig,
}

static NAME_RE_FIRST: fn(char) -> bool = |c: char| c.is_ascii_alphabetic() || c == '_';
static NAME_RE_REST: fn(char) -> bool = |c: char| c.is_ascii_alphanumeric() || c == '_';

/// Whether `name` matches `^[A-Za-z_][A-Za-z0-9_]*$` — the identifier
/// shape required of collection names, database names, and field names
/// alike, since all three end up interpolated into DDL.
pub fn valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if NAME_RE_FIRST(c) => {}
        _ => return false,
    }
    chars.all(NAME_RE_REST)
}

/// Double-quote a Postgres identifier for safe interpolation into DDL and
/// DML that cannot parameterize table/column names. Every caller in this
/// workspace passes names that already passed `valid_identifier`, but this
/// still escapes embedded quotes rather than trusting that invariant holds
/// at every call site.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl CollectionSchema {
    pub fn validate(&self) -> Result<(), CortexError> {
        if !valid_identifier(&self.name) {
            return Err(CortexError::validation(format!(
                "collection name '{}' must match ^[A-Za-z_][A-Za-z0-9_]*$",
                self.name
            )));
        }

        if let Some(db) = &self.database {
            if !valid_identifier(db) {
                return Err(CortexError::validation(format!(
                    "database name '{}' must match ^[A-Za-z_][A-Za-z0-9_]*$",
                    db
                )));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(CortexError::validation(format!(
                    "duplicate field name '{}' in collection '{}'",
                    field.name, self.name
                )));
            }
            field.validate()?;
        }

        Ok(())
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn requires_vectors(&self) -> bool {
        self.fields
            .iter()
            .any(|f| f.vectorize || f.store_in.contains(&StoreLocation::Vector))
    }

    pub fn requires_blob_storage(&self) -> bool {
        self.fields.iter().any(|f| f.store_in.contains(&StoreLocation::Blob))
    }

    /// `{database}__{collection}` or bare `{collection}`; NOT lower-cased,
    /// unlike the bucket name.
    pub fn qdrant_collection_name(&self) -> String {
        match &self.database {
            Some(db) => format!("{}__{}", db, self.name),
            None => self.name.clone(),
        }
    }

    /// `{database}-{collection}` or `cortex-{collection}`, always lower-cased.
    pub fn bucket_name(&self) -> String {
        match &self.database {
            Some(db) => format!("{}-{}", db, self.name).to_lowercase(),
            None => format!("cortex-{}", self.name).to_lowercase(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar_field(name: &str, field_type: FieldType) -> FieldDefinition {
        FieldDefinition {
            name: name.to_string(),
            field_type,
            required: false,
            indexed: false,
            unique: false,
            filterable: false,
            vectorize: false,
            default: None,
            values: None,
            store_in: vec![StoreLocation::Relational],
            schema: None,
            extract_config: None,
        }
    }

    #[test]
    fn valid_identifier_rejects_leading_digit_and_hyphen() {
        assert!(valid_identifier("docs"));
        assert!(valid_identifier("_docs_2"));
        assert!(!valid_identifier("2docs"));
        assert!(!valid_identifier("doc-s"));
        assert!(!valid_identifier(""));
    }

    #[test]
    fn quote_ident_wraps_and_escapes() {
        assert_eq!(quote_ident("docs"), "\"docs\"");
        assert_eq!(quote_ident("weird\"name"), "\"weird\"\"name\"");
    }

    #[test]
    fn field_name_must_be_a_valid_identifier() {
        let mut f = scalar_field("a b", FieldType::String);
        assert!(f.validate().is_err());
        f.name = "x); DROP TABLE docs; --".to_string();
        assert!(f.validate().is_err());
        f.name = "title".to_string();
        assert!(f.validate().is_ok());
    }

    #[test]
    fn nested_array_field_name_must_be_a_valid_identifier() {
        let mut array_field = scalar_field("items", FieldType::Array);
        array_field.schema = Some(vec![scalar_field("bad name", FieldType::String)]);
        assert!(array_field.validate().is_err());
    }

    #[test]
    fn field_must_declare_a_store_location() {
        let mut f = scalar_field("title", FieldType::String);
        f.store_in = vec![];
        assert!(f.validate().is_err());
    }

    #[test]
    fn enum_field_requires_nonempty_values_and_rejects_values_otherwise() {
        let mut enum_field = scalar_field("status", FieldType::Enum);
        assert!(enum_field.validate().is_err());
        enum_field.values = Some(vec!["draft".into()]);
        assert!(enum_field.validate().is_ok());

        let mut string_field = scalar_field("title", FieldType::String);
        string_field.values = Some(vec!["a".into()]);
        assert!(string_field.validate().is_err());
    }

    #[test]
    fn vectorize_only_allowed_on_text_string_file() {
        let mut int_field = scalar_field("year", FieldType::Int);
        int_field.vectorize = true;
        assert!(int_field.validate().is_err());

        let mut text_field = scalar_field("content", FieldType::Text);
        text_field.vectorize = true;
        assert!(text_field.validate().is_ok());
    }

    #[test]
    fn array_field_requires_nested_schema_and_forbids_nested_arrays() {
        let mut array_field = scalar_field("items", FieldType::Array);
        assert!(array_field.validate().is_err());

        array_field.schema = Some(vec![scalar_field("name", FieldType::String)]);
        assert!(array_field.validate().is_ok());

        array_field.schema = Some(vec![scalar_field("nested", FieldType::Array)]);
        assert!(array_field.validate().is_err());
    }

    #[test]
    fn unique_only_valid_on_scalar_string_int_float() {
        let mut bool_field = scalar_field("flag", FieldType::Boolean);
        bool_field.unique = true;
        assert!(bool_field.validate().is_err());

        let mut string_field = scalar_field("email", FieldType::String);
        string_field.unique = true;
        assert!(string_field.validate().is_ok());
    }

    #[test]
    fn schema_validate_rejects_duplicate_field_names_and_bad_collection_name() {
        let schema = CollectionSchema {
            name: "docs".into(),
            database: None,
            description: None,
            fields: vec![scalar_field("title", FieldType::String), scalar_field("title", FieldType::Int)],
            config: CollectionConfig::default(),
        };
        assert!(schema.validate().is_err());

        let mut bad_name = schema.clone();
        bad_name.name = "2bad".into();
        bad_name.fields = vec![scalar_field("title", FieldType::String)];
        assert!(bad_name.validate().is_err());
    }

    #[test]
    fn qdrant_and_bucket_names_use_database_prefix_when_present() {
        let mut schema = CollectionSchema {
            name: "Docs".into(),
            database: None,
            description: None,
            fields: vec![],
            config: CollectionConfig::default(),
        };
        assert_eq!(schema.qdrant_collection_name(), "Docs");
        assert_eq!(schema.bucket_name(), "cortex-docs");

        schema.database = Some("Acme".into());
        assert_eq!(schema.qdrant_collection_name(), "Acme__Docs");
        assert_eq!(schema.bucket_name(), "acme-docs");
    }
}
