use cortex_core::{CollectionSchema, CortexError};

/// Parse a collection schema document, accepting either YAML or JSON.
/// Unknown top-level or nested keys are rejected (`deny_unknown_fields`
/// on every schema struct), matching the strict schema-file contract.
pub fn parse_schema(text: &str) -> Result<CollectionSchema, CortexError> {
    let trimmed = text.trim_start();
    let schema = if trimmed.starts_with('{') {
        serde_json::from_str::<CollectionSchema>(text)
            .map_err(|e| CortexError::validation(format!("invalid schema JSON: {e}")))?
    } else {
        serde_yaml::from_str::<CollectionSchema>(text)
            .map_err(|e| CortexError::validation(format!("invalid schema YAML: {e}")))?
    };

    schema.validate()?;
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_json_schema() {
        let doc = r#"{
            "name": "docs",
            "fields": [
                {"name": "title", "type": "string", "store_in": ["relational"]}
            ]
        }"#;
        let schema = parse_schema(doc).unwrap();
        assert_eq!(schema.name, "docs");
        assert_eq!(schema.fields.len(), 1);
    }

    #[test]
    fn parses_minimal_yaml_schema() {
        let doc = "
name: docs
fields:
  - name: title
    type: string
    store_in: [relational]
";
        let schema = parse_schema(doc).unwrap();
        assert_eq!(schema.name, "docs");
    }

    #[test]
    fn rejects_unknown_top_level_key() {
        let doc = r#"{
            "name": "docs",
            "bogus": true,
            "fields": []
        }"#;
        assert!(parse_schema(doc).is_err());
    }

    #[test]
    fn rejects_invalid_name() {
        let doc = r#"{
            "name": "1docs",
            "fields": [{"name": "a", "type": "string", "store_in": ["relational"]}]
        }"#;
        assert!(parse_schema(doc).is_err());
    }
}
