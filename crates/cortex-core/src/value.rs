use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CortexError;
use crate::schema::{FieldDefinition, FieldType};

/// An open, dynamically-typed value as it arrives over the wire, before
/// it has been checked against a field's declared type.
///
/// Record payloads arrive as an open JSON map; representing that map as
/// a tagged sum (rather than passing `serde_json::Value` around forever)
/// keeps every later stage — coercion, chunking, payload building — a
/// total function over a closed set of variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Render the value the way it should appear inside chunked text or a
    /// vector payload snapshot: scalars stringify plainly, compound values
    /// fall back to their JSON form.
    pub fn stringify(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Bytes(_) => String::new(),
            Value::List(_) | Value::Map(_) => {
                serde_json::to_value(self).map(|v| v.to_string()).unwrap_or_default()
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Int(i) => serde_json::Value::Number(i.into()),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s),
            Value::Bytes(_) => serde_json::Value::Null,
            Value::List(items) => serde_json::Value::Array(items.into_iter().map(Into::into).collect()),
            Value::Map(map) => {
                serde_json::Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

/// A value that has passed `coerce` and is known to match its field's
/// declared type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypedValue {
    Null,
    Text(String),
    Int(i32),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Json(serde_json::Value),
}

impl TypedValue {
    pub fn stringify(&self) -> String {
        match self {
            TypedValue::Null => String::new(),
            TypedValue::Text(s) => s.clone(),
            TypedValue::Int(i) => i.to_string(),
            TypedValue::Float(f) => f.to_string(),
            TypedValue::Bool(b) => b.to_string(),
            TypedValue::Date(d) => d.to_string(),
            TypedValue::DateTime(dt) => dt.to_rfc3339(),
            TypedValue::Json(v) => v.to_string(),
        }
    }
}

fn truthy_string(s: &str) -> bool {
    matches!(s.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

/// Coerce an open `Value` into the `TypedValue` demanded by `field`,
/// applying the conversion rules for each scalar field type. Returns a
/// `ValidationError` if the value cannot be coerced, is missing and
/// required, or (for enums) is not one of the declared values.
pub fn coerce(value: Option<&Value>, field: &FieldDefinition) -> Result<TypedValue, CortexError> {
    let value = match value {
        Some(v) if !v.is_null() => v,
        _ => {
            if let Some(default) = &field.default {
                return coerce(Some(default), field);
            }
            if field.required {
                return Err(CortexError::validation(format!(
                    "field '{}' is required",
                    field.name
                )));
            }
            return Ok(TypedValue::Null);
        }
    };

    match field.field_type {
        FieldType::String | FieldType::Text | FieldType::File => match value {
            Value::String(s) => Ok(TypedValue::Text(s.clone())),
            other => Ok(TypedValue::Text(other.stringify())),
        },
        FieldType::Int => match value {
            Value::Int(i) => Ok(TypedValue::Int(*i as i32)),
            Value::Float(f) => Ok(TypedValue::Int(*f as i32)),
            Value::String(s) => s
                .parse::<i32>()
                .map(TypedValue::Int)
                .map_err(|_| CortexError::validation(format!("field '{}' is not an integer", field.name))),
            _ => Err(CortexError::validation(format!("field '{}' is not an integer", field.name))),
        },
        FieldType::Float => match value {
            Value::Float(f) => Ok(TypedValue::Float(*f)),
            Value::Int(i) => Ok(TypedValue::Float(*i as f64)),
            Value::String(s) => s
                .parse::<f64>()
                .map(TypedValue::Float)
                .map_err(|_| CortexError::validation(format!("field '{}' is not a float", field.name))),
            _ => Err(CortexError::validation(format!("field '{}' is not a float", field.name))),
        },
        FieldType::Boolean => match value {
            Value::Bool(b) => Ok(TypedValue::Bool(*b)),
            Value::String(s) => Ok(TypedValue::Bool(truthy_string(s))),
            Value::Int(i) => Ok(TypedValue::Bool(*i != 0)),
            _ => Err(CortexError::validation(format!("field '{}' is not a boolean", field.name))),
        },
        FieldType::Date => {
            let s = value
                .as_str()
                .ok_or_else(|| CortexError::validation(format!("field '{}' is not a date string", field.name)))?;
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(TypedValue::Date)
                .map_err(|_| CortexError::validation(format!("field '{}' is not a valid ISO-8601 date", field.name)))
        }
        FieldType::DateTime => {
            let s = value
                .as_str()
                .ok_or_else(|| CortexError::validation(format!("field '{}' is not a datetime string", field.name)))?;
            DateTime::parse_from_rfc3339(s)
                .map(|dt| TypedValue::DateTime(dt.with_timezone(&Utc)))
                .map_err(|_| {
                    CortexError::validation(format!("field '{}' is not a valid ISO-8601 datetime", field.name))
                })
        }
        FieldType::Enum => {
            let s = value
                .as_str()
                .ok_or_else(|| CortexError::validation(format!("field '{}' is not a string", field.name)))?;
            let values = field.values.as_deref().unwrap_or(&[]);
            if values.iter().any(|v| v == s) {
                Ok(TypedValue::Text(s.to_string()))
            } else {
                Err(CortexError::validation(format!(
                    "field '{}' value '{}' is not one of the declared enum values",
                    field.name, s
                )))
            }
        }
        FieldType::Json => Ok(TypedValue::Json(value.clone().into())),
        FieldType::Array => Err(CortexError::validation(format!(
            "field '{}' is an array field and must go through array coercion",
            field.name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::StoreLocation;

    fn field(name: &str, field_type: FieldType) -> FieldDefinition {
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
    fn truthy_strings_coerce_to_bool() {
        let f = field("active", FieldType::Boolean);
        assert_eq!(coerce(Some(&Value::String("true".into())), &f).unwrap(), TypedValue::Bool(true));
        assert_eq!(coerce(Some(&Value::String("yes".into())), &f).unwrap(), TypedValue::Bool(true));
        assert_eq!(coerce(Some(&Value::String("1".into())), &f).unwrap(), TypedValue::Bool(true));
        assert_eq!(coerce(Some(&Value::String("no".into())), &f).unwrap(), TypedValue::Bool(false));
    }

    #[test]
    fn missing_required_field_fails() {
        let mut f = field("title", FieldType::String);
        f.required = true;
        assert!(coerce(None, &f).is_err());
    }

    #[test]
    fn missing_optional_field_falls_back_to_default_then_null() {
        let f = field("title", FieldType::String);
        assert_eq!(coerce(None, &f).unwrap(), TypedValue::Null);

        let mut with_default = field("title", FieldType::String);
        with_default.default = Some(Value::String("untitled".into()));
        assert_eq!(coerce(None, &with_default).unwrap(), TypedValue::Text("untitled".into()));
    }

    #[test]
    fn enum_rejects_undeclared_value() {
        let mut f = field("status", FieldType::Enum);
        f.values = Some(vec!["draft".into(), "published".into()]);
        assert!(coerce(Some(&Value::String("archived".into())), &f).is_err());
        assert_eq!(
            coerce(Some(&Value::String("draft".into())), &f).unwrap(),
            TypedValue::Text("draft".into())
        );
    }

    #[test]
    fn date_and_datetime_parse_iso8601() {
        let date_field = field("published", FieldType::Date);
        assert!(coerce(Some(&Value::String("2024-01-15".into())), &date_field).is_ok());
        assert!(coerce(Some(&Value::String("not-a-date".into())), &date_field).is_err());

        let dt_field = field("created", FieldType::DateTime);
        assert!(coerce(Some(&Value::String("2024-01-15T10:30:00Z".into())), &dt_field).is_ok());
    }

    #[test]
    fn int_and_float_coerce_from_string_and_cross_numeric_type() {
        let int_field = field("year", FieldType::Int);
        assert_eq!(coerce(Some(&Value::String("2024".into())), &int_field).unwrap(), TypedValue::Int(2024));
        assert_eq!(coerce(Some(&Value::Float(2024.9)), &int_field).unwrap(), TypedValue::Int(2024));
        assert!(coerce(Some(&Value::String("not-a-number".into())), &int_field).is_err());

        let float_field = field("score", FieldType::Float);
        assert_eq!(coerce(Some(&Value::Int(3)), &float_field).unwrap(), TypedValue::Float(3.0));
    }

    #[test]
    fn array_type_must_go_through_array_coercion() {
        let f = field("tags", FieldType::Array);
        assert!(coerce(Some(&Value::List(vec![])), &f).is_err());
    }

    #[test]
    fn value_json_round_trip_preserves_shape() {
        let v = Value::Map(BTreeMap::from([
            ("n".to_string(), Value::Int(1)),
            ("s".to_string(), Value::String("x".into())),
        ]));
        let json: serde_json::Value = v.clone().into();
        let back: Value = json.into();
        assert_eq!(v, back);
    }
}
