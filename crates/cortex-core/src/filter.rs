use crate::error::CortexError;

/// One clause of the filter grammar from §6: `field: value` (implicit
/// equality) or `field: {$op: value}`. Store-backend crates each render
/// this into their own query language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
    Lte,
    Gt,
    Lt,
    Ne,
}

impl FilterOp {
    fn from_op_key(key: &str) -> Option<Self> {
        match key {
            "$gte" => Some(FilterOp::Gte),
            "$lte" => Some(FilterOp::Lte),
            "$gt" => Some(FilterOp::Gt),
            "$lt" => Some(FilterOp::Lt),
            "$ne" => Some(FilterOp::Ne),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterClause {
    pub field: String,
    pub op: FilterOp,
    pub value: serde_json::Value,
}

/// Parse a request-body filter map into a flat list of clauses. A field
/// mapping to a scalar is implicit equality; a field mapping to an object
/// expands to one clause per recognised `$op` key. Unknown operator keys
/// are a validation error.
pub fn parse_filters(raw: &serde_json::Map<String, serde_json::Value>) -> Result<Vec<FilterClause>, CortexError> {
    let mut clauses = Vec::new();

    for (field, value) in raw {
        match value {
            serde_json::Value::Object(ops) => {
                for (op_key, op_value) in ops {
                    let op = FilterOp::from_op_key(op_key).ok_or_else(|| {
                        CortexError::validation(format!("unsupported filter operator '{op_key}' on field '{field}'"))
                    })?;
                    clauses.push(FilterClause {
                        field: field.clone(),
                        op,
                        value: op_value.clone(),
                    });
                }
            }
            other => clauses.push(FilterClause {
                field: field.clone(),
                op: FilterOp::Eq,
                value: other.clone(),
            }),
        }
    }

    Ok(clauses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_value_is_equality() {
        let raw = json!({"year": 2024}).as_object().unwrap().clone();
        let clauses = parse_filters(&raw).unwrap();
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].op, FilterOp::Eq);
    }

    #[test]
    fn range_operators_expand_to_multiple_clauses() {
        let raw = json!({"year": {"$gte": 2023, "$lte": 2024}}).as_object().unwrap().clone();
        let clauses = parse_filters(&raw).unwrap();
        assert_eq!(clauses.len(), 2);
        assert!(clauses.iter().any(|c| c.op == FilterOp::Gte));
        assert!(clauses.iter().any(|c| c.op == FilterOp::Lte));
    }

    #[test]
    fn unknown_operator_is_rejected() {
        let raw = json!({"year": {"$foo": 1}}).as_object().unwrap().clone();
        assert!(parse_filters(&raw).is_err());
    }
}
