use cortex_core::{CortexError, FilterClause, FilterOp};
use cortex_schema::TableDef;
use sqlx::{Postgres, QueryBuilder};

use crate::pool::quote_ident;

pub use cortex_core::parse_filters;

fn sql_operator(op: FilterOp) -> &'static str {
    match op {
        FilterOp::Eq => "=",
        FilterOp::Gte => ">=",
        FilterOp::Lte => "<=",
        FilterOp::Gt => ">",
        FilterOp::Lt => "<",
        FilterOp::Ne => "<>",
    }
}

/// Append `WHERE <clause> AND <clause> ...` to `builder`, binding every
/// value. `clause.field` comes straight from a request body (see
/// `cortex_core::parse_filters`), so every field is checked against
/// `table`'s actual columns before anything is appended — an unknown
/// field is rejected rather than interpolated. The column name is still
/// quoted via `quote_ident` once it passes that check.
pub fn push_where(
    builder: &mut QueryBuilder<'_, Postgres>,
    table: &TableDef,
    clauses: &[FilterClause],
) -> Result<(), CortexError> {
    if clauses.is_empty() {
        return Ok(());
    }

    for clause in clauses {
        if !table.columns.iter().any(|c| c.name == clause.field) {
            return Err(CortexError::validation(format!(
                "'{}' is not a filterable field on this collection",
                clause.field
            )));
        }
    }

    builder.push(" WHERE ");
    for (i, clause) in clauses.iter().enumerate() {
        if i > 0 {
            builder.push(" AND ");
        }
        builder.push(quote_ident(&clause.field)).push(' ').push(sql_operator(clause.op)).push(' ');
        push_bind_json(builder, &clause.value);
    }
    Ok(())
}

/// Bind a `serde_json::Value` scalar as the next placeholder. Compound
/// values (array/object) fall back to the JSON text representation so a
/// mismatched filter value fails the query rather than panicking.
fn push_bind_json(builder: &mut QueryBuilder<'_, Postgres>, value: &serde_json::Value) {
    match value {
        serde_json::Value::String(s) => {
            builder.push_bind(s.clone());
        }
        serde_json::Value::Bool(b) => {
            builder.push_bind(*b);
        }
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                builder.push_bind(i as i32);
            } else {
                builder.push_bind(n.as_f64().unwrap_or(0.0));
            }
        }
        other => {
            builder.push_bind(other.to_string());
        }
    }
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
    }

    fn table_with_column(name: &str) -> TableDef {
        TableDef {
            name: "docs".to_string(),
            columns: vec![cortex_schema::ColumnDef {
                name: name.to_string(),
                sql_type: "TEXT".to_string(),
                not_null: false,
                unique: false,
            }],
            indexed_fields: vec![],
        }
    }

    #[test]
    fn push_where_rejects_a_field_that_is_not_a_known_column() {
        let raw = json!({"1=1 OR (SELECT 1)=1 --": 0}).as_object().unwrap().clone();
        let clauses = parse_filters(&raw).unwrap();
        let table = table_with_column("year");
        let mut builder = QueryBuilder::new("SELECT * FROM docs");
        assert!(push_where(&mut builder, &table, &clauses).is_err());
    }

    #[test]
    fn push_where_quotes_a_known_column() {
        let raw = json!({"year": 2024}).as_object().unwrap().clone();
        let clauses = parse_filters(&raw).unwrap();
        let table = table_with_column("year");
        let mut builder = QueryBuilder::new("SELECT * FROM docs");
        push_where(&mut builder, &table, &clauses).unwrap();
        assert!(builder.sql().contains("\"year\""));
    }
}
