use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use cortex_core::{CortexError, FilterClause, TypedValue};
use cortex_schema::{ArrayTableDef, ColumnDef, DdlPlan};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::pool::quote_ident;

/// A decoded relational record: every base/scalar column plus one JSON
/// array per array field, keyed by field name. This is the shape that
/// crosses into the gateway's response bodies.
pub type RecordRow = serde_json::Map<String, serde_json::Value>;

fn upstream(e: sqlx::Error) -> CortexError {
    CortexError::upstream(format!("postgres error: {e}"))
}

fn array_field_name<'a>(table_name: &str, array_table: &'a ArrayTableDef) -> &'a str {
    array_table
        .name
        .strip_prefix(&format!("{table_name}_"))
        .unwrap_or(array_table.name.as_str())
}

/// Bind `value` as the next placeholder, choosing the Rust/SQL type that
/// matches `column.sql_type` (as rendered by `cortex_schema::ddl`) so NULL
/// binds carry the correct Postgres type instead of an ambiguous untyped
/// NULL.
fn push_bind_column(builder: &mut QueryBuilder<'_, Postgres>, column: &ColumnDef, value: &TypedValue) {
    match column.sql_type {
        "INTEGER" => {
            let v: Option<i32> = match value {
                TypedValue::Int(i) => Some(*i),
                _ => None,
            };
            builder.push_bind(v);
        }
        "DOUBLE PRECISION" => {
            let v: Option<f64> = match value {
                TypedValue::Float(f) => Some(*f),
                _ => None,
            };
            builder.push_bind(v);
        }
        "BOOLEAN" => {
            let v: Option<bool> = match value {
                TypedValue::Bool(b) => Some(*b),
                _ => None,
            };
            builder.push_bind(v);
        }
        "DATE" => {
            let v: Option<chrono::NaiveDate> = match value {
                TypedValue::Date(d) => Some(*d),
                _ => None,
            };
            builder.push_bind(v);
        }
        "TIMESTAMPTZ" => {
            let v: Option<DateTime<Utc>> = match value {
                TypedValue::DateTime(dt) => Some(*dt),
                _ => None,
            };
            builder.push_bind(v);
        }
        "JSONB" => {
            let v: Option<serde_json::Value> = match value {
                TypedValue::Null => None,
                TypedValue::Json(j) => Some(j.clone()),
                other => Some(serde_json::Value::String(other.stringify())),
            };
            builder.push_bind(v);
        }
        _ => {
            // TEXT and the enum CHECK'd text columns.
            let v: Option<String> = match value {
                TypedValue::Null => None,
                other => Some(other.stringify()),
            };
            builder.push_bind(v);
        }
    }
}

fn decode_column(row: &PgRow, column: &ColumnDef) -> Result<serde_json::Value, CortexError> {
    let name = column.name.as_str();
    let value = match column.sql_type {
        "INTEGER" => row
            .try_get::<Option<i32>, _>(name)
            .map_err(upstream)?
            .map(|v| serde_json::Value::Number(v.into())),
        "DOUBLE PRECISION" => row
            .try_get::<Option<f64>, _>(name)
            .map_err(upstream)?
            .and_then(serde_json::Number::from_f64)
            .map(serde_json::Value::Number),
        "BOOLEAN" => row.try_get::<Option<bool>, _>(name).map_err(upstream)?.map(serde_json::Value::Bool),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(name)
            .map_err(upstream)?
            .map(|d| serde_json::Value::String(d.to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(name)
            .map_err(upstream)?
            .map(|d| serde_json::Value::String(d.to_rfc3339())),
        "JSONB" => row.try_get::<Option<serde_json::Value>, _>(name).map_err(upstream)?,
        _ => row
            .try_get::<Option<String>, _>(name)
            .map_err(upstream)?
            .map(serde_json::Value::String),
    };
    Ok(value.unwrap_or(serde_json::Value::Null))
}

fn decode_base_row(row: &PgRow, table: &cortex_schema::TableDef) -> Result<RecordRow, CortexError> {
    let mut map = serde_json::Map::new();
    let id: Uuid = row.try_get("id").map_err(upstream)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(upstream)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(upstream)?;
    map.insert("id".to_string(), serde_json::Value::String(id.to_string()));
    map.insert("created_at".to_string(), serde_json::Value::String(created_at.to_rfc3339()));
    map.insert("updated_at".to_string(), serde_json::Value::String(updated_at.to_rfc3339()));
    for column in &table.columns {
        map.insert(column.name.clone(), decode_column(row, column)?);
    }
    Ok(map)
}

/// Build the JSON representation of a freshly-written record from the
/// values the caller passed in, rather than round-tripping through a
/// second `SELECT` — every value just went through `push_bind_column`
/// against the same `ColumnDef`s, so the two representations agree.
fn record_row_from_values(
    id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    table: &cortex_schema::TableDef,
    values: &BTreeMap<String, TypedValue>,
    plan: &DdlPlan,
    arrays: &BTreeMap<String, Vec<BTreeMap<String, TypedValue>>>,
) -> RecordRow {
    let mut map = serde_json::Map::new();
    map.insert("id".to_string(), serde_json::Value::String(id.to_string()));
    map.insert("created_at".to_string(), serde_json::Value::String(created_at.to_rfc3339()));
    map.insert("updated_at".to_string(), serde_json::Value::String(updated_at.to_rfc3339()));

    for column in &table.columns {
        let value = values.get(&column.name).cloned().unwrap_or(TypedValue::Null);
        map.insert(column.name.clone(), typed_value_to_json(&value));
    }

    for array_table in &plan.array_tables {
        let field_name = array_field_name(&table.name, array_table);
        let rows = arrays.get(field_name).cloned().unwrap_or_default();
        let items = rows
            .iter()
            .map(|row| {
                let mut item = serde_json::Map::new();
                for column in &array_table.columns {
                    let value = row.get(&column.name).cloned().unwrap_or(TypedValue::Null);
                    item.insert(column.name.clone(), typed_value_to_json(&value));
                }
                serde_json::Value::Object(item)
            })
            .collect();
        map.insert(field_name.to_string(), serde_json::Value::Array(items));
    }

    map
}

fn typed_value_to_json(value: &TypedValue) -> serde_json::Value {
    match value {
        TypedValue::Null => serde_json::Value::Null,
        TypedValue::Text(s) => serde_json::Value::String(s.clone()),
        TypedValue::Int(i) => serde_json::Value::Number((*i).into()),
        TypedValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        TypedValue::Bool(b) => serde_json::Value::Bool(*b),
        TypedValue::Date(d) => serde_json::Value::String(d.to_string()),
        TypedValue::DateTime(dt) => serde_json::Value::String(dt.to_rfc3339()),
        TypedValue::Json(v) => v.clone(),
    }
}

/// Insert a new primary row (and any array child rows) inside one
/// transaction, per §4.2's coordinated-write ordering.
///
/// `id` is generated by the caller (the ingestion pipeline), not the
/// database default: a file field's object path is derived from the
/// record id and must be known before any blob is uploaded, which
/// happens before this insert runs.
pub async fn insert_record(
    pool: &PgPool,
    plan: &DdlPlan,
    id: Uuid,
    values: &BTreeMap<String, TypedValue>,
    arrays: &BTreeMap<String, Vec<BTreeMap<String, TypedValue>>>,
) -> Result<RecordRow, CortexError> {
    let table = &plan.primary_table;
    let mut tx = pool.begin().await.map_err(upstream)?;

    let mut builder = QueryBuilder::new(format!("INSERT INTO {} (id", table.name));
    for column in &table.columns {
        builder.push(", ").push(quote_ident(&column.name));
    }
    builder.push(") VALUES (");
    builder.push_bind(id);
    for column in &table.columns {
        builder.push(", ");
        let value = values.get(&column.name).cloned().unwrap_or(TypedValue::Null);
        push_bind_column(&mut builder, column, &value);
    }
    builder.push(") RETURNING id, created_at, updated_at");

    let (id, created_at, updated_at): (Uuid, DateTime<Utc>, DateTime<Utc>) = builder
        .build_query_as()
        .fetch_one(&mut *tx)
        .await
        .map_err(upstream)?;

    for array_table in &plan.array_tables {
        let field_name = array_field_name(&table.name, array_table);
        if let Some(rows) = arrays.get(field_name) {
            for (index, row_values) in rows.iter().enumerate() {
                insert_one_array_row(&mut tx, array_table, id, index, row_values).await?;
            }
        }
    }

    tx.commit().await.map_err(upstream)?;

    Ok(record_row_from_values(id, created_at, updated_at, table, values, plan, arrays))
}

async fn insert_one_array_row(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    array_table: &ArrayTableDef,
    parent_id: Uuid,
    index: usize,
    row_values: &BTreeMap<String, TypedValue>,
) -> Result<(), CortexError> {
    let mut names = vec!["parent_id".to_string(), "item_index".to_string()];
    for column in &array_table.columns {
        names.push(quote_ident(&column.name));
    }

    let mut builder = QueryBuilder::new(format!("INSERT INTO {} (", array_table.name));
    builder.push(names.join(", "));
    builder.push(") VALUES (");
    builder.push_bind(parent_id);
    builder.push(", ");
    builder.push_bind(index as i32);
    for column in &array_table.columns {
        builder.push(", ");
        let value = row_values.get(&column.name).cloned().unwrap_or(TypedValue::Null);
        push_bind_column(&mut builder, column, &value);
    }
    builder.push(")");

    builder.build().execute(&mut **tx).await.map_err(upstream)?;
    Ok(())
}

/// Update an existing row's scalar columns and replace each touched array
/// field's child rows wholesale. Returns `false` if no row with `id`
/// exists (the caller reports `NotFound`).
pub async fn update_record(
    pool: &PgPool,
    plan: &DdlPlan,
    id: Uuid,
    values: &BTreeMap<String, TypedValue>,
    arrays: &BTreeMap<String, Vec<BTreeMap<String, TypedValue>>>,
) -> Result<bool, CortexError> {
    let table = &plan.primary_table;
    let mut tx = pool.begin().await.map_err(upstream)?;

    let mut builder = QueryBuilder::new(format!("UPDATE {} SET updated_at = now()", table.name));
    for column in &table.columns {
        if let Some(value) = values.get(&column.name) {
            builder.push(", ").push(quote_ident(&column.name)).push(" = ");
            push_bind_column(&mut builder, column, value);
        }
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder.build().execute(&mut *tx).await.map_err(upstream)?;
    if result.rows_affected() == 0 {
        tx.rollback().await.ok();
        return Ok(false);
    }

    for array_table in &plan.array_tables {
        let field_name = array_field_name(&table.name, array_table);
        if let Some(rows) = arrays.get(field_name) {
            let mut del = QueryBuilder::new(format!("DELETE FROM {} WHERE parent_id = ", array_table.name));
            del.push_bind(id);
            del.build().execute(&mut *tx).await.map_err(upstream)?;

            for (index, row_values) in rows.iter().enumerate() {
                insert_one_array_row(&mut tx, array_table, id, index, row_values).await?;
            }
        }
    }

    tx.commit().await.map_err(upstream)?;
    Ok(true)
}

/// Fetch one record with its array fields hydrated, in document order.
pub async fn get_record(pool: &PgPool, plan: &DdlPlan, id: Uuid) -> Result<Option<RecordRow>, CortexError> {
    let table = &plan.primary_table;
    let mut builder = QueryBuilder::new(format!("SELECT * FROM {} WHERE id = ", table.name));
    builder.push_bind(id);

    let row = builder.build().fetch_optional(pool).await.map_err(upstream)?;
    let Some(row) = row else {
        return Ok(None);
    };
    let mut map = decode_base_row(&row, table)?;

    for array_table in &plan.array_tables {
        let field_name = array_field_name(&table.name, array_table);
        let mut b = QueryBuilder::new(format!("SELECT * FROM {} WHERE parent_id = ", array_table.name));
        b.push_bind(id);
        b.push(" ORDER BY item_index ASC");
        let rows = b.build().fetch_all(pool).await.map_err(upstream)?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut item = serde_json::Map::new();
            for column in &array_table.columns {
                item.insert(column.name.clone(), decode_column(row, column)?);
            }
            items.push(serde_json::Value::Object(item));
        }
        map.insert(field_name.to_string(), serde_json::Value::Array(items));
    }

    Ok(Some(map))
}

/// Delete a record's primary row; array children cascade via their
/// foreign key. Returns whether a row existed.
pub async fn delete_record(pool: &PgPool, plan: &DdlPlan, id: Uuid) -> Result<bool, CortexError> {
    let table = &plan.primary_table;
    let mut builder = QueryBuilder::new(format!("DELETE FROM {} WHERE id = ", table.name));
    builder.push_bind(id);
    let result = builder.build().execute(pool).await.map_err(upstream)?;
    Ok(result.rows_affected() > 0)
}

/// List records against the filter grammar with pagination, for
/// `POST /collections/{c}/query`. Array fields are not hydrated here —
/// only `get_record` does the per-record array fetch, to keep list scans
/// to one query plus one count query.
pub async fn list_records(
    pool: &PgPool,
    plan: &DdlPlan,
    clauses: &[FilterClause],
    limit: i64,
    offset: i64,
) -> Result<(Vec<RecordRow>, i64), CortexError> {
    let table = &plan.primary_table;

    let mut count_builder = QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", table.name));
    crate::filter::push_where(&mut count_builder, table, clauses)?;
    let total: i64 = count_builder
        .build_query_scalar()
        .fetch_one(pool)
        .await
        .map_err(upstream)?;

    let mut builder = QueryBuilder::new(format!("SELECT * FROM {}", table.name));
    crate::filter::push_where(&mut builder, table, clauses)?;
    builder.push(" ORDER BY created_at DESC LIMIT ");
    builder.push_bind(limit);
    builder.push(" OFFSET ");
    builder.push_bind(offset);

    let rows = builder.build().fetch_all(pool).await.map_err(upstream)?;
    let records = rows.iter().map(|row| decode_base_row(row, table)).collect::<Result<Vec<_>, _>>()?;

    Ok((records, total))
}

/// Bulk-fetch rows by id for hybrid-search hydration (§4.5 step 7). Order
/// is not guaranteed to match `ids`; the caller re-sorts by score.
pub async fn get_records_by_ids(pool: &PgPool, plan: &DdlPlan, ids: &[Uuid]) -> Result<Vec<RecordRow>, CortexError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let table = &plan.primary_table;
    let mut builder = QueryBuilder::new(format!("SELECT * FROM {} WHERE id = ANY(", table.name));
    builder.push_bind(ids.to_vec());
    builder.push(")");

    let rows = builder.build().fetch_all(pool).await.map_err(upstream)?;
    rows.iter().map(|row| decode_base_row(row, table)).collect()
}
