use cortex_core::{CollectionSchema, CortexError};
use cortex_schema::{render_sql, DdlPlan};
use sqlx::postgres::PgPool;

fn upstream(e: sqlx::Error) -> CortexError {
    CortexError::upstream(format!("postgres error: {e}"))
}

/// Run every statement `render_sql` derives from `plan` against `pool`
/// inside a single transaction — the primary table, its indexes, and
/// every array child table, all or nothing.
pub async fn execute_ddl(pool: &PgPool, plan: &DdlPlan, schema: &CollectionSchema) -> Result<(), CortexError> {
    let statements = render_sql(plan, schema);
    let mut tx = pool.begin().await.map_err(upstream)?;
    for statement in &statements {
        sqlx::raw_sql(statement).execute(&mut *tx).await.map_err(upstream)?;
    }
    tx.commit().await.map_err(upstream)?;
    Ok(())
}

/// Drop a collection's primary table and every array child table,
/// `CASCADE` so foreign-keyed child rows go with it. Idempotent.
pub async fn drop_collection_tables(pool: &PgPool, plan: &DdlPlan) -> Result<(), CortexError> {
    let mut tx = pool.begin().await.map_err(upstream)?;
    for array_table in &plan.array_tables {
        let statement = format!("DROP TABLE IF EXISTS {} CASCADE", array_table.name);
        sqlx::raw_sql(&statement).execute(&mut *tx).await.map_err(upstream)?;
    }
    let statement = format!("DROP TABLE IF EXISTS {} CASCADE", plan.primary_table.name);
    sqlx::raw_sql(&statement).execute(&mut *tx).await.map_err(upstream)?;
    tx.commit().await.map_err(upstream)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_core::{CollectionConfig, FieldDefinition, FieldType, StoreLocation};
    use cortex_schema::compile_ddl;

    #[test]
    fn render_sql_is_what_execute_ddl_runs_statement_by_statement() {
        let schema = CollectionSchema {
            name: "docs".to_string(),
            database: None,
            description: None,
            fields: vec![FieldDefinition {
                name: "title".to_string(),
                field_type: FieldType::String,
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
            }],
            config: CollectionConfig::default(),
        };
        let plan = compile_ddl(&schema);
        let statements = render_sql(&plan, &schema);
        assert_eq!(statements.len(), 1);
        assert!(statements[0].contains("CREATE TABLE"));
    }
}
