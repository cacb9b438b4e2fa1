use cortex_core::{quote_ident, CollectionSchema, FieldDefinition, FieldType, StoreLocation};

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: String,
    pub not_null: bool,
    pub unique: bool,
}

#[derive(Debug, Clone)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    /// Field names that need a secondary `idx_{table}_{field}` index.
    pub indexed_fields: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ArrayTableDef {
    pub name: String,
    pub parent_table: String,
    pub columns: Vec<ColumnDef>,
    pub indexed_fields: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DdlPlan {
    pub primary_table: TableDef,
    pub array_tables: Vec<ArrayTableDef>,
}

/// Map a scalar field type to its Postgres column type. Enums render as
/// `TEXT` with a `CHECK` constraint rendered separately by the caller;
/// array is not a valid input here (array fields never become a column
/// on their own table, only on a child table).
fn map_field_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::String | FieldType::Text | FieldType::File | FieldType::Enum => "TEXT",
        FieldType::Int => "INTEGER",
        FieldType::Float => "DOUBLE PRECISION",
        FieldType::Boolean => "BOOLEAN",
        FieldType::Date => "DATE",
        FieldType::DateTime => "TIMESTAMPTZ",
        FieldType::Json => "JSONB",
        FieldType::Array => unreachable!("array fields never map to a single column"),
    }
}

fn column_for(field: &FieldDefinition) -> ColumnDef {
    ColumnDef {
        name: field.name.clone(),
        sql_type: map_field_type(field.field_type),
        not_null: field.required,
        unique: field.unique,
    }
}

/// Derive the relational table layout for a schema: one primary table
/// (columns for every scalar field routed to `relational`) and one child
/// table per array field routed to `relational`.
pub fn compile_ddl(schema: &CollectionSchema) -> DdlPlan {
    let table_name = schema.name.to_lowercase();

    let mut columns = Vec::new();
    let mut indexed_fields = Vec::new();
    let mut array_tables = Vec::new();

    for field in &schema.fields {
        if !field.store_in.contains(&StoreLocation::Relational) {
            continue;
        }

        match field.field_type {
            FieldType::Array => {
                let nested = field.schema.as_deref().unwrap_or(&[]);
                let mut child_columns = Vec::new();
                let mut child_indexed = Vec::new();
                for nested_field in nested {
                    if !nested_field.store_in.contains(&StoreLocation::Relational) {
                        continue;
                    }
                    child_columns.push(column_for(nested_field));
                    if nested_field.indexed {
                        child_indexed.push(nested_field.name.clone());
                    }
                }
                array_tables.push(ArrayTableDef {
                    name: format!("{table_name}_{}", field.name),
                    parent_table: table_name.clone(),
                    columns: child_columns,
                    indexed_fields: child_indexed,
                });
            }
            _ => {
                columns.push(column_for(field));
                if field.indexed {
                    indexed_fields.push(field.name.clone());
                }
            }
        }
    }

    DdlPlan {
        primary_table: TableDef {
            name: table_name,
            columns,
            indexed_fields,
        },
        array_tables,
    }
}

fn enum_check(table: &str, field: &FieldDefinition) -> Option<String> {
    if field.field_type != FieldType::Enum {
        return None;
    }
    let values = field.values.as_deref().unwrap_or(&[]);
    let list = values
        .iter()
        .map(|v| format!("'{}'", v.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(", ");
    Some(format!(
        "CONSTRAINT chk_{table}_{field} CHECK ({column} IN ({list}))",
        table = table,
        field = field.name,
        column = quote_ident(&field.name),
        list = list
    ))
}

/// Render a `DdlPlan` as a list of SQL statements (`CREATE TABLE` and
/// `CREATE INDEX`, in dependency order) ready to run inside one
/// transaction.
pub fn render_sql(plan: &DdlPlan, schema: &CollectionSchema) -> Vec<String> {
    let mut statements = Vec::new();

    let table = &plan.primary_table;
    let mut column_lines = vec![
        "id UUID PRIMARY KEY DEFAULT gen_random_uuid()".to_string(),
        "created_at TIMESTAMPTZ NOT NULL DEFAULT now()".to_string(),
        "updated_at TIMESTAMPTZ NOT NULL DEFAULT now()".to_string(),
    ];

    for column in &table.columns {
        let mut line = format!("{} {}", quote_ident(&column.name), column.sql_type);
        if column.not_null {
            line.push_str(" NOT NULL");
        }
        if column.unique {
            line.push_str(" UNIQUE");
        }
        column_lines.push(line);

        if let Some(field) = schema.get_field(&column.name) {
            if let Some(check) = enum_check(&table.name, field) {
                column_lines.push(check);
            }
        }
    }

    statements.push(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        table.name,
        column_lines.join(",\n    ")
    ));

    for field_name in &table.indexed_fields {
        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_{field} ON {table} ({column})",
            table = table.name,
            field = field_name,
            column = quote_ident(field_name)
        ));
    }

    for array_table in &plan.array_tables {
        let mut lines = vec![
            "item_id UUID PRIMARY KEY DEFAULT gen_random_uuid()".to_string(),
            format!(
                "parent_id UUID NOT NULL REFERENCES {}(id) ON DELETE CASCADE",
                array_table.parent_table
            ),
            "item_index INTEGER NOT NULL".to_string(),
        ];
        for column in &array_table.columns {
            let mut line = format!("{} {}", quote_ident(&column.name), column.sql_type);
            if column.not_null {
                line.push_str(" NOT NULL");
            }
            lines.push(line);
        }

        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            array_table.name,
            lines.join(",\n    ")
        ));

        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_parent_id ON {table} (parent_id)",
            table = array_table.name
        ));

        for field_name in &array_table.indexed_fields {
            statements.push(format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_{field} ON {table} ({column})",
                table = array_table.name,
                field = field_name,
                column = quote_ident(field_name)
            ));
        }
    }

    statements
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_core::{CollectionConfig, FieldDefinition};

    fn scalar(name: &str, field_type: FieldType, store_in: Vec<StoreLocation>) -> FieldDefinition {
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
            store_in,
            schema: None,
            extract_config: None,
        }
    }

    #[test]
    fn primary_table_has_base_columns_plus_fields() {
        let schema = CollectionSchema {
            name: "docs".to_string(),
            database: None,
            description: None,
            fields: vec![scalar("title", FieldType::String, vec![StoreLocation::Relational])],
            config: CollectionConfig::default(),
        };
        let plan = compile_ddl(&schema);
        assert_eq!(plan.primary_table.name, "docs");
        assert_eq!(plan.primary_table.columns.len(), 1);
        assert_eq!(plan.primary_table.columns[0].sql_type, "TEXT");

        let sql = render_sql(&plan, &schema);
        assert!(sql[0].contains("id UUID PRIMARY KEY"));
        assert!(sql[0].contains("\"title\" TEXT"));
    }

    #[test]
    fn array_field_produces_child_table_with_parent_index() {
        let nested = scalar("value", FieldType::String, vec![StoreLocation::Relational]);
        let mut array_field = scalar("tags", FieldType::Array, vec![StoreLocation::Relational]);
        array_field.schema = Some(vec![nested]);

        let schema = CollectionSchema {
            name: "docs".to_string(),
            database: None,
            description: None,
            fields: vec![array_field],
            config: CollectionConfig::default(),
        };

        let plan = compile_ddl(&schema);
        assert_eq!(plan.array_tables.len(), 1);
        assert_eq!(plan.array_tables[0].name, "docs_tags");

        let sql = render_sql(&plan, &schema);
        assert!(sql.iter().any(|s| s.contains("docs_tags")));
        assert!(sql.iter().any(|s| s.contains("idx_docs_tags_parent_id")));
    }

    #[test]
    fn enum_field_gets_check_constraint() {
        let mut field = scalar("status", FieldType::Enum, vec![StoreLocation::Relational]);
        field.values = Some(vec!["draft".to_string(), "published".to_string()]);
        let schema = CollectionSchema {
            name: "docs".to_string(),
            database: None,
            description: None,
            fields: vec![field],
            config: CollectionConfig::default(),
        };
        let plan = compile_ddl(&schema);
        let sql = render_sql(&plan, &schema);
        assert!(sql[0].contains("CHECK (\"status\" IN ('draft', 'published'))"));
    }

    #[test]
    fn column_and_index_definitions_quote_field_names() {
        let mut field = scalar("title", FieldType::String, vec![StoreLocation::Relational]);
        field.indexed = true;
        let schema = CollectionSchema {
            name: "docs".to_string(),
            database: None,
            description: None,
            fields: vec![field],
            config: CollectionConfig::default(),
        };
        let plan = compile_ddl(&schema);
        let sql = render_sql(&plan, &schema);
        assert!(sql[0].contains("\"title\" TEXT"));
        assert!(sql[1].contains("(\"title\")"));
    }
}
