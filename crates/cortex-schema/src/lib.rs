pub mod ddl;
pub mod parse;
pub mod vector;

pub use ddl::{compile_ddl, render_sql, ArrayTableDef, ColumnDef, DdlPlan, TableDef};
pub use parse::parse_schema;
pub use vector::{compile_vector_spec, PayloadFieldKind, PayloadIndexSpec, VectorCollectionSpec};

/// Result of a successful `CREATE COLLECTION`, summarizing the concrete
/// resources the schema compiler derived: the primary table name, the
/// vector collection name (if any), and the bucket name (if any).
#[derive(Debug, Clone)]
pub struct CollectionCreationResult {
    pub postgres_table: String,
    pub qdrant_collection: Option<String>,
    pub minio_bucket: Option<String>,
}
