pub mod apikey;
pub mod connection;
pub mod database;
pub mod error;
pub mod filter;
pub mod schema;
pub mod value;

pub use apikey::{ApiKey, ApiKeyCreate, ApiKeyCreated, ApiKeyPermissions, ApiKeyResponse, ApiKeyType, ApiKeyUpdate};
pub use database::{Database, DatabaseCreate, EmbeddingProvider, EmbeddingProviderCreate};
pub use error::{CortexError, CortexResult, ErrorBody};
pub use filter::{parse_filters, FilterClause, FilterOp};
pub use schema::{
    quote_ident, valid_identifier, CollectionConfig, CollectionSchema, ExtractConfig, FieldDefinition, FieldType,
    StoreLocation,
};
pub use value::{coerce, TypedValue, Value};

use uuid::Uuid;

/// Deterministic vector-point id: UUIDv5 of `"{record_id}:{field}:{i}"`
/// in the DNS namespace. Re-ingesting the same chunk overwrites the same
/// point; this is a load-bearing contract, not an implementation detail.
pub fn vector_point_id(record_id: Uuid, field: &str, chunk_index: usize) -> Uuid {
    let name = format!("{record_id}:{field}:{chunk_index}");
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, name.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_point_id_is_deterministic() {
        let record_id = Uuid::nil();
        let a = vector_point_id(record_id, "content", 0);
        let b = vector_point_id(record_id, "content", 0);
        assert_eq!(a, b);
        let c = vector_point_id(record_id, "content", 1);
        assert_ne!(a, c);
    }
}
