pub mod api_keys;
pub mod collections;
pub mod databases;
pub mod health;
pub mod providers;
pub mod records;
pub mod search;

use cortex_core::{CollectionSchema, CortexError};

use crate::state::Services;

/// Resolve a collection by name alone, as the flat `/collections/{c}/...`
/// surface requires: look in the control pool's own namespace first, then
/// fall back to scanning every registered database's namespace. Collection
/// names only need to be unique within one database.
pub(crate) async fn find_collection(services: &Services, name: &str) -> Result<CollectionSchema, CortexError> {
    if let Some(schema) = services.control.get_collection(None, name).await? {
        return Ok(schema);
    }

    for database in services.control.list_databases().await? {
        if let Some(schema) = services.control.get_collection(Some(&database.name), name).await? {
            return Ok(schema);
        }
    }

    Err(CortexError::not_found(format!("collection '{name}' not found")))
}
