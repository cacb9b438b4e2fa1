pub mod bootstrap;
pub mod cache;
pub mod extractor;
pub mod keygen;
pub mod service;

pub use bootstrap::bootstrap_admin_key;
pub use cache::ApiKeyCache;
pub use extractor::{AuthRejection, CurrentApiKey};
pub use keygen::{display_prefix, extract_key_from_header, generate_api_key, hash_api_key};
pub use service::{
    check_database_access, check_manage_collections, check_manage_databases, check_manage_keys, check_manage_providers,
    check_readonly, require_admin, ApiKeyRepository, AuthService,
};
