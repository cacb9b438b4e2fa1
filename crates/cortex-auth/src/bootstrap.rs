use chrono::Utc;
use cortex_core::connection::format_connection_string;
use cortex_core::{ApiKey, ApiKeyPermissions, ApiKeyType, CortexError};
use uuid::Uuid;

use crate::keygen::{display_prefix, generate_api_key, hash_api_key};
use crate::service::ApiKeyRepository;

const ADMIN_KEY_ENV_VAR: &str = "CORTEXDB_ADMIN_KEY";

/// On startup, if the control catalog holds zero enabled admin keys,
/// either consume a plaintext admin key from `CORTEXDB_ADMIN_KEY` or
/// generate one, store its hash, and print the plaintext exactly once —
/// the operator's only opportunity to capture it.
pub async fn bootstrap_admin_key(repo: &dyn ApiKeyRepository, host: &str, port: u16) -> Result<(), CortexError> {
    if repo.count_enabled_admin_keys().await? > 0 {
        return Ok(());
    }

    let (plaintext, key_hash, key_prefix) = match std::env::var(ADMIN_KEY_ENV_VAR) {
        Ok(plaintext) if !plaintext.is_empty() => {
            let hash = hash_api_key(&plaintext);
            let prefix = display_prefix(&plaintext);
            (plaintext, hash, prefix)
        }
        _ => generate_api_key(ApiKeyType::Admin),
    };

    let key = ApiKey {
        id: Uuid::new_v4(),
        key_hash,
        key_prefix,
        name: "bootstrap-admin".to_string(),
        description: Some("Created automatically on first startup".to_string()),
        key_type: ApiKeyType::Admin,
        permissions: ApiKeyPermissions::admin_full(),
        created_at: Utc::now(),
        created_by: None,
        last_used_at: None,
        expires_at: None,
        enabled: true,
    };

    repo.insert(key).await?;

    let connection_string = format_connection_string(Some(&plaintext), host, port);

    println!("================================================================================");
    println!(" CortexDB: no admin API key found. A new one has been created.");
    println!();
    println!("   {plaintext}");
    println!();
    println!(" Example connection string:");
    println!("   {connection_string}");
    println!();
    println!(" This key will not be shown again — store it securely now.");
    println!("================================================================================");

    tracing::info!("bootstrap_admin_key_created");

    Ok(())
}
