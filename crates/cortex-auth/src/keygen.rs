use cortex_core::ApiKeyType;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of random bytes behind the 64 hex characters of key material.
const KEY_BYTES: usize = 32;

/// Generate a new plaintext API key of the form
/// `cortexdb_{admin|live|test}_{64 hex chars}`, its SHA-256 hex hash, and
/// its display prefix (first 25 plaintext characters plus a literal
/// `"..."`, matching the reference implementation).
pub fn generate_api_key(key_type: ApiKeyType) -> (String, String, String) {
    let mut bytes = [0u8; KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let hex = hex_encode(&bytes);
    let full_key = format!("cortexdb_{}_{}", key_type.prefix_segment(), hex);
    let key_hash = hash_api_key(&full_key);
    let key_prefix = display_prefix(&full_key);
    (full_key, key_hash, key_prefix)
}

/// SHA-256 hex digest of a plaintext key.
pub fn hash_api_key(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    hex_encode(&hasher.finalize())
}

/// The first 25 plaintext characters followed by a literal `"..."`.
pub fn display_prefix(plaintext: &str) -> String {
    let truncated: String = plaintext.chars().take(25).collect();
    format!("{truncated}...")
}

/// Strip an optional `Bearer ` prefix from an `Authorization` header value.
pub fn extract_key_from_header(header: &str) -> &str {
    header.strip_prefix("Bearer ").unwrap_or(header).trim()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_has_expected_shape() {
        let (full_key, key_hash, key_prefix) = generate_api_key(ApiKeyType::Admin);
        assert!(full_key.starts_with("cortexdb_admin_"));
        assert_eq!(full_key.len(), "cortexdb_admin_".len() + 64);
        assert_eq!(key_hash, hash_api_key(&full_key));
        assert_eq!(key_prefix.len(), 28);
        assert!(key_prefix.ends_with("..."));
    }

    #[test]
    fn database_and_readonly_prefixes() {
        let (live_key, _, _) = generate_api_key(ApiKeyType::Database);
        assert!(live_key.starts_with("cortexdb_live_"));
        let (test_key, _, _) = generate_api_key(ApiKeyType::Readonly);
        assert!(test_key.starts_with("cortexdb_test_"));
    }

    #[test]
    fn bearer_prefix_is_optional() {
        assert_eq!(extract_key_from_header("Bearer abc123"), "abc123");
        assert_eq!(extract_key_from_header("abc123"), "abc123");
    }

    #[test]
    fn hash_is_stable() {
        assert_eq!(hash_api_key("same-input"), hash_api_key("same-input"));
    }
}
