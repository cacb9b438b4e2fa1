use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use cortex_core::ApiKey;

const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct CacheEntry {
    key: ApiKey,
    inserted_at: Instant,
}

/// Process-local TTL cache of validated API keys, keyed by the SHA-256
/// hash of the plaintext. The reference implementation is a bare dict
/// with no locking, safe only under Python's single-threaded asyncio
/// model; this version wraps state in a `Mutex` since the gateway is
/// genuinely multi-threaded.
pub struct ApiKeyCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    last_sweep: Mutex<Instant>,
    ttl: Duration,
    sweep_interval: Duration,
}

impl ApiKeyCache {
    pub fn new(ttl_seconds: u64) -> Self {
        ApiKeyCache {
            entries: Mutex::new(HashMap::new()),
            last_sweep: Mutex::new(Instant::now()),
            ttl: Duration::from_secs(ttl_seconds),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Return the cached key for `hash` if present and not expired.
    /// Lazily evicts the looked-up entry if it has expired, and
    /// piggybacks a periodic sweep of the whole cache (at most once per
    /// `sweep_interval`) on whichever reader happens to notice the
    /// interval elapsed.
    pub fn get(&self, hash: &str) -> Option<ApiKey> {
        self.maybe_sweep();

        let mut entries = self.entries.lock().expect("api key cache lock poisoned");
        match entries.get(hash) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.key.clone()),
            Some(_) => {
                entries.remove(hash);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, hash: String, key: ApiKey) {
        let mut entries = self.entries.lock().expect("api key cache lock poisoned");
        entries.insert(
            hash,
            CacheEntry {
                key,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, hash: &str) {
        self.entries.lock().expect("api key cache lock poisoned").remove(hash);
    }

    fn maybe_sweep(&self) {
        let mut last_sweep = self.last_sweep.lock().expect("api key cache lock poisoned");
        if last_sweep.elapsed() < self.sweep_interval {
            return;
        }
        *last_sweep = Instant::now();
        drop(last_sweep);

        let ttl = self.ttl;
        let mut entries = self.entries.lock().expect("api key cache lock poisoned");
        entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);
    }
}

impl Default for ApiKeyCache {
    fn default() -> Self {
        Self::new(300)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cortex_core::{ApiKeyPermissions, ApiKeyType};
    use uuid::Uuid;

    fn sample_key() -> ApiKey {
        ApiKey {
            id: Uuid::nil(),
            key_hash: "hash".to_string(),
            key_prefix: "cortexdb_admin_abc...".to_string(),
            name: "test".to_string(),
            description: None,
            key_type: ApiKeyType::Admin,
            permissions: ApiKeyPermissions::admin_full(),
            created_at: Utc::now(),
            created_by: None,
            last_used_at: None,
            expires_at: None,
            enabled: true,
        }
    }

    #[test]
    fn set_then_get_round_trips() {
        let cache = ApiKeyCache::new(300);
        cache.set("hash".to_string(), sample_key());
        assert!(cache.get("hash").is_some());
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let cache = ApiKeyCache::new(0);
        cache.set("hash".to_string(), sample_key());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("hash").is_none());
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = ApiKeyCache::new(300);
        cache.set("hash".to_string(), sample_key());
        cache.invalidate("hash");
        assert!(cache.get("hash").is_none());
    }
}
