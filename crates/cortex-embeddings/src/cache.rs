use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use cortex_core::CortexError;
use tokio::sync::Mutex as AsyncMutex;

use crate::provider::EmbeddingService;

/// Cache key used when a collection has no explicit `embedding_provider_id`
/// bound and falls back to the instance-wide default provider.
pub const DEFAULT_PROVIDER_KEY: &str = "__default__";

/// Process-wide, provider-keyed cache of constructed embedding clients.
///
/// A naive cache keyed on a plain map would let two concurrent
/// first-uses of the same provider both pay the `dim()` probe. First use
/// of a given key is single-flighted through a per-key
/// `tokio::sync::Mutex` instead, so only one caller ever constructs (and
/// probes) a given provider's client.
pub struct EmbeddingCache {
    services: Mutex<HashMap<String, Arc<dyn EmbeddingService>>>,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingCache {
    pub fn new() -> Self {
        EmbeddingCache {
            services: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().expect("embedding cache lock poisoned");
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Return the cached service for `key`, constructing it via `factory`
    /// on first use. Concurrent callers racing on the same unpopulated
    /// key block on the same per-key lock; only one of them runs `factory`.
    pub async fn get_or_create<F, Fut>(&self, key: &str, factory: F) -> Result<Arc<dyn EmbeddingService>, CortexError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<dyn EmbeddingService>, CortexError>>,
    {
        if let Some(svc) = self.services.lock().expect("embedding cache lock poisoned").get(key) {
            return Ok(svc.clone());
        }

        let key_lock = self.lock_for(key);
        let _guard = key_lock.lock().await;

        if let Some(svc) = self.services.lock().expect("embedding cache lock poisoned").get(key) {
            return Ok(svc.clone());
        }

        let svc = factory().await?;
        self.services
            .lock()
            .expect("embedding cache lock poisoned")
            .insert(key.to_string(), svc.clone());
        Ok(svc)
    }

    /// Invalidate a provider's cached client, e.g. after the provider is
    /// deleted or recreated through the providers registry.
    pub fn invalidate(&self, key: &str) {
        self.services.lock().expect("embedding cache lock poisoned").remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingService {
        dim: u32,
    }

    #[async_trait]
    impl EmbeddingService for CountingService {
        async fn embed_text(&self, _text: &str) -> Result<Vec<f32>, CortexError> {
            Ok(vec![0.0; self.dim as usize])
        }

        async fn dim(&self) -> Result<u32, CortexError> {
            Ok(self.dim)
        }
    }

    #[tokio::test]
    async fn single_flight_constructs_once_under_concurrency() {
        let cache = Arc::new(EmbeddingCache::new());
        let construct_count = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let construct_count = construct_count.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_create(DEFAULT_PROVIDER_KEY, || async move {
                        construct_count.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        Ok(Arc::new(CountingService { dim: 768 }) as Arc<dyn EmbeddingService>)
                    })
                    .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(construct_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_reconstruction() {
        let cache = EmbeddingCache::new();
        cache
            .get_or_create(DEFAULT_PROVIDER_KEY, || async {
                Ok(Arc::new(CountingService { dim: 4 }) as Arc<dyn EmbeddingService>)
            })
            .await
            .unwrap();

        cache.invalidate(DEFAULT_PROVIDER_KEY);

        let constructed = Arc::new(AtomicUsize::new(0));
        let constructed_clone = constructed.clone();
        cache
            .get_or_create(DEFAULT_PROVIDER_KEY, || async move {
                constructed_clone.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(CountingService { dim: 4 }) as Arc<dyn EmbeddingService>)
            })
            .await
            .unwrap();

        assert_eq!(constructed.load(Ordering::SeqCst), 1);
    }
}
