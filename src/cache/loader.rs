//! Cache-through attachment loading

use std::sync::Arc;

use crate::registry::AttachmentRecord;

use super::{resolve_mime, BlobCache, BlobFetcher, CacheEntry, CacheKey, FetchError, FetchPriority};

/// Loads attachment payloads through the blob cache
#[derive(Clone)]
pub struct AttachmentLoader {
    cache: BlobCache,
    fetcher: Arc<dyn BlobFetcher>,
}

impl AttachmentLoader {
    pub fn new(cache: BlobCache, fetcher: Arc<dyn BlobFetcher>) -> Self {
        Self { cache, fetcher }
    }

    pub fn cache(&self) -> &BlobCache {
        &self.cache
    }

    pub fn cache_key(record: &AttachmentRecord) -> CacheKey {
        CacheKey::new(&record.content_hash, &record.full_url)
    }

    pub async fn is_cached(&self, record: &AttachmentRecord) -> bool {
        self.cache.contains(&Self::cache_key(record)).await
    }

    /// Load a record's payload
    ///
    /// A cache hit returns without touching the network. On a miss the
    /// payload is fetched, its content type resolved, and the result stored
    /// keyed by (hash, URL). Failures are returned as-is; nothing retries.
    pub async fn load(
        &self,
        record: &AttachmentRecord,
        priority: FetchPriority,
    ) -> Result<Arc<CacheEntry>, FetchError> {
        let key = Self::cache_key(record);
        if let Some(entry) = self.cache.get(&key).await {
            tracing::trace!(hash = %record.content_hash, "Cache hit");
            return Ok(entry);
        }

        tracing::debug!(
            hash = %record.content_hash,
            ordinal = record.ordinal,
            ?priority,
            "Fetching attachment"
        );
        let fetched = self.fetcher.fetch(&record.full_url, priority).await?;
        let mime = resolve_mime(
            fetched.declared_type.as_deref(),
            &record.display_name,
            &record.full_url,
        );

        Ok(self.cache.insert(key, fetched.bytes, mime).await)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory fetcher shared by the cache, preload and viewer tests

    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::sync::Notify;

    use super::super::{BlobFetcher, FetchError, FetchPriority, FetchedBlob};

    #[derive(Default)]
    pub struct FakeFetcher {
        responses: Mutex<HashMap<String, Result<FetchedBlob, FetchError>>>,
        calls: Mutex<Vec<(String, FetchPriority)>>,
        gates: Mutex<HashMap<String, Arc<Notify>>>,
    }

    impl FakeFetcher {
        pub fn serve(&self, url: &str, bytes: &[u8], declared_type: Option<&str>) {
            self.responses.lock().insert(
                url.to_string(),
                Ok(FetchedBlob {
                    bytes: bytes.to_vec(),
                    declared_type: declared_type.map(str::to_string),
                }),
            );
        }

        pub fn fail(&self, url: &str, error: FetchError) {
            self.responses.lock().insert(url.to_string(), Err(error));
        }

        /// Hold fetches of `url` until the returned gate is notified
        pub fn hold(&self, url: &str) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            self.gates.lock().insert(url.to_string(), Arc::clone(&gate));
            gate
        }

        pub fn calls(&self) -> Vec<(String, FetchPriority)> {
            self.calls.lock().clone()
        }

        pub fn call_count(&self, url: &str) -> usize {
            self.calls.lock().iter().filter(|(u, _)| u == url).count()
        }
    }

    #[async_trait]
    impl BlobFetcher for FakeFetcher {
        async fn fetch(&self, url: &str, priority: FetchPriority) -> Result<FetchedBlob, FetchError> {
            self.calls.lock().push((url.to_string(), priority));
            let gate = self.gates.lock().get(url).cloned();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            let response = self.responses.lock().get(url).cloned();
            response.unwrap_or_else(|| {
                Err(FetchError::Status {
                    status: 404,
                    url: url.to_string(),
                })
            })
        }
    }
}
