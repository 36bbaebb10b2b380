//! Attachment blob cache and preloading
//!
//! In-memory cache of attachment payloads keyed by content hash + URL.
//! Entries are immutable once inserted; both the foreground loader and the
//! preloader only ever insert-if-absent.
//!
//! # Eviction
//!
//! The cache is bounded by entry count. When over capacity, the oldest
//! entries are evicted first, except entries whose record currently sits
//! within the protect radius of the item being viewed. Those stay
//! regardless of age, so single-step navigation never misses. Distances are
//! measured against the registry at eviction time, never against the
//! position a record had when its payload was cached.

mod content;
mod fetcher;
mod loader;
mod preload;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

pub use content::{extension_for, resolve_mime, ContentKind, OCTET_STREAM};
pub use fetcher::{BlobFetcher, FetchError, FetchPriority, FetchedBlob, HttpFetcher};
pub use loader::AttachmentLoader;
pub use preload::{PreloadConfig, PreloadPlan, Preloader};

#[cfg(test)]
pub(crate) use loader::testing;

/// Cache configuration options
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of cached payloads
    pub max_entries: usize,
    /// Entries within this ordinal distance of the current item are never evicted
    pub protect_radius: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10,
            protect_radius: 3,
        }
    }
}

/// Cache key: content hash plus the URL the payload came from
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheKey {
    pub hash: String,
    pub url: String,
}

impl CacheKey {
    pub fn new(hash: &str, url: &str) -> Self {
        Self {
            hash: hash.to_string(),
            url: url.to_string(),
        }
    }
}

/// A cached attachment payload
#[derive(Debug)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub bytes: Arc<Vec<u8>>,
    pub mime: String,
    /// SHA-256 of the payload, hex encoded
    pub digest: String,
    /// Insertion order; lower is older
    pub sequence: u64,
    pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn kind(&self) -> ContentKind {
        ContentKind::from_mime(&self.mime)
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Hex SHA-256 digest of a payload
pub fn payload_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Thread-safe blob cache
#[derive(Clone)]
pub struct BlobCache {
    entries: Arc<RwLock<HashMap<CacheKey, Arc<CacheEntry>>>>,
    sequence: Arc<AtomicU64>,
    config: CacheConfig,
}

impl Default for BlobCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl BlobCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            sequence: Arc::new(AtomicU64::new(0)),
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        let entries = self.entries.read().await;
        entries.get(key).cloned()
    }

    pub async fn contains(&self, key: &CacheKey) -> bool {
        let entries = self.entries.read().await;
        entries.contains_key(key)
    }

    /// Insert a payload unless the key is already cached
    ///
    /// Returns the entry that is in the cache afterwards, which is the
    /// existing one when the key was present.
    pub async fn insert(
        &self,
        key: CacheKey,
        bytes: Vec<u8>,
        mime: String,
    ) -> Arc<CacheEntry> {
        let mut entries = self.entries.write().await;
        if let Some(existing) = entries.get(&key) {
            return Arc::clone(existing);
        }

        let entry = Arc::new(CacheEntry {
            digest: payload_digest(&bytes),
            key: key.clone(),
            bytes: Arc::new(bytes),
            mime,
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            cached_at: Utc::now(),
        });
        entries.insert(key, Arc::clone(&entry));
        entry
    }

    pub async fn remove(&self, key: &CacheKey) -> bool {
        let mut entries = self.entries.write().await;
        entries.remove(key).is_some()
    }

    /// Remove every entry belonging to a content hash
    pub async fn remove_hash(&self, hash: &str) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| key.hash != hash);
        before - entries.len()
    }

    /// Enforce the size cap around the current ordinal
    ///
    /// `ordinal_of` maps a content hash to its record's present ordinal.
    /// Evicts oldest-first among entries farther than the protect radius
    /// from `current` (hashes no longer registered are never protected),
    /// until the cache is within capacity or no unprotected entry is left.
    /// Returns the evicted keys.
    pub async fn manage_size<F>(&self, current: usize, ordinal_of: F) -> Vec<CacheKey>
    where
        F: Fn(&str) -> Option<usize>,
    {
        let mut entries = self.entries.write().await;
        if entries.len() <= self.config.max_entries {
            return Vec::new();
        }

        let mut candidates: Vec<(u64, CacheKey)> = entries
            .values()
            .filter(|entry| match ordinal_of(&entry.key.hash) {
                Some(ordinal) => ordinal.abs_diff(current) > self.config.protect_radius,
                None => true,
            })
            .map(|entry| (entry.sequence, entry.key.clone()))
            .collect();
        candidates.sort_by_key(|(sequence, _)| *sequence);

        let excess = entries.len() - self.config.max_entries;
        let evicted: Vec<CacheKey> = candidates.into_iter().take(excess).map(|(_, key)| key).collect();
        for key in &evicted {
            entries.remove(key);
        }

        if !evicted.is_empty() {
            tracing::debug!(
                evicted = evicted.len(),
                remaining = entries.len(),
                current,
                "Evicted cache entries"
            );
        }

        evicted
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
    }

    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        let entries = self.entries.read().await;
        entries.is_empty()
    }

    /// Summaries of every cached payload, oldest first
    pub async fn summaries(&self) -> Vec<CachedPayload> {
        let entries = self.entries.read().await;
        let mut summaries: Vec<(u64, CachedPayload)> = entries
            .values()
            .map(|entry| {
                (
                    entry.sequence,
                    CachedPayload {
                        hash: entry.key.hash.clone(),
                        url: entry.key.url.clone(),
                        mime: entry.mime.clone(),
                        size: entry.size(),
                        digest: entry.digest.clone(),
                        cached_at: entry.cached_at,
                    },
                )
            })
            .collect();
        summaries.sort_by_key(|(sequence, _)| *sequence);
        summaries.into_iter().map(|(_, summary)| summary).collect()
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        CacheStats {
            entries: entries.len(),
            capacity: self.config.max_entries,
            total_bytes: entries.values().map(|entry| entry.size()).sum(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub total_bytes: usize,
}

/// One cached payload, as listed by the attachments endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedPayload {
    pub hash: String,
    pub url: String,
    pub mime: String,
    pub size: usize,
    pub digest: String,
    pub cached_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: usize) -> CacheKey {
        CacheKey::new(&format!("hash{}", n), &format!("https://host/att?th=hash{}", n))
    }

    /// Registry lookup where `hashN` sits at ordinal N
    fn ordinal_of(hash: &str) -> Option<usize> {
        hash.strip_prefix("hash")?.parse().ok()
    }

    async fn fill(cache: &BlobCache, ordinals: impl IntoIterator<Item = usize>) {
        for ordinal in ordinals {
            cache.insert(key(ordinal), vec![ordinal as u8; 4], "image/png".into()).await;
        }
    }

    #[tokio::test]
    async fn test_insert_if_absent_keeps_first_payload() {
        let cache = BlobCache::default();
        let first = cache.insert(key(1), b"first".to_vec(), "text/plain".into()).await;
        let second = cache.insert(key(1), b"second".to_vec(), "text/plain".into()).await;

        assert_eq!(second.bytes.as_slice(), b"first");
        assert_eq!(first.digest, second.digest);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_manage_size_under_capacity_is_noop() {
        let cache = BlobCache::default();
        fill(&cache, 0..10).await;
        assert!(cache.manage_size(0, ordinal_of).await.is_empty());
        assert_eq!(cache.len().await, 10);
    }

    #[tokio::test]
    async fn test_far_entry_evicted_before_near_one() {
        let cache = BlobCache::default();
        // Ordinal 4 is the oldest entry, ordinal 0 the second oldest
        fill(&cache, [4, 0]).await;
        fill(&cache, 5..14).await;
        assert_eq!(cache.len().await, 11);

        let evicted = cache.manage_size(5, ordinal_of).await;

        assert_eq!(evicted, vec![key(0)]);
        assert!(cache.contains(&key(4)).await);
        assert_eq!(cache.len().await, 10);
    }

    #[tokio::test]
    async fn test_protected_entries_survive_even_over_capacity() {
        let cache = BlobCache::new(CacheConfig {
            max_entries: 2,
            protect_radius: 3,
        });
        fill(&cache, [2, 3, 4, 5, 6, 9]).await;

        let evicted = cache.manage_size(4, ordinal_of).await;

        // Only ordinal 9 lies outside the radius
        assert_eq!(evicted, vec![key(9)]);
        assert_eq!(cache.len().await, 5);
    }

    #[tokio::test]
    async fn test_eviction_never_touches_protected_radius() {
        for current in 0..20 {
            let cache = BlobCache::default();
            fill(&cache, (0..20).rev()).await;

            let evicted = cache.manage_size(current, ordinal_of).await;
            for key in &evicted {
                let ordinal: usize = key.hash.trim_start_matches("hash").parse().unwrap();
                assert!(ordinal.abs_diff(current) > 3);
            }
            assert_eq!(cache.len().await, 10);
        }
    }

    #[tokio::test]
    async fn test_protection_follows_present_ordinals() {
        let cache = BlobCache::default();
        fill(&cache, 10..21).await;

        // Ordinals 0..10 were purged and the rest compacted: hashN now sits at N - 10
        let evicted = cache
            .manage_size(5, |hash| ordinal_of(hash).and_then(|n| n.checked_sub(10)))
            .await;

        assert_eq!(evicted, vec![key(10)]);
        for n in 12..=18 {
            assert!(cache.contains(&key(n)).await);
        }
    }

    #[tokio::test]
    async fn test_unregistered_hashes_are_unprotected() {
        let cache = BlobCache::default();
        fill(&cache, 0..11).await;

        // Only hash0 and hash3 are still registered, both next to current
        let evicted = cache
            .manage_size(1, |hash| match hash {
                "hash0" => Some(0),
                "hash3" => Some(3),
                _ => None,
            })
            .await;

        assert_eq!(evicted, vec![key(1)]);
        assert!(cache.contains(&key(0)).await);
    }

    #[tokio::test]
    async fn test_remove_hash() {
        let cache = BlobCache::default();
        fill(&cache, 0..3).await;
        cache
            .insert(CacheKey::new("hash1", "https://other/url"), vec![1], "image/png".into())
            .await;

        assert_eq!(cache.remove_hash("hash1").await, 2);
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_summaries_list_oldest_first() {
        let cache = BlobCache::default();
        cache.insert(key(2), b"second".to_vec(), "text/plain".to_string()).await;
        cache.insert(key(1), b"abc".to_vec(), "application/pdf".to_string()).await;

        let summaries = cache.summaries().await;
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].hash, "hash2");
        assert_eq!(summaries[0].size, 6);
        assert_eq!(summaries[1].mime, "application/pdf");
        assert_eq!(
            summaries[1].digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(summaries[0].cached_at <= summaries[1].cached_at);
    }

    #[tokio::test]
    async fn test_stats() {
        let cache = BlobCache::default();
        fill(&cache, 0..3).await;
        let stats = cache.stats().await;
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.capacity, 10);
        assert_eq!(stats.total_bytes, 12);
    }
}
