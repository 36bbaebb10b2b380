//! Neighbour preloading
//!
//! After each successful foreground load the preloader warms the cache
//! around the current item:
//!
//! - immediate neighbours (±1) are fetched in parallel, fire-and-forget;
//! - further neighbours (±2 .. ±radius) go to a sequential background
//!   queue served by a single worker, one fetch in flight at a time, with a
//!   pause after every item so background traffic never crowds out the
//!   foreground load.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::time::Duration;

use crate::registry::AttachmentRecord;

use super::{AttachmentLoader, CacheKey, FetchPriority};

/// Preloader configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PreloadConfig {
    /// Pause after a successful background fetch
    pub success_delay_ms: u64,
    /// Pause after a failed or skipped background item
    pub failure_delay_ms: u64,
    /// Farthest neighbour distance that gets queued
    pub radius: usize,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            success_delay_ms: 200,
            failure_delay_ms: 100,
            radius: 3,
        }
    }
}

/// What a preload cycle set in motion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreloadPlan {
    /// Keys evicted by the size check that opened the cycle
    pub evicted: Vec<CacheKey>,
    /// Ordinals fetched in parallel
    pub parallel: Vec<usize>,
    /// Ordinals handed to the background queue, in queue order
    pub queued: Vec<usize>,
}

/// Neighbour preloader
#[derive(Clone)]
pub struct Preloader {
    inner: Arc<PreloaderInner>,
}

struct PreloaderInner {
    loader: AttachmentLoader,
    config: PreloadConfig,
    queue: Mutex<VecDeque<AttachmentRecord>>,
    wake: Notify,
    worker_started: AtomicBool,
}

impl Preloader {
    pub fn new(loader: AttachmentLoader, config: PreloadConfig) -> Self {
        Self {
            inner: Arc::new(PreloaderInner {
                loader,
                config,
                queue: Mutex::new(VecDeque::new()),
                wake: Notify::new(),
                worker_started: AtomicBool::new(false),
            }),
        }
    }

    /// Start a preload cycle around `current`
    ///
    /// Enforces the cache size first, then fans out the ±1 fetches and
    /// replaces the background queue with the farther neighbours.
    pub async fn start_preloading(&self, current: usize, records: &[AttachmentRecord]) -> PreloadPlan {
        let ordinals: HashMap<&str, usize> = records
            .iter()
            .map(|record| (record.content_hash.as_str(), record.ordinal))
            .collect();
        let evicted = self
            .inner
            .loader
            .cache()
            .manage_size(current, |hash| ordinals.get(hash).copied())
            .await;

        let parallel: Vec<usize> = neighbours(current, 1, records.len());
        let queued: Vec<usize> = (2..=self.inner.config.radius)
            .flat_map(|distance| neighbours(current, distance, records.len()))
            .collect();

        let immediate: Vec<AttachmentRecord> = parallel.iter().map(|&i| records[i].clone()).collect();
        if !immediate.is_empty() {
            let loader = self.inner.loader.clone();
            tokio::spawn(async move {
                let loads = immediate.iter().map(|record| loader.load(record, FetchPriority::Normal));
                for (record, result) in immediate.iter().zip(join_all(loads).await) {
                    if let Err(e) = result {
                        tracing::debug!(hash = %record.content_hash, error = %e, "Neighbour preload failed");
                    }
                }
            });
        }

        {
            let mut queue = self.inner.queue.lock();
            queue.clear();
            queue.extend(queued.iter().map(|&i| records[i].clone()));
        }
        self.ensure_worker();
        self.inner.wake.notify_one();

        tracing::debug!(current, ?parallel, ?queued, "Preload cycle started");

        PreloadPlan {
            evicted,
            parallel,
            queued,
        }
    }

    /// Ordinals still waiting in the background queue
    pub fn pending(&self) -> Vec<usize> {
        self.inner.queue.lock().iter().map(|record| record.ordinal).collect()
    }

    /// Drop everything still waiting in the background queue
    pub fn clear_pending(&self) {
        self.inner.queue.lock().clear();
    }

    fn ensure_worker(&self) {
        if self
            .inner
            .worker_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { inner.run_queue().await });
        }
    }
}

impl PreloaderInner {
    async fn run_queue(&self) {
        let success_delay = Duration::from_millis(self.config.success_delay_ms);
        let failure_delay = Duration::from_millis(self.config.failure_delay_ms);

        loop {
            let next = self.queue.lock().pop_front();
            let Some(record) = next else {
                self.wake.notified().await;
                continue;
            };

            let pause = if self.loader.is_cached(&record).await {
                failure_delay
            } else {
                match self.loader.load(&record, FetchPriority::Low).await {
                    Ok(_) => success_delay,
                    Err(e) => {
                        tracing::debug!(hash = %record.content_hash, error = %e, "Background preload failed");
                        failure_delay
                    }
                }
            };

            tokio::time::sleep(pause).await;
        }
    }
}

/// In-range ordinals at `distance` from `current`, lower side first
fn neighbours(current: usize, distance: usize, len: usize) -> Vec<usize> {
    let mut out = Vec::with_capacity(2);
    if let Some(before) = current.checked_sub(distance) {
        if before < len {
            out.push(before);
        }
    }
    if current + distance < len {
        out.push(current + distance);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::super::testing::FakeFetcher;
    use super::super::{BlobCache, CacheConfig};
    use super::*;

    fn records(n: usize) -> Vec<AttachmentRecord> {
        (0..n)
            .map(|i| AttachmentRecord {
                content_hash: format!("h{}", i),
                source_url: format!("https://host/att?th=h{}&disp=thd", i),
                full_url: format!("https://host/att?th=h{}&disp=inline", i),
                display_name: format!("file{}.png", i),
                ordinal: i,
            })
            .collect()
    }

    fn setup(records: &[AttachmentRecord], cache: BlobCache) -> (Arc<FakeFetcher>, Preloader) {
        let fetcher = Arc::new(FakeFetcher::default());
        for record in records {
            fetcher.serve(&record.full_url, record.content_hash.as_bytes(), Some("image/png"));
        }
        let loader = AttachmentLoader::new(cache, fetcher.clone());
        (fetcher, Preloader::new(loader, PreloadConfig::default()))
    }

    fn ordinals_with(fetcher: &FakeFetcher, priority: FetchPriority) -> Vec<usize> {
        fetcher
            .calls()
            .iter()
            .filter(|(_, p)| *p == priority)
            .map(|(url, _)| {
                let hash = url.split("th=h").nth(1).unwrap();
                hash.split('&').next().unwrap().parse().unwrap()
            })
            .collect()
    }

    #[test]
    fn test_neighbours() {
        assert_eq!(neighbours(3, 1, 5), vec![2, 4]);
        assert_eq!(neighbours(3, 2, 5), vec![1]);
        assert_eq!(neighbours(0, 1, 5), vec![1]);
        assert_eq!(neighbours(0, 1, 1), Vec::<usize>::new());
    }

    #[tokio::test(start_paused = true)]
    async fn test_five_items_viewing_third() {
        let recs = records(5);
        let (fetcher, preloader) = setup(&recs, BlobCache::default());

        let plan = preloader.start_preloading(3, &recs).await;

        assert_eq!(plan.parallel, vec![2, 4]);
        assert_eq!(plan.queued, vec![1, 0]);

        tokio::time::sleep(Duration::from_millis(1)).await;
        let mut immediate = ordinals_with(&fetcher, FetchPriority::Normal);
        immediate.sort();
        assert_eq!(immediate, vec![2, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_queue_is_sequential_with_delays() {
        let recs = records(9);
        let (fetcher, preloader) = setup(&recs, BlobCache::default());

        let plan = preloader.start_preloading(4, &recs).await;
        assert_eq!(plan.queued, vec![2, 6, 1, 7]);

        // First queued item goes out right away, the next only after 200ms
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(ordinals_with(&fetcher, FetchPriority::Low), vec![2]);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(ordinals_with(&fetcher, FetchPriority::Low), vec![2]);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(ordinals_with(&fetcher, FetchPriority::Low), vec![2, 6]);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(ordinals_with(&fetcher, FetchPriority::Low), vec![2, 6, 1, 7]);
        assert!(preloader.pending().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_failures_are_swallowed() {
        let recs = records(9);
        let (fetcher, preloader) = setup(&recs, BlobCache::default());
        fetcher.fail(&recs[2].full_url, super::super::FetchError::Network("reset".into()));

        preloader.start_preloading(4, &recs).await;

        // Failure pause is 100ms, so item 6 follows quickly
        tokio::time::sleep(Duration::from_millis(110)).await;
        assert_eq!(ordinals_with(&fetcher, FetchPriority::Low), vec![2, 6]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_cycle_replaces_queue() {
        let recs = records(12);
        let (fetcher, preloader) = setup(&recs, BlobCache::default());

        preloader.start_preloading(3, &recs).await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        preloader.start_preloading(8, &recs).await;

        tokio::time::sleep(Duration::from_millis(2000)).await;
        let low = ordinals_with(&fetcher, FetchPriority::Low);
        // Item 1 went out before the queue was replaced; the rest come from the new cycle
        assert_eq!(low, vec![1, 6, 10, 5, 11]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_enforces_cache_size() {
        let recs = records(15);
        let cache = BlobCache::new(CacheConfig {
            max_entries: 10,
            protect_radius: 3,
        });
        for record in &recs[..11] {
            cache
                .insert(AttachmentLoader::cache_key(record), vec![0], "image/png".into())
                .await;
        }
        let (_fetcher, preloader) = setup(&recs, cache.clone());

        let plan = preloader.start_preloading(5, &recs).await;

        assert_eq!(plan.evicted, vec![AttachmentLoader::cache_key(&recs[0])]);
    }
}
