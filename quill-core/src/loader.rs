//! Request-scoped batched entity loading
//!
//! A [`BatchLoader`] sits between code that resolves related entities one
//! parent at a time (a post's author, say) and a backend that can fetch many
//! entities in one round trip. It:
//!
//! - deduplicates the keys of each `load` call
//! - fetches only keys it has not resolved before, in a single batch
//! - memoizes found entities and confirmed absences for its whole lifetime
//! - returns values in the order and multiplicity they were requested
//!
//! The cache has no invalidation or expiry. Build one loader per request and
//! drop it with the request.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

/// An entity addressable by a key.
pub trait Keyed {
    type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    fn key(&self) -> Self::Key;
}

/// Key type of the values a fetcher returns.
pub type KeyOf<F> = <<F as BatchFetch>::Value as Keyed>::Key;

/// Backend capable of fetching many entities by key in one call.
///
/// Implementations return whatever subset of `keys` exists, in any order,
/// without placeholders for missing keys.
#[async_trait]
pub trait BatchFetch: Send + Sync {
    type Value: Keyed + Clone + Send + Sync + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    async fn fetch_many(&self, keys: &[KeyOf<Self>]) -> Result<Vec<Self::Value>, Self::Error>;
}

/// Batching, memoizing loader over a [`BatchFetch`] backend.
///
/// Cache entries hold `Some(value)` for found keys and `None` for keys the
/// backend confirmed absent. A key with no entry has not been looked up.
pub struct BatchLoader<F: BatchFetch> {
    fetcher: F,
    cache: Mutex<HashMap<KeyOf<F>, Option<F::Value>>>,
}

impl<F: BatchFetch> BatchLoader<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `keys`, returning one entry per key in input order.
    ///
    /// `None` marks a key the backend does not have. The cache lock is held
    /// for the whole call, so concurrent loads with overlapping keys never
    /// fetch the same key twice. If the fetch fails nothing is cached and
    /// the error is returned as-is.
    pub async fn load(&self, keys: &[KeyOf<F>]) -> Result<Vec<Option<F::Value>>, F::Error> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut cache = self.cache.lock().await;

        let uncached: Vec<KeyOf<F>> = {
            let mut seen = HashSet::with_capacity(keys.len());
            keys.iter()
                .filter(|key| !cache.contains_key(*key) && seen.insert(*key))
                .cloned()
                .collect()
        };

        if !uncached.is_empty() {
            debug!(
                requested = keys.len(),
                uncached = uncached.len(),
                "fetching batch"
            );

            let found = self.fetcher.fetch_many(&uncached).await?;
            let found_count = found.len();

            for value in found {
                cache.entry(value.key()).or_insert(Some(value));
            }
            for key in uncached {
                cache.entry(key).or_insert(None);
            }

            debug!(found = found_count, cached = cache.len(), "batch resolved");
        }

        Ok(keys
            .iter()
            .map(|key| cache.get(key).cloned().flatten())
            .collect())
    }

    /// Resolve a single key.
    pub async fn load_one(&self, key: KeyOf<F>) -> Result<Option<F::Value>, F::Error> {
        let mut values = self.load(std::slice::from_ref(&key)).await?;
        Ok(values.pop().flatten())
    }

    /// Record an entity obtained elsewhere as found.
    ///
    /// Returns `false` and leaves the cache alone if the key was already
    /// resolved, including as not-found.
    pub async fn prime(&self, value: F::Value) -> bool {
        let mut cache = self.cache.lock().await;
        match cache.entry(value.key()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Some(value));
                true
            }
        }
    }

    /// Number of keys resolved so far, found or not.
    pub async fn resolved_count(&self) -> usize {
        self.cache.lock().await.len()
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq)]
    struct Widget {
        id: u32,
        label: String,
    }

    impl Keyed for Widget {
        type Key = u32;

        fn key(&self) -> u32 {
            self.id
        }
    }

    fn widget(id: u32) -> Widget {
        Widget {
            id,
            label: format!("widget-{}", id),
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("backend unavailable")]
    struct Unavailable;

    /// In-memory backend that records every batch it is asked for
    #[derive(Default)]
    struct RecordingFetcher {
        rows: BTreeMap<u32, Widget>,
        calls: std::sync::Mutex<Vec<Vec<u32>>>,
        failing: AtomicBool,
        delay: Option<Duration>,
    }

    impl RecordingFetcher {
        fn with_ids(ids: impl IntoIterator<Item = u32>) -> Self {
            Self {
                rows: ids.into_iter().map(|id| (id, widget(id))).collect(),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<Vec<u32>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BatchFetch for RecordingFetcher {
        type Value = Widget;
        type Error = Unavailable;

        async fn fetch_many(&self, keys: &[u32]) -> Result<Vec<Widget>, Unavailable> {
            self.calls.lock().unwrap().push(keys.to_vec());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                return Err(Unavailable);
            }
            // Reverse order: callers must not rely on backend ordering
            Ok(keys
                .iter()
                .rev()
                .filter_map(|id| self.rows.get(id).cloned())
                .collect())
        }
    }

    #[tokio::test]
    async fn preserves_request_order_and_duplicates() {
        let loader = BatchLoader::new(RecordingFetcher::with_ids([1, 2]));

        let values = loader.load(&[1, 2, 1]).await.unwrap();

        assert_eq!(
            values,
            vec![Some(widget(1)), Some(widget(2)), Some(widget(1))]
        );
        assert_eq!(loader.fetcher().calls(), vec![vec![1, 2]]);
    }

    #[tokio::test]
    async fn missing_key_is_memoized_as_not_found() {
        let loader = BatchLoader::new(RecordingFetcher::with_ids([1]));

        assert_eq!(loader.load(&[5]).await.unwrap(), vec![None]);
        assert_eq!(loader.load(&[5]).await.unwrap(), vec![None]);

        assert_eq!(loader.fetcher().calls(), vec![vec![5]]);
        assert_eq!(loader.resolved_count().await, 1);
    }

    #[tokio::test]
    async fn empty_input_skips_backend() {
        let loader = BatchLoader::new(RecordingFetcher::with_ids([1]));

        assert!(loader.load(&[]).await.unwrap().is_empty());
        assert!(loader.fetcher().calls().is_empty());
    }

    #[tokio::test]
    async fn overlapping_loads_fetch_only_new_keys() {
        let loader = BatchLoader::new(RecordingFetcher::with_ids([1, 2, 3]));

        loader.load(&[1, 2]).await.unwrap();
        let values = loader.load(&[2, 3, 4, 3]).await.unwrap();

        assert_eq!(
            values,
            vec![Some(widget(2)), Some(widget(3)), None, Some(widget(3))]
        );
        assert_eq!(loader.fetcher().calls(), vec![vec![1, 2], vec![3, 4]]);
    }

    #[tokio::test]
    async fn fully_cached_load_makes_no_call() {
        let loader = BatchLoader::new(RecordingFetcher::with_ids([1, 2]));

        loader.load(&[1, 2, 9]).await.unwrap();
        loader.load(&[9, 2, 1, 1]).await.unwrap();

        assert_eq!(loader.fetcher().calls().len(), 1);
    }

    #[tokio::test]
    async fn failed_fetch_caches_nothing_and_can_retry() {
        let fetcher = RecordingFetcher::with_ids([1]);
        fetcher.failing.store(true, Ordering::SeqCst);
        let loader = BatchLoader::new(fetcher);

        assert!(loader.load(&[1, 2]).await.is_err());
        assert_eq!(loader.resolved_count().await, 0);

        loader.fetcher().failing.store(false, Ordering::SeqCst);
        let values = loader.load(&[1, 2]).await.unwrap();

        assert_eq!(values, vec![Some(widget(1)), None]);
        assert_eq!(loader.fetcher().calls(), vec![vec![1, 2], vec![1, 2]]);
    }

    #[tokio::test]
    async fn load_one_resolves_single_key() {
        let loader = BatchLoader::new(RecordingFetcher::with_ids([7]));

        assert_eq!(loader.load_one(7).await.unwrap(), Some(widget(7)));
        assert_eq!(loader.load_one(8).await.unwrap(), None);
        assert_eq!(loader.load_one(7).await.unwrap(), Some(widget(7)));
        assert_eq!(loader.fetcher().calls(), vec![vec![7], vec![8]]);
    }

    #[tokio::test]
    async fn primed_value_skips_backend() {
        let loader = BatchLoader::new(RecordingFetcher::with_ids([1]));

        assert!(loader.prime(widget(1)).await);
        assert_eq!(loader.load(&[1]).await.unwrap(), vec![Some(widget(1))]);
        assert!(loader.fetcher().calls().is_empty());
    }

    #[tokio::test]
    async fn prime_does_not_overwrite_resolved_key() {
        let loader = BatchLoader::new(RecordingFetcher::with_ids([]));

        assert_eq!(loader.load(&[3]).await.unwrap(), vec![None]);
        assert!(!loader.prime(widget(3)).await);
        assert_eq!(loader.load(&[3]).await.unwrap(), vec![None]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_loads_never_fetch_a_key_twice() {
        let fetcher = RecordingFetcher {
            delay: Some(Duration::from_millis(5)),
            ..RecordingFetcher::with_ids(0..20)
        };
        let loader = Arc::new(BatchLoader::new(fetcher));

        let handles: Vec<_> = (0..16u32)
            .map(|i| {
                let loader = Arc::clone(&loader);
                tokio::spawn(async move {
                    let keys: Vec<u32> = (i..i + 8).collect();
                    let values = loader.load(&keys).await.unwrap();
                    (keys, values)
                })
            })
            .collect();

        for handle in handles {
            let (keys, values) = handle.await.expect("task panicked");
            assert_eq!(keys.len(), values.len());
            for (key, value) in keys.iter().zip(values) {
                let expected = (*key < 20).then(|| widget(*key));
                assert_eq!(value, expected);
            }
        }

        let mut fetched: Vec<u32> = loader.fetcher().calls().into_iter().flatten().collect();
        let total = fetched.len();
        fetched.sort_unstable();
        fetched.dedup();
        assert_eq!(fetched.len(), total, "a key was fetched more than once");
        assert_eq!(fetched, (0..23).collect::<Vec<_>>());
    }
}
