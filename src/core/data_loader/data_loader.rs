use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, oneshot};
use tracing::debug;

use super::cache::{CacheFactory, CacheStorage, HashMapCache};
use super::loader::{LoadError, Loader};

/// Outcome of one key inside a batch: the value (or its absence), or the
/// error that applies to this key.
type KeyResult<K, L> =
    Result<Option<<L as Loader<K>>::Value>, LoadError<<L as Loader<K>>::Error>>;

type WaiterResult<K, L> =
    Result<HashMap<K, Option<<L as Loader<K>>::Value>>, LoadError<<L as Loader<K>>::Error>>;

/// A batch taken out of the pending queue: deduplicated keys in
/// first-occurrence order, plus every caller waiting on them.
type Batch<K, L> = (Vec<K>, Vec<(HashSet<K>, ResSender<K, L>)>);

struct ResSender<K, L>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    L: Loader<K>,
{
    use_cache_values: HashMap<K, Option<L::Value>>,
    tx: oneshot::Sender<WaiterResult<K, L>>,
}

struct Requests<K, L, C>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    L: Loader<K>,
    C: CacheFactory<K, Option<L::Value>>,
{
    key_set: HashSet<K>,
    keys: Vec<K>,
    pending: Vec<(HashSet<K>, ResSender<K, L>)>,
    /// Keys whose batch has been taken but whose fetch has not resolved yet.
    /// A load arriving for one of these subscribes to the running fetch
    /// instead of scheduling a second one.
    in_flight: HashMap<K, broadcast::Sender<KeyResult<K, L>>>,
    cache_storage: C::Storage,
}

impl<K, L, C> Requests<K, L, C>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    L: Loader<K>,
    C: CacheFactory<K, Option<L::Value>>,
{
    fn new(cache_factory: &C) -> Self {
        Self {
            key_set: HashSet::new(),
            keys: Vec::new(),
            pending: Vec::new(),
            in_flight: HashMap::new(),
            cache_storage: cache_factory.create(),
        }
    }

    fn take(&mut self) -> Batch<K, L> {
        self.key_set.clear();
        let keys = std::mem::take(&mut self.keys);
        for key in &keys {
            let (tx, _) = broadcast::channel(1);
            self.in_flight.insert(key.clone(), tx);
        }
        (keys, std::mem::take(&mut self.pending))
    }
}

struct Inner<K, L, C>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    L: Loader<K>,
    C: CacheFactory<K, Option<L::Value>>,
{
    requests: Mutex<Requests<K, L, C>>,
    loader: L,
}

impl<K, L, C> Inner<K, L, C>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    L: Loader<K>,
    C: CacheFactory<K, Option<L::Value>>,
{
    async fn flush(&self, batch: Batch<K, L>) {
        let (keys, pending) = batch;
        debug!(keys = keys.len(), waiters = pending.len(), "flushing batch");

        // One outcome per key. A top-level fetch failure or a wrong-length
        // result becomes the outcome of every key in the batch.
        let outcomes: Vec<KeyResult<K, L>> = match self.loader.load(&keys).await {
            Ok(slots) if slots.len() != keys.len() => {
                let err = LoadError::MismatchedBatchLength {
                    expected: keys.len(),
                    actual: slots.len(),
                };
                keys.iter().map(|_| Err(err.clone())).collect()
            }
            Ok(slots) => slots
                .into_iter()
                .map(|slot| slot.map_err(LoadError::Fetch))
                .collect(),
            Err(err) => keys
                .iter()
                .map(|_| Err(LoadError::Fetch(err.clone())))
                .collect(),
        };

        let fetched: HashMap<K, KeyResult<K, L>> = keys.into_iter().zip(outcomes).collect();

        // Publish under one lock: resolved values enter the cache and every
        // batch key leaves the in-flight set, so a concurrent load sees
        // either the running fetch or the cached result, never a gap.
        // Failed keys are not cached; the next load of one retries. Absent
        // keys are cached as `None`, so a key known to be missing is fetched
        // at most once per loader lifetime.
        let subscribed = {
            let mut requests = self.requests.lock().unwrap();
            let mut subscribed = Vec::new();
            for (key, outcome) in &fetched {
                if let Ok(value) = outcome {
                    requests.cache_storage.insert(key.clone(), value.clone());
                }
                if let Some(tx) = requests.in_flight.remove(key) {
                    subscribed.push((tx, outcome.clone()));
                }
            }
            subscribed
        };
        for (tx, outcome) in subscribed {
            // No receivers is the common case; send only fails then.
            let _ = tx.send(outcome);
        }

        for (keys_set, sender) in pending {
            let mut result = sender.use_cache_values;
            let mut failure = None;
            for key in keys_set {
                match fetched.get(&key) {
                    Some(Ok(value)) => {
                        result.insert(key, value.clone());
                    }
                    Some(Err(err)) => {
                        failure = Some(err.clone());
                        break;
                    }
                    None => {}
                }
            }
            let _ = sender.tx.send(match failure {
                Some(err) => Err(err),
                None => Ok(result),
            });
        }
    }
}

/// Request-scoped batching data loader.
///
/// Collapses the `load` calls issued while a response tree resolves into one
/// bulk [`Loader::load`] per batch window, memoizing results for the lifetime
/// of the instance. One instance must be created per inbound operation and
/// dropped with it; sharing an instance across operations would leak cached
/// values between viewers.
///
/// Reference: <https://github.com/facebook/dataloader>
pub struct DataLoader<K, L, C = HashMapCache>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    L: Loader<K>,
    C: CacheFactory<K, Option<L::Value>>,
{
    inner: Arc<Inner<K, L, C>>,
    delay: Duration,
    max_batch_size: usize,
}

impl<K, L> DataLoader<K, L, HashMapCache>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    L: Loader<K>,
{
    /// Create a [DataLoader] memoizing into a per-instance `HashMap`.
    pub fn new(loader: L) -> Self {
        Self::with_cache(loader, HashMapCache::default())
    }
}

impl<K, L, C> DataLoader<K, L, C>
where
    K: Send + Sync + Hash + Eq + Clone + 'static,
    L: Loader<K>,
    C: CacheFactory<K, Option<L::Value>>,
{
    /// Create a [DataLoader] with an explicit cache factory.
    pub fn with_cache(loader: L, cache_factory: C) -> Self {
        Self {
            inner: Arc::new(Inner {
                requests: Mutex::new(Requests::new(&cache_factory)),
                loader,
            }),
            delay: Duration::from_millis(1),
            max_batch_size: 1000,
        }
    }

    /// Specify the batching window, the default is `1ms`.
    #[must_use]
    pub fn delay(self, delay: Duration) -> Self {
        Self { delay, ..self }
    }

    /// Specify the max batch size, the default is `1000`.
    ///
    /// When the pending keys reach the threshold they are loaded immediately
    /// instead of waiting out the delay.
    #[must_use]
    pub fn max_batch_size(self, max_batch_size: usize) -> Self {
        Self { max_batch_size, ..self }
    }

    /// Get the loader.
    #[inline]
    pub fn loader(&self) -> &L {
        &self.inner.loader
    }

    /// Load one value. `Ok(None)` means the key has no record; `Err` means
    /// the fetch failed for this key, whether on its own slot or as a whole.
    pub async fn load_one(&self, key: K) -> Result<Option<L::Value>, LoadError<L::Error>> {
        let mut values = self.load_many(std::iter::once(key)).await?;
        Ok(values.pop().flatten())
    }

    /// Load a sequence of values, one per input key, preserving input order.
    /// Duplicate keys collapse to one fetch but each occurrence gets its
    /// slot; absent records come back as `None`. Fails if any requested
    /// key fails.
    pub async fn load_many<I>(
        &self,
        keys: I,
    ) -> Result<Vec<Option<L::Value>>, LoadError<L::Error>>
    where
        I: IntoIterator<Item = K>,
    {
        enum Action<K, L>
        where
            K: Send + Sync + Hash + Eq + Clone + 'static,
            L: Loader<K>,
        {
            ImmediateLoad(Batch<K, L>),
            StartFetch,
            Delay,
        }

        let input: Vec<K> = keys.into_iter().collect();

        let (action, rx, flights, mut use_cache_values) = {
            let mut requests = self.inner.requests.lock().unwrap();
            let prev_count = requests.keys.len();
            let mut keys_set = HashSet::new();
            let mut use_cache_values = HashMap::new();
            let mut flight_keys = HashSet::new();
            let mut flights = Vec::new();

            for key in &input {
                if use_cache_values.contains_key(key)
                    || keys_set.contains(key)
                    || flight_keys.contains(key)
                {
                    continue;
                }
                if let Some(value) = requests.cache_storage.get(key) {
                    // Already in cache
                    use_cache_values.insert(key.clone(), value.clone());
                } else if let Some(tx) = requests.in_flight.get(key) {
                    // Already being fetched; join that fetch.
                    flight_keys.insert(key.clone());
                    flights.push((key.clone(), tx.subscribe()));
                } else {
                    keys_set.insert(key.clone());
                }
            }

            let rx = if keys_set.is_empty() {
                None
            } else {
                for key in &keys_set {
                    if requests.key_set.insert(key.clone()) {
                        requests.keys.push(key.clone());
                    }
                }

                let (tx, rx) = oneshot::channel();
                requests.pending.push((
                    keys_set,
                    ResSender { use_cache_values: std::mem::take(&mut use_cache_values), tx },
                ));
                Some(rx)
            };

            let action = if rx.is_none() {
                // Nothing new to schedule; only cached and in-flight keys.
                Action::Delay
            } else if requests.keys.len() >= self.max_batch_size {
                Action::ImmediateLoad(requests.take())
            } else if prev_count == 0 {
                Action::StartFetch
            } else {
                Action::Delay
            };

            (action, rx, flights, use_cache_values)
        };

        match action {
            Action::ImmediateLoad(batch) => {
                let inner = self.inner.clone();
                tokio::spawn(async move { inner.flush(batch).await });
            }
            Action::StartFetch => {
                let inner = self.inner.clone();
                let delay = self.delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let batch = {
                        let mut requests = inner.requests.lock().unwrap();
                        requests.take()
                    };
                    if !batch.0.is_empty() {
                        inner.flush(batch).await;
                    }
                });
            }
            Action::Delay => {}
        }

        let mut values = match rx {
            // The sender is only dropped if the flush task is cancelled,
            // which cannot happen while the runtime is live.
            Some(rx) => rx.await.unwrap()?,
            None => std::mem::take(&mut use_cache_values),
        };

        for (key, mut rx) in flights {
            // Same lifetime argument as the oneshot above: flush publishes
            // every batch key before dropping the sender.
            let outcome = rx.recv().await.unwrap();
            values.insert(key, outcome?);
        }

        Ok(input
            .into_iter()
            .map(|key| values.get(&key).cloned().flatten())
            .collect())
    }

    /// Seed the cache with an already-known value, without a fetch.
    pub fn feed_one(&self, key: K, value: L::Value) {
        self.feed_many(std::iter::once((key, value)));
    }

    /// Seed the cache with already-known values, without a fetch.
    pub fn feed_many<I>(&self, values: I)
    where
        I: IntoIterator<Item = (K, L::Value)>,
    {
        let mut requests = self.inner.requests.lock().unwrap();
        for (key, value) in values {
            requests.cache_storage.insert(key, Some(value));
        }
    }

    /// Evict one key, forcing a re-fetch on the next load. Used when a write
    /// earlier in the same operation invalidates a cached value.
    pub fn clear(&self, key: &K) {
        let mut requests = self.inner.requests.lock().unwrap();
        requests.cache_storage.remove(key);
    }

    /// Evict everything cached by this instance.
    pub fn clear_all(&self) {
        let mut requests = self.inner.requests.lock().unwrap();
        requests.cache_storage.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use tokio::join;

    use super::super::loader::BatchResults;
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct TestUser {
        id: u64,
        name: String,
    }

    fn user(id: u64) -> TestUser {
        TestUser { id, name: format!("user{}", id) }
    }

    /// Records every batch it is asked for; id 404 has no record.
    struct UserFetcher {
        calls: Arc<Mutex<Vec<Vec<u64>>>>,
    }

    impl UserFetcher {
        fn new() -> Self {
            Self { calls: Arc::new(Mutex::new(Vec::new())) }
        }

        fn calls(&self) -> Vec<Vec<u64>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Loader<u64> for UserFetcher {
        type Value = TestUser;
        type Error = String;

        async fn load(&self, keys: &[u64]) -> Result<BatchResults<TestUser, String>, String> {
            self.calls.lock().unwrap().push(keys.to_vec());
            Ok(keys
                .iter()
                .map(|&id| Ok((id != 404).then(|| user(id))))
                .collect())
        }
    }

    /// Always fails the whole batch.
    struct BrokenFetcher;

    #[async_trait::async_trait]
    impl Loader<u64> for BrokenFetcher {
        type Value = TestUser;
        type Error = String;

        async fn load(&self, _keys: &[u64]) -> Result<BatchResults<TestUser, String>, String> {
            Err("connection refused".to_string())
        }
    }

    /// Key 2 fails on its own slot; every other key resolves.
    struct FlakyFetcher {
        calls: Arc<Mutex<Vec<Vec<u64>>>>,
    }

    impl FlakyFetcher {
        fn new() -> Self {
            Self { calls: Arc::new(Mutex::new(Vec::new())) }
        }

        fn calls(&self) -> Vec<Vec<u64>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Loader<u64> for FlakyFetcher {
        type Value = TestUser;
        type Error = String;

        async fn load(&self, keys: &[u64]) -> Result<BatchResults<TestUser, String>, String> {
            self.calls.lock().unwrap().push(keys.to_vec());
            Ok(keys
                .iter()
                .map(|&id| {
                    if id == 2 {
                        Err("missing".to_string())
                    } else {
                        Ok(Some(user(id)))
                    }
                })
                .collect())
        }
    }

    /// Violates the positional contract by dropping the last slot.
    struct TruncatingFetcher;

    #[async_trait::async_trait]
    impl Loader<u64> for TruncatingFetcher {
        type Value = u64;
        type Error = String;

        async fn load(&self, keys: &[u64]) -> Result<BatchResults<u64, String>, String> {
            let mut values: Vec<_> = keys.iter().map(|&k| Ok(Some(k))).collect();
            values.pop();
            Ok(values)
        }
    }

    /// Takes long enough that another load can arrive mid-fetch.
    struct SlowFetcher {
        calls: Arc<Mutex<Vec<Vec<u64>>>>,
    }

    impl SlowFetcher {
        fn new() -> Self {
            Self { calls: Arc::new(Mutex::new(Vec::new())) }
        }

        fn calls(&self) -> Vec<Vec<u64>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl Loader<u64> for SlowFetcher {
        type Value = TestUser;
        type Error = String;

        async fn load(&self, keys: &[u64]) -> Result<BatchResults<TestUser, String>, String> {
            self.calls.lock().unwrap().push(keys.to_vec());
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(keys.iter().map(|&id| Ok(Some(user(id)))).collect())
        }
    }

    #[tokio::test]
    async fn batches_and_dedupes_one_turn() {
        let loader = DataLoader::new(UserFetcher::new());

        let (a, b, c) = join!(loader.load_one(3), loader.load_one(1), loader.load_one(3));

        assert_eq!(loader.loader().calls(), vec![vec![3, 1]]);
        assert_eq!(a.unwrap(), Some(user(3)));
        assert_eq!(b.unwrap(), Some(user(1)));
        assert_eq!(c.unwrap(), Some(user(3)));
    }

    #[tokio::test]
    async fn cached_key_is_not_refetched() {
        let loader = DataLoader::new(UserFetcher::new());

        let first = loader.load_one(7).await.unwrap();
        let second = loader.load_one(7).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(loader.loader().calls().len(), 1);
    }

    #[tokio::test]
    async fn absent_key_resolves_to_none_and_is_cached() {
        let loader = DataLoader::new(UserFetcher::new());

        let (present, absent) = join!(loader.load_one(1), loader.load_one(404));
        assert_eq!(present.unwrap(), Some(user(1)));
        assert_eq!(absent.unwrap(), None);

        assert_eq!(loader.load_one(404).await.unwrap(), None);
        assert_eq!(loader.loader().calls().len(), 1);
    }

    #[tokio::test]
    async fn wrong_length_result_fails_every_waiter() {
        let loader = DataLoader::new(TruncatingFetcher);

        let (a, b) = join!(loader.load_one(1), loader.load_one(2));

        let expected = LoadError::MismatchedBatchLength { expected: 2, actual: 1 };
        assert_eq!(a.unwrap_err(), expected);
        assert_eq!(b.unwrap_err(), expected);
    }

    #[tokio::test]
    async fn fetch_failure_reaches_every_waiter_and_is_not_cached() {
        let loader = DataLoader::new(BrokenFetcher);

        let (a, b) = join!(loader.load_one(1), loader.load_one(2));
        assert_eq!(a.unwrap_err(), LoadError::Fetch("connection refused".to_string()));
        assert_eq!(b.unwrap_err(), LoadError::Fetch("connection refused".to_string()));

        // Nothing poisoned: the next load goes back to the loader.
        let again = loader.load_one(1).await;
        assert_eq!(again.unwrap_err(), LoadError::Fetch("connection refused".to_string()));
    }

    #[tokio::test]
    async fn one_failing_key_does_not_fail_its_batchmates() {
        let loader = DataLoader::new(FlakyFetcher::new());

        let (good, bad) = join!(loader.load_one(1), loader.load_one(2));

        assert_eq!(good.unwrap(), Some(user(1)));
        assert_eq!(bad.unwrap_err(), LoadError::Fetch("missing".to_string()));
        // Both keys went out in the same fetch.
        assert_eq!(loader.loader().calls(), vec![vec![1, 2]]);
    }

    #[tokio::test]
    async fn failed_key_is_retried_while_its_batchmate_stays_cached() {
        let loader = DataLoader::new(FlakyFetcher::new());

        let (_, _) = join!(loader.load_one(1), loader.load_one(2));
        let (good, bad) = join!(loader.load_one(1), loader.load_one(2));

        assert_eq!(good.unwrap(), Some(user(1)));
        assert_eq!(bad.unwrap_err(), LoadError::Fetch("missing".to_string()));
        // Key 1 came from the cache; only key 2 went out again.
        assert_eq!(loader.loader().calls(), vec![vec![1, 2], vec![2]]);
    }

    #[tokio::test]
    async fn in_flight_key_joins_the_existing_fetch() {
        let loader = Arc::new(DataLoader::new(SlowFetcher::new()));

        let first = {
            let loader = loader.clone();
            tokio::spawn(async move { loader.load_one(1).await })
        };
        // Arrive after the batch is taken but before its fetch resolves.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = loader.load_one(1).await.unwrap();
        let first = first.await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(loader.loader().calls(), vec![vec![1]]);
    }

    #[tokio::test]
    async fn instances_never_share_caches() {
        let first = DataLoader::new(UserFetcher::new());
        let second = DataLoader::new(UserFetcher::new());

        first.load_one(1).await.unwrap();
        second.load_one(1).await.unwrap();

        assert_eq!(first.loader().calls(), vec![vec![1]]);
        assert_eq!(second.loader().calls(), vec![vec![1]]);
    }

    #[tokio::test]
    async fn clear_forces_refetch() {
        let loader = DataLoader::new(UserFetcher::new());

        loader.load_one(5).await.unwrap();
        loader.clear(&5);
        loader.load_one(5).await.unwrap();

        assert_eq!(loader.loader().calls(), vec![vec![5], vec![5]]);
    }

    #[tokio::test]
    async fn clear_all_evicts_everything() {
        let loader = DataLoader::new(UserFetcher::new());

        let (_, _) = join!(loader.load_one(1), loader.load_one(2));
        loader.clear_all();
        let (_, _) = join!(loader.load_one(1), loader.load_one(2));

        assert_eq!(loader.loader().calls().len(), 2);
    }

    #[tokio::test]
    async fn feed_one_skips_the_fetch() {
        let loader = DataLoader::new(UserFetcher::new());
        loader.feed_one(9, TestUser { id: 9, name: "seeded".into() });

        let value = loader.load_one(9).await.unwrap();

        assert_eq!(value, Some(TestUser { id: 9, name: "seeded".into() }));
        assert_eq!(loader.loader().calls().len(), 0);
    }

    #[tokio::test]
    async fn load_many_collapses_duplicates_but_keeps_input_order() {
        let loader = DataLoader::new(UserFetcher::new());

        let values = loader.load_many(vec![2, 2, 4, 2]).await.unwrap();

        assert_eq!(loader.loader().calls(), vec![vec![2, 4]]);
        assert_eq!(
            values,
            vec![Some(user(2)), Some(user(2)), Some(user(4)), Some(user(2))]
        );
    }

    #[tokio::test]
    async fn full_batch_flushes_before_the_delay() {
        let loader = DataLoader::new(UserFetcher::new())
            .delay(Duration::from_secs(5))
            .max_batch_size(2);

        let joined = tokio::time::timeout(Duration::from_secs(1), async {
            join!(loader.load_one(1), loader.load_one(2))
        })
        .await
        .expect("batch should flush on size, not on delay");

        assert!(joined.0.unwrap().is_some());
        assert!(joined.1.unwrap().is_some());
        assert_eq!(loader.loader().calls(), vec![vec![1, 2]]);
    }

    #[tokio::test]
    async fn load_many_merges_cached_and_fresh_keys() {
        let loader = DataLoader::new(UserFetcher::new());

        loader.load_one(1).await.unwrap();
        let values = loader.load_many(vec![1, 2]).await.unwrap();

        // Only the uncached key reaches the fetcher.
        assert_eq!(loader.loader().calls(), vec![vec![1], vec![2]]);
        assert_eq!(values, vec![Some(user(1)), Some(user(2))]);
    }

    #[tokio::test]
    async fn no_cache_refetches_every_turn() {
        let loader = DataLoader::with_cache(UserFetcher::new(), crate::core::data_loader::NoCache);

        loader.load_one(1).await.unwrap();
        loader.load_one(1).await.unwrap();

        assert_eq!(loader.loader().calls(), vec![vec![1], vec![1]]);
    }

    #[tokio::test]
    async fn lru_cache_evicts_the_oldest_key() {
        let loader =
            DataLoader::with_cache(UserFetcher::new(), crate::core::data_loader::LruCache::new(1));

        loader.load_one(1).await.unwrap();
        loader.load_one(2).await.unwrap();
        loader.load_one(1).await.unwrap();

        assert_eq!(loader.loader().calls(), vec![vec![1], vec![2], vec![1]]);
    }

    #[tokio::test]
    async fn later_turns_start_new_batches() {
        let loader = DataLoader::new(UserFetcher::new());

        loader.load_one(1).await.unwrap();
        loader.load_one(2).await.unwrap();

        assert_eq!(loader.loader().calls(), vec![vec![1], vec![2]]);
    }
}
