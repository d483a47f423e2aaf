// MIT License
//
// Copyright (c) 2025 Jai Veilleux
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Lazily hydrated, lock-guarded pool backed by a [Loader] and a [Persister].
//!
//! Mutations (`set`, `remove`, `bulk_update`, `reset` and the load itself)
//! take the pool's write lock for the whole index update, so readers never
//! observe a half-rebuilt index. Reads and draws share the read lock.
//!
//! The loader runs whenever the pool is found empty, which makes a failed
//! load retryable. `flush` never loads.

use std::fmt;
use std::hash::Hash;
use std::time::Duration;

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::StoreConfig;
use crate::error::{PoolError, PoolResult};
use crate::pool::WeightedPool;
use crate::record::Record;
use crate::sampler::Sampler;
use crate::source::{Loader, Persister};

pub struct PoolStore<K, M, L, P>
where
    K: Clone + Eq + Hash + Ord,
{
    pool: RwLock<WeightedPool<K, M>>,
    sampler: Mutex<Sampler>,
    loader: L,
    persister: P,
    lock_timeout: Option<Duration>,
}

impl<K, M, L, P> fmt::Debug for PoolStore<K, M, L, P>
where
    K: Clone + Eq + Hash + Ord,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolStore")
            .field("lock_timeout", &self.lock_timeout)
            .finish_non_exhaustive()
    }
}

impl<K, M, L, P> PoolStore<K, M, L, P>
where
    K: Clone + Eq + Hash + Ord + fmt::Debug,
    M: Clone,
    L: Loader<K, M>,
    P: Persister<K, M>,
{
    /// Creates an empty store with blocking locks and an entropy-seeded sampler.
    pub fn new(loader: L, persister: P) -> Self {
        Self::with_config(loader, persister, &StoreConfig::default())
    }

    pub fn with_config(loader: L, persister: P, config: &StoreConfig) -> Self {
        let sampler = match config.seed {
            Some(seed) => Sampler::seeded(seed),
            None => Sampler::new(),
        };
        PoolStore {
            pool: RwLock::new(WeightedPool::new()),
            sampler: Mutex::new(sampler),
            loader,
            persister,
            lock_timeout: config.lock_timeout(),
        }
    }

    /// Hydrates the pool from the loader if it is empty.
    ///
    /// A failed load leaves the pool empty, so the next call tries again.
    ///
    /// Returns [PoolError::EmptyLoad] if the loader succeeds but yields no
    /// records, or whatever error the loader or [WeightedPool::bulk_update]
    /// reports.
    pub fn ensure_loaded(&self) -> PoolResult<()> {
        if !self.read()?.is_empty() {
            return Ok(());
        }

        let mut pool = self.write()?;
        if !pool.is_empty() {
            return Ok(());
        }

        let origin = self.loader.origin();
        let records = self.loader.load().inspect_err(|e| {
            tracing::warn!(origin = %origin, error = %e, "pool load failed");
        })?;
        if records.is_empty() {
            tracing::warn!(origin = %origin, "pool load yielded no records");
            return Err(PoolError::EmptyLoad { origin });
        }

        pool.bulk_update(records)?;
        tracing::info!(origin = %origin, records = pool.len(), "pool loaded");
        Ok(())
    }

    /// Hands the ranked snapshot to the persister.
    ///
    /// The in-memory pool is untouched whether or not persisting succeeds.
    pub fn flush(&self) -> PoolResult<()> {
        let snapshot = self.read()?.snapshot();
        self.persister.persist(&snapshot).inspect_err(|e| {
            tracing::warn!(error = %e, "pool flush failed");
        })?;
        tracing::info!(records = snapshot.len(), "pool flushed");
        Ok(())
    }

    pub fn get(&self, key: &K) -> PoolResult<Option<Record<K, M>>> {
        self.ensure_loaded()?;
        Ok(self.read()?.get(key))
    }

    pub fn contains(&self, key: &K) -> PoolResult<bool> {
        self.ensure_loaded()?;
        Ok(self.read()?.contains(key))
    }

    pub fn len(&self) -> PoolResult<usize> {
        self.ensure_loaded()?;
        Ok(self.read()?.len())
    }

    pub fn snapshot(&self) -> PoolResult<Vec<Record<K, M>>> {
        self.ensure_loaded()?;
        Ok(self.read()?.snapshot())
    }

    pub fn top_k(&self, k: usize) -> PoolResult<Vec<Record<K, M>>> {
        self.ensure_loaded()?;
        Ok(self.read()?.top_k(k))
    }

    /// See [WeightedPool::set]. Loads the pool first.
    pub fn set<W>(&self, key: K, weight: W, metadata: M) -> PoolResult<Option<Record<K, M>>>
    where
        W: Into<Option<f64>>,
    {
        self.ensure_loaded()?;
        self.write()?.set(key, weight, metadata)
    }

    /// See [WeightedPool::remove]. Loads the pool first.
    pub fn remove(&self, key: &K) -> PoolResult<Option<Record<K, M>>> {
        self.ensure_loaded()?;
        Ok(self.write()?.remove(key))
    }

    /// See [WeightedPool::bulk_update]. Does not load.
    pub fn bulk_update<I>(&self, records: I) -> PoolResult<()>
    where
        I: IntoIterator<Item = Record<K, M>>,
    {
        self.write()?.bulk_update(records)
    }

    /// Empties the pool; the next read reloads it.
    pub fn reset(&self) -> PoolResult<()> {
        self.write()?.clear();
        Ok(())
    }

    /// Draws one record proportionally to its weight.
    ///
    /// Returns [PoolError::EmptyPool] if nothing is weighted.
    pub fn draw(&self) -> PoolResult<Record<K, M>> {
        self.ensure_loaded()?;
        let pool = self.read()?;
        self.sampler.lock().draw(&*pool)
    }

    /// See [Sampler::draw_many].
    pub fn draw_many(&self, n: usize, top_k: Option<usize>) -> PoolResult<Vec<Record<K, M>>> {
        self.ensure_loaded()?;
        let pool = self.read()?;
        self.sampler.lock().draw_many(&*pool, n, top_k)
    }

    fn read(&self) -> PoolResult<RwLockReadGuard<'_, WeightedPool<K, M>>> {
        match self.lock_timeout {
            None => Ok(self.pool.read()),
            Some(timeout) => self.pool.try_read_for(timeout).ok_or_else(|| {
                tracing::warn!(?timeout, "timed out waiting for pool read lock");
                PoolError::LockTimeout(timeout)
            }),
        }
    }

    fn write(&self) -> PoolResult<RwLockWriteGuard<'_, WeightedPool<K, M>>> {
        match self.lock_timeout {
            None => Ok(self.pool.write()),
            Some(timeout) => self.pool.try_write_for(timeout).ok_or_else(|| {
                tracing::warn!(?timeout, "timed out waiting for pool write lock");
                PoolError::LockTimeout(timeout)
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    use super::*;

    type Rec = Record<String, String>;

    fn rec(key: &str, weight: f64) -> Rec {
        Record::new(key.to_string(), weight, "m".to_string())
    }

    fn seeded() -> StoreConfig {
        StoreConfig {
            seed: Some(7),
            ..StoreConfig::default()
        }
    }

    struct CountingLoader {
        calls: Arc<AtomicUsize>,
        records: Vec<Rec>,
    }

    impl CountingLoader {
        fn new(records: Vec<Rec>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let loader = CountingLoader {
                calls: Arc::clone(&calls),
                records,
            };
            (loader, calls)
        }
    }

    impl Loader<String, String> for CountingLoader {
        fn load(&self) -> PoolResult<Vec<Rec>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.records.clone())
        }

        fn origin(&self) -> String {
            "counting".into()
        }
    }

    fn discard(_: &[Rec]) -> PoolResult<()> {
        Ok(())
    }

    #[test]
    fn loads_lazily_and_once() {
        let (loader, calls) = CountingLoader::new(vec![rec("a", 1.0), rec("b", 2.0)]);
        let store = PoolStore::with_config(loader, discard, &seeded());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert_eq!(store.len().unwrap(), 2);
        assert!(store.contains(&"a".to_string()).unwrap());
        store.draw().unwrap();
        store.snapshot().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_load_is_an_error() {
        let (loader, _) = CountingLoader::new(Vec::new());
        let store = PoolStore::new(loader, discard);
        match store.ensure_loaded() {
            Err(PoolError::EmptyLoad { origin }) => assert_eq!(origin, "counting"),
            other => panic!("expected EmptyLoad, got {other:?}"),
        }
    }

    #[test]
    fn failed_load_is_retryable() {
        let attempts = AtomicUsize::new(0);
        let loader = || -> PoolResult<Vec<Rec>> {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(PoolError::MalformedRecord("entry 0: broken".into()))
            } else {
                Ok(vec![rec("a", 1.0)])
            }
        };
        let store = PoolStore::new(loader, discard);

        assert!(matches!(store.draw(), Err(PoolError::MalformedRecord(_))));
        assert_eq!(store.pool.read().len(), 0);
        assert_eq!(store.draw().unwrap().key, "a");
    }

    #[test]
    fn invalid_loaded_weight_leaves_pool_empty() {
        let loader = || -> PoolResult<Vec<Rec>> { Ok(vec![rec("a", 1.0), rec("b", -1.0)]) };
        let store = PoolStore::new(loader, discard);
        assert!(matches!(
            store.ensure_loaded(),
            Err(PoolError::InvalidWeight { .. })
        ));
        assert!(store.pool.read().is_empty());
    }

    #[test]
    fn flush_never_loads() {
        let (loader, calls) = CountingLoader::new(vec![rec("a", 1.0)]);
        let persisted = Mutex::new(None);
        let persister = |records: &[Rec]| -> PoolResult<()> {
            *persisted.lock() = Some(records.to_vec());
            Ok(())
        };
        let store = PoolStore::new(loader, persister);

        store.flush().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(persisted.lock().as_deref(), Some(&[][..]));
    }

    #[test]
    fn failed_flush_keeps_pool() {
        let (loader, _) = CountingLoader::new(vec![rec("a", 1.0), rec("b", 3.0)]);
        let persister = |_: &[Rec]| -> PoolResult<()> {
            Err(PoolError::Config("read-only".into()))
        };
        let store = PoolStore::new(loader, persister);
        store.ensure_loaded().unwrap();

        assert!(store.flush().is_err());
        assert_eq!(store.snapshot().unwrap(), vec![rec("b", 3.0), rec("a", 1.0)]);
    }

    #[test]
    fn writes_load_first_except_bulk_update() {
        let (loader, calls) = CountingLoader::new(vec![rec("a", 1.0)]);
        let store = PoolStore::new(loader, discard);
        store.set("b".into(), 2.0, "m".into()).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.len().unwrap(), 2);

        let (loader, calls) = CountingLoader::new(vec![rec("a", 1.0)]);
        let store = PoolStore::new(loader, discard);
        store.bulk_update(vec![rec("z", 1.0)]).unwrap();
        assert_eq!(store.snapshot().unwrap(), vec![rec("z", 1.0)]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn reset_triggers_reload() {
        let (loader, calls) = CountingLoader::new(vec![rec("a", 1.0)]);
        let store = PoolStore::new(loader, discard);
        store.remove(&"a".to_string()).unwrap();
        store.reset().unwrap();
        assert_eq!(store.top_k(5).unwrap(), vec![rec("a", 1.0)]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn bounded_lock_wait_times_out() {
        let (loader, _) = CountingLoader::new(vec![rec("a", 1.0)]);
        let config = StoreConfig {
            lock_timeout_ms: Some(10),
            ..StoreConfig::default()
        };
        let store = PoolStore::with_config(loader, discard, &config);

        let guard = store.pool.write();
        assert!(matches!(store.get(&"a".to_string()), Err(PoolError::LockTimeout(_))));
        assert!(matches!(store.reset(), Err(PoolError::LockTimeout(_))));
        drop(guard);

        assert_eq!(store.get(&"a".to_string()).unwrap(), Some(rec("a", 1.0)));
    }

    #[test]
    fn concurrent_first_reads_load_once() {
        let (loader, calls) = CountingLoader::new(vec![rec("a", 1.0), rec("b", 1.0)]);
        let store = Arc::new(PoolStore::new(loader, discard));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..100 {
                        store.draw().unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn readers_never_see_torn_index() {
        let loader = || -> PoolResult<Vec<Rec>> { Ok(vec![rec("base", 1.0)]) };
        let store = Arc::new(PoolStore::new(loader, discard));
        store.ensure_loaded().unwrap();

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..300 {
                    let key = format!("k{}", i % 17);
                    if i % 3 == 0 {
                        store.remove(&key).unwrap();
                    } else {
                        store.set(key, (i % 11) as f64, "m".into()).unwrap();
                    }
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..300 {
                        store.pool.read().check_invariants();
                        store.draw().unwrap();
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        store.pool.read().check_invariants();
    }
}
