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

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::error::{PoolError, PoolResult};
use crate::rank_index::RankIndex;
use crate::record::{canonical_weight, is_valid_weight, Record};

#[derive(Debug, Clone)]
struct Entry<M> {
    weight: Option<f64>,
    metadata: M,
}

impl<M> Entry<M> {
    #[inline]
    fn effective_weight(&self) -> f64 {
        self.weight.unwrap_or(0.0)
    }
}

/// Authoritative `key → (weight, metadata)` map with a [RankIndex] kept in
/// sync after every mutation.
///
/// # Model
/// Each key maps to at most one record. Records with a weight $w > 0$ are
/// indexed for sampling, so a key $k$ is drawn with probability
/// $\dfrac{w_k}{\sum_j w_j}$. Zero or absent weights are stored and
/// enumerated, but never drawn.
///
/// # Examples
/// ```
/// use weightpool::WeightedPool;
///
/// let mut pool = WeightedPool::new();
/// pool.set("fx", 91.0, "win10").unwrap();
/// pool.set("ch", 93.0, "win10").unwrap();
///
/// let keys: Vec<_> = pool.snapshot().into_iter().map(|r| r.key).collect();
/// assert_eq!(keys, vec!["ch", "fx"]);
///
/// assert!(pool.set("bad", -1.0, "win10").is_err());
/// assert!(pool.remove(&"missing").is_none());
/// ```
#[derive(Debug, Clone)]
pub struct WeightedPool<K, M>
where
    K: Clone + Eq + Hash + Ord,
{
    records: HashMap<K, Entry<M>>,
    index: RankIndex<K>,
}

impl<K, M> Default for WeightedPool<K, M>
where
    K: Clone + Eq + Hash + Ord,
{
    fn default() -> Self {
        WeightedPool {
            records: HashMap::new(),
            index: RankIndex::new(),
        }
    }
}

impl<K, M> WeightedPool<K, M>
where
    K: Clone + Eq + Hash + Ord + fmt::Debug,
    M: Clone,
{
    /// Creates a new, empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a pool from a batch of records.
    ///
    /// Returns [PoolError::InvalidWeight] if any record carries a negative or
    /// non-finite weight.
    pub fn from_records<I>(records: I) -> PoolResult<Self>
    where
        I: IntoIterator<Item = Record<K, M>>,
    {
        let mut pool = Self::new();
        pool.bulk_update(records)?;
        Ok(pool)
    }

    /// Number of records, weighted or not.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.records.contains_key(key)
    }

    pub fn get(&self, key: &K) -> Option<Record<K, M>> {
        self.records.get(key).map(|e| record_of(key, e))
    }

    /// Effective weight of `key` (absent weights read as `0.0`).
    pub fn weight(&self, key: &K) -> Option<f64> {
        self.records.get(key).map(Entry::effective_weight)
    }

    /// Sum of all positive weights.
    pub fn total_weight(&self) -> f64 {
        self.index.total_weight()
    }

    /// Read access to the sampling index.
    pub fn index(&self) -> &RankIndex<K> {
        &self.index
    }

    /// Inserts or overwrites the record for `key`.
    ///
    /// `weight` accepts a plain `f64` or an `Option<f64>`, where `None` is the
    /// explicit "unknown" state.
    ///
    /// Returns the previous record, if any.
    ///
    /// Returns [PoolError::InvalidWeight] if the weight is negative or not
    /// finite, and [PoolError::TotalWeightOverflow] if the pool's total weight
    /// would no longer be finite; the pool is left untouched either way.
    pub fn set<W>(&mut self, key: K, weight: W, metadata: M) -> PoolResult<Option<Record<K, M>>>
    where
        W: Into<Option<f64>>,
    {
        let weight = check_weight(&key, weight.into())?;

        let entry = Entry { weight, metadata };
        let new_weight = entry.effective_weight();
        let old_weight = self.weight(&key).unwrap_or(0.0);
        if !(self.total_weight() - old_weight + new_weight).is_finite() {
            return Err(PoolError::total_overflow(&key, new_weight));
        }
        self.index.upsert(&key, new_weight);
        tracing::trace!(key = ?key, weight = new_weight, "record set");

        let prev = self.records.insert(key.clone(), entry);
        Ok(prev.map(|e| record_of(&key, &e)))
    }

    /// Same as [WeightedPool::set], taking a whole record.
    pub fn insert(&mut self, record: Record<K, M>) -> PoolResult<Option<Record<K, M>>> {
        self.set(record.key, record.weight, record.metadata)
    }

    /// Removes `key`, returning its record.
    ///
    /// Removing an absent key is a no-op and returns `None`.
    pub fn remove(&mut self, key: &K) -> Option<Record<K, M>> {
        let (key, entry) = self.records.remove_entry(key)?;
        let indexed = self.index.remove(&key);
        if indexed.is_some() != (entry.effective_weight() > 0.0) {
            panic!("rank index out of sync with pool for key {key:?}");
        }
        tracing::trace!(key = ?key, "record removed");
        Some(Record {
            key,
            weight: entry.weight,
            metadata: entry.metadata,
        })
    }

    /// Applies a batch of upserts and rebuilds the index once.
    ///
    /// The batch is validated up front: if any record is invalid, nothing is
    /// applied. Later records win over earlier ones with the same key.
    ///
    /// Returns [PoolError::InvalidWeight] for the first invalid record, and
    /// [PoolError::TotalWeightOverflow] if the merged total weight would not
    /// be finite.
    pub fn bulk_update<I>(&mut self, records: I) -> PoolResult<()>
    where
        I: IntoIterator<Item = Record<K, M>>,
    {
        let mut batch: Vec<Record<K, M>> = records.into_iter().collect();
        for r in &mut batch {
            r.weight = check_weight(&r.key, r.weight)?;
        }
        if batch.is_empty() {
            return Ok(());
        }
        self.check_merged_total(&batch)?;

        let n = batch.len();
        for r in batch {
            self.records.insert(
                r.key,
                Entry {
                    weight: r.weight,
                    metadata: r.metadata,
                },
            );
        }
        self.reindex();
        tracing::debug!(batch = n, records = self.len(), "bulk update applied");
        Ok(())
    }

    /// Every record, by descending weight with ties broken by ascending key.
    ///
    /// Zero and absent weights come last, in ascending key order.
    pub fn snapshot(&self) -> Vec<Record<K, M>> {
        let mut out: Vec<Record<K, M>> = Vec::with_capacity(self.records.len());
        for (key, _) in self.index.ranked() {
            let entry = self
                .records
                .get(key)
                .unwrap_or_else(|| panic!("rank index holds unknown key {key:?}"));
            out.push(record_of(key, entry));
        }

        let mut unweighted: Vec<(&K, &Entry<M>)> = self
            .records
            .iter()
            .filter(|(_, e)| e.effective_weight() <= 0.0)
            .collect();
        unweighted.sort_by(|(a, _), (b, _)| a.cmp(b));
        out.extend(unweighted.into_iter().map(|(k, e)| record_of(k, e)));
        out
    }

    /// The first `k` records of [WeightedPool::snapshot].
    pub fn top_k(&self, k: usize) -> Vec<Record<K, M>> {
        let mut top = self.snapshot();
        top.truncate(k);
        top
    }

    /// Unordered iteration over `(key, weight, metadata)`.
    pub fn iter(&self) -> impl Iterator<Item = (&K, Option<f64>, &M)> + '_ {
        self.records.iter().map(|(k, e)| (k, e.weight, &e.metadata))
    }

    /// Removes every record.
    pub fn clear(&mut self) {
        self.records.clear();
        self.index.clear();
    }

    /// Panics unless the index holds exactly the positively weighted keys.
    pub fn check_invariants(&self) {
        self.index.check_invariants();
        let weighted = self
            .records
            .values()
            .filter(|e| e.effective_weight() > 0.0)
            .count();
        assert_eq!(self.index.len(), weighted, "index size differs from weighted records");
        for (key, w) in self.index.ranked() {
            let entry = self.records.get(key);
            assert_eq!(
                entry.map(Entry::effective_weight),
                Some(w),
                "index weight differs from pool for {key:?}"
            );
        }
    }

    fn check_merged_total(&self, batch: &[Record<K, M>]) -> PoolResult<()> {
        let mut merged: HashMap<&K, f64> = HashMap::with_capacity(batch.len());
        for r in batch {
            merged.insert(&r.key, r.effective_weight());
        }
        let kept: f64 = self
            .records
            .iter()
            .filter(|(k, _)| !merged.contains_key(k))
            .map(|(_, e)| e.effective_weight())
            .sum();
        let total = kept + merged.values().sum::<f64>();
        if total.is_finite() {
            return Ok(());
        }
        let heaviest = batch
            .iter()
            .max_by(|a, b| a.effective_weight().total_cmp(&b.effective_weight()));
        match heaviest {
            Some(r) => Err(PoolError::total_overflow(&r.key, r.effective_weight())),
            None => Ok(()),
        }
    }

    fn reindex(&mut self) {
        self.index.rebuild(
            self.records
                .iter()
                .map(|(k, e)| (k.clone(), e.effective_weight())),
        );
    }
}

/// Validates `weight` and folds `-0.0` into `0.0`.
fn check_weight<K: fmt::Debug>(key: &K, weight: Option<f64>) -> PoolResult<Option<f64>> {
    match weight {
        Some(w) if !is_valid_weight(w) => Err(PoolError::invalid_weight(key, w)),
        other => Ok(other.map(canonical_weight)),
    }
}

fn record_of<K: Clone, M: Clone>(key: &K, entry: &Entry<M>) -> Record<K, M> {
    Record {
        key: key.clone(),
        weight: entry.weight,
        metadata: entry.metadata.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(pool: &WeightedPool<&'static str, &'static str>) -> Vec<&'static str> {
        pool.snapshot().into_iter().map(|r| r.key).collect()
    }

    #[test]
    fn set_get_and_overwrite() {
        let mut pool = WeightedPool::new();
        assert_eq!(pool.set("fx", 91.0, "win10").unwrap(), None);
        assert!(pool.contains(&"fx"));
        assert_eq!(pool.get(&"fx"), Some(Record::new("fx", 91.0, "win10")));

        let prev = pool.set("fx", 50.0, "linux").unwrap();
        assert_eq!(prev, Some(Record::new("fx", 91.0, "win10")));
        assert_eq!(pool.weight(&"fx"), Some(50.0));
        assert_eq!(pool.len(), 1);
        pool.check_invariants();
    }

    #[test]
    fn invalid_weight_leaves_pool_untouched() {
        let mut pool = WeightedPool::new();
        pool.set("k", 1.0, "m").unwrap();

        for bad in [-1.0, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            match pool.set("k", bad, "other") {
                Err(PoolError::InvalidWeight { .. }) => {}
                other => panic!("expected InvalidWeight, got {other:?}"),
            }
        }
        assert_eq!(pool.get(&"k"), Some(Record::new("k", 1.0, "m")));
        pool.check_invariants();
    }

    #[test]
    fn overflowing_total_is_rejected() {
        let mut pool = WeightedPool::new();
        pool.set("a", 1e308, ()).unwrap();

        match pool.set("b", 1e308, ()) {
            Err(PoolError::TotalWeightOverflow { .. }) => {}
            other => panic!("expected TotalWeightOverflow, got {other:?}"),
        }
        assert!(!pool.contains(&"b"));
        assert_eq!(pool.total_weight(), 1e308);

        // replacing the heavy record frees its share of the total
        pool.set("a", 1.5e308, ()).unwrap();
        assert_eq!(pool.total_weight(), 1.5e308);

        let batch = vec![Record::new("c", 1.0, ()), Record::new("b", 1e308, ())];
        match pool.bulk_update(batch) {
            Err(PoolError::TotalWeightOverflow { key, .. }) => assert_eq!(key, "\"b\""),
            other => panic!("expected TotalWeightOverflow, got {other:?}"),
        }
        assert!(!pool.contains(&"c"));

        pool.bulk_update(vec![Record::new("a", 1e308, ()), Record::new("b", 1e308, ())])
            .unwrap_err();
        pool.bulk_update(vec![Record::new("a", 5e307, ()), Record::new("b", 1e308, ())])
            .unwrap();
        assert_eq!(pool.len(), 2);
        pool.check_invariants();
    }

    #[test]
    fn negative_zero_is_stored_as_zero() {
        let mut pool = WeightedPool::new();
        pool.set("b", -0.0, ()).unwrap();
        pool.bulk_update(vec![Record::new("c", -0.0, ())]).unwrap();
        pool.set("a", 0.0, ()).unwrap();
        pool.check_invariants();

        for key in ["a", "b", "c"] {
            let w = pool.get(&key).and_then(|r| r.weight).unwrap();
            assert_eq!(w.to_bits(), 0.0f64.to_bits(), "{key}");
        }

        let mut by_rank = pool.snapshot();
        by_rank.sort_by(Record::rank_cmp);
        assert_eq!(by_rank, pool.snapshot());
    }

    #[test]
    fn unweighted_records_are_stored_but_not_indexed() {
        let mut pool = WeightedPool::new();
        pool.set("a", None::<f64>, "x").unwrap();
        pool.set("b", 0.0, "y").unwrap();
        pool.set("c", 3.0, "z").unwrap();
        pool.check_invariants();

        assert_eq!(pool.len(), 3);
        assert_eq!(pool.index().len(), 1);
        assert_eq!(pool.total_weight(), 3.0);
        assert_eq!(keys(&pool), vec!["c", "a", "b"]);
        assert_eq!(pool.get(&"a").unwrap().weight, None);

        // weighted -> unweighted drops it from the index
        pool.set("c", None::<f64>, "z").unwrap();
        pool.check_invariants();
        assert!(pool.index().is_empty());
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut pool: WeightedPool<&str, &str> = WeightedPool::new();
        assert_eq!(pool.remove(&"missing"), None);
        pool.set("a", None::<f64>, "x").unwrap();
        assert_eq!(pool.remove(&"a"), Some(Record::unweighted("a", "x")));
        assert!(pool.is_empty());
        pool.check_invariants();
    }

    #[test]
    fn scenario_insert_remove_snapshot() {
        let mut pool = WeightedPool::new();
        pool.set("fx", 91.0, "win10").unwrap();
        pool.set("ch", 93.0, "win10").unwrap();
        assert_eq!(
            pool.snapshot(),
            vec![Record::new("ch", 93.0, "win10"), Record::new("fx", 91.0, "win10")]
        );

        pool.remove(&"ch");
        assert_eq!(pool.snapshot(), vec![Record::new("fx", 91.0, "win10")]);
        pool.check_invariants();
    }

    #[test]
    fn bulk_update_is_atomic() {
        let mut pool = WeightedPool::new();
        pool.set("keep", 1.0, "m").unwrap();

        let batch = vec![
            Record::new("a", 2.0, "m"),
            Record::new("bad", -3.0, "m"),
            Record::new("c", 4.0, "m"),
        ];
        assert!(matches!(
            pool.bulk_update(batch),
            Err(PoolError::InvalidWeight { .. })
        ));
        assert_eq!(keys(&pool), vec!["keep"]);
        pool.check_invariants();
    }

    #[test]
    fn bulk_update_later_duplicates_win() {
        let mut pool = WeightedPool::new();
        pool.bulk_update(vec![
            Record::new("a", 1.0, "first"),
            Record::new("b", 2.0, "m"),
            Record::new("a", 5.0, "second"),
        ])
        .unwrap();
        pool.check_invariants();
        assert_eq!(pool.get(&"a"), Some(Record::new("a", 5.0, "second")));
        assert_eq!(keys(&pool), vec!["a", "b"]);
    }

    #[test]
    fn bulk_update_twice_is_idempotent() {
        let batch = vec![
            Record::new("a", 1.0, "x"),
            Record::new("b", 1.0, "y"),
            Record::unweighted("c", "z"),
        ];
        let mut once = WeightedPool::new();
        once.bulk_update(batch.clone()).unwrap();
        let mut twice = WeightedPool::new();
        twice.bulk_update(batch.clone()).unwrap();
        twice.bulk_update(batch).unwrap();

        assert_eq!(once.snapshot(), twice.snapshot());
        assert_eq!(once.index().cumulative(), twice.index().cumulative());
    }

    #[test]
    fn top_k_truncates_snapshot() {
        let pool = WeightedPool::from_records(vec![
            Record::new("a", 1.0, ""),
            Record::new("b", 3.0, ""),
            Record::new("c", 2.0, ""),
        ])
        .unwrap();
        let top: Vec<_> = pool.top_k(2).into_iter().map(|r| r.key).collect();
        assert_eq!(top, vec!["b", "c"]);
        assert_eq!(pool.top_k(10).len(), 3);
    }

    #[test]
    fn clear_resets_everything() {
        let mut pool = WeightedPool::new();
        pool.set("a", 1.0, "x").unwrap();
        pool.clear();
        assert!(pool.is_empty());
        assert!(pool.index().is_empty());
        assert_eq!(pool.total_weight(), 0.0);
        pool.check_invariants();
    }
}
