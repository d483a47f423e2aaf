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

//! Sorted-by-weight view of a pool together with its normalized cumulative
//! distribution.
//!
//! Entries are stored in **ascending** weight order (ties: descending key), so
//! that the running sum $c_i = \sum_{j \le i} w_j$ adds small weights first and
//! they are not swamped by a total dominated by large ones. The ranked,
//! externally visible order is the reverse of this layout.
//!
//! After every public operation:
//! - the key sequence holds exactly the keys with weight $> 0$,
//! - `cumulative` is non-decreasing and ends at exactly `1.0` (or is empty),
//! - `positions` maps each key to its slot in the ascending arrays.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;

use crate::record::rank_order;

type Position = usize;

#[derive(Debug, Clone)]
pub struct RankIndex<K>
where
    K: Clone + Eq + Hash + Ord,
{
    keys: Vec<K>,
    weights: Vec<f64>,
    cumulative: Vec<f64>,
    positions: HashMap<K, Position>,
    total: f64,
}

impl<K> Default for RankIndex<K>
where
    K: Clone + Eq + Hash + Ord,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> RankIndex<K>
where
    K: Clone + Eq + Hash + Ord,
{
    pub fn new() -> Self {
        RankIndex {
            keys: Vec::new(),
            weights: Vec::new(),
            cumulative: Vec::new(),
            positions: HashMap::new(),
            total: 0.0,
        }
    }

    /// Number of weighted entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True when there is nothing to sample from.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Sum of all indexed weights, before normalization.
    #[inline]
    pub fn total_weight(&self) -> f64 {
        self.total
    }

    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.positions.contains_key(key)
    }

    /// The normalized cumulative array, in ascending-weight order.
    pub fn cumulative(&self) -> &[f64] {
        &self.cumulative
    }

    /// Position of `key` in the ascending layout.
    pub fn position(&self, key: &K) -> Option<usize> {
        self.positions.get(key).copied()
    }

    /// Entry at `pos` in the ascending layout.
    pub fn entry(&self, pos: usize) -> Option<(&K, f64)> {
        Some((self.keys.get(pos)?, self.weights[pos]))
    }

    /// Entries by descending weight, ties by ascending key.
    pub fn ranked(&self) -> impl DoubleEndedIterator<Item = (&K, f64)> + ExactSizeIterator + '_ {
        self.keys
            .iter()
            .zip(self.weights.iter().copied())
            .rev()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.keys.clear();
        self.weights.clear();
        self.cumulative.clear();
        self.positions.clear();
        self.total = 0.0;
    }

    /// Rebuilds the whole index from `(key, weight)` pairs in $\mathcal{O}(n \log n)$.
    ///
    /// Pairs with a weight $\le 0$ are skipped. Keys are expected to be unique.
    pub fn rebuild<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, f64)>,
    {
        let mut pairs: Vec<(K, f64)> = entries.into_iter().filter(|(_, w)| *w > 0.0).collect();
        pairs.sort_by(|(ka, wa), (kb, wb)| ascending_order(*wa, ka, *wb, kb));

        self.clear();
        self.keys.reserve(pairs.len());
        self.weights.reserve(pairs.len());
        for (key, weight) in pairs {
            self.keys.push(key);
            self.weights.push(weight);
        }
        self.refresh_positions(0);
        self.recompute_cumulative();

        tracing::debug!(entries = self.len(), total = self.total, "rank index rebuilt");
    }

    /// Inserts `key` or moves it to the slot matching its new weight.
    ///
    /// A weight $\le 0$ removes the key from the index. Cost is $\mathcal{O}(n)$
    /// for the shift plus cumulative re-normalization.
    pub fn upsert(&mut self, key: &K, weight: f64) {
        if weight <= 0.0 {
            self.remove(key);
            return;
        }

        let mut lowest_touched = self.keys.len();
        if let Some(&p) = self.positions.get(key) {
            if self.weights[p] == weight {
                return;
            }
            self.take_at(p, key);
            lowest_touched = p;
        }

        let q = self.insertion_point(key, weight);
        self.keys.insert(q, key.clone());
        self.weights.insert(q, weight);

        self.refresh_positions(lowest_touched.min(q));
        self.recompute_cumulative();
    }

    /// Removes `key`, shifting later entries down by one slot.
    ///
    /// Returns the removed weight, or `None` when the key was not indexed.
    pub fn remove(&mut self, key: &K) -> Option<f64> {
        let p = *self.positions.get(key)?;
        let weight = self.take_at(p, key);

        if self.keys.is_empty() {
            self.clear();
        } else {
            self.refresh_positions(p);
            self.recompute_cumulative();
        }
        Some(weight)
    }

    /// Index of the first cumulative value strictly greater than `u`.
    ///
    /// `u` is expected in $[0, 1)$; the result is clamped to the last slot so
    /// rounding at the top boundary cannot run past the end.
    /// Returns `None` on an empty index.
    pub fn search(&self, u: f64) -> Option<usize> {
        if self.cumulative.is_empty() {
            return None;
        }
        let i = self.cumulative.partition_point(|&c| c <= u);
        Some(i.min(self.cumulative.len() - 1))
    }

    /// Panics if any structural invariant is broken.
    pub fn check_invariants(&self) {
        let n = self.keys.len();
        assert_eq!(self.weights.len(), n, "weights out of sync with keys");
        assert_eq!(self.cumulative.len(), n, "cumulative out of sync with keys");
        assert_eq!(self.positions.len(), n, "positions out of sync with keys");

        for (i, key) in self.keys.iter().enumerate() {
            assert!(self.weights[i] > 0.0, "non-positive weight indexed at {i}");
            assert_eq!(self.positions.get(key), Some(&i), "position map mismatch at {i}");
            if i > 0 {
                assert_eq!(
                    ascending_order(self.weights[i - 1], &self.keys[i - 1], self.weights[i], key),
                    Ordering::Less,
                    "ascending order broken at {i}"
                );
                assert!(
                    self.cumulative[i - 1] <= self.cumulative[i],
                    "cumulative decreases at {i}"
                );
            }
        }
        if let Some(&last) = self.cumulative.last() {
            assert_eq!(last, 1.0, "cumulative does not end at 1.0");
        } else {
            assert_eq!(self.total, 0.0, "empty index with non-zero total");
        }
    }

    /// Removes the entry at `p`, which must hold `key`.
    fn take_at(&mut self, p: Position, key: &K) -> f64 {
        if self.keys.get(p) != Some(key) {
            panic!("rank index corrupted: position map points {p} at the wrong key");
        }
        self.positions.remove(key);
        self.keys.remove(p);
        self.weights.remove(p)
    }

    /// First slot whose entry sorts after `(weight, key)` in the ascending layout.
    fn insertion_point(&self, key: &K, weight: f64) -> Position {
        let (mut lo, mut hi) = (0, self.keys.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if ascending_order(self.weights[mid], &self.keys[mid], weight, key) == Ordering::Less {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    fn refresh_positions(&mut self, from: Position) {
        for (i, key) in self.keys.iter().enumerate().skip(from) {
            match self.positions.get_mut(key) {
                Some(p) => *p = i,
                None => {
                    self.positions.insert(key.clone(), i);
                }
            }
        }
    }

    fn recompute_cumulative(&mut self) {
        self.total = self.accumulate(1.0);
        let mut running = self.total;
        if running.is_infinite() {
            // sum of finite weights overflowed: redo it relative to the largest
            let max = self.weights.last().copied().unwrap_or(1.0);
            running = self.accumulate(max);
        }

        if running > 0.0 {
            for c in &mut self.cumulative {
                *c /= running;
            }
            if let Some(last) = self.cumulative.last_mut() {
                *last = 1.0;
            }
        } else {
            self.clear();
        }
    }

    /// Fills `cumulative` with the running sum of `weights / scale` and
    /// returns the final sum.
    fn accumulate(&mut self, scale: f64) -> f64 {
        self.cumulative.clear();
        let mut running = 0.0;
        for &w in &self.weights {
            running += w / scale;
            self.cumulative.push(running);
        }
        running
    }
}

/// Internal layout order: ascending weight, ties by descending key.
/// This is exactly the reverse of [rank_order].
#[inline]
fn ascending_order<K: Ord>(w_a: f64, k_a: &K, w_b: f64, k_b: &K) -> Ordering {
    rank_order(w_b, k_b, w_a, k_a)
}
