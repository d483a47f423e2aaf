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

//! Weighted random draws from a [WeightedPool].
//!
//! A single draw picks $u \sim U[0, 1)$ and binary-searches the pool's
//! normalized cumulative array for the first entry $c_i > u$, so entry $i$ is
//! returned with probability $c_i - c_{i-1} = \dfrac{w_i}{\sum_j w_j}$.

use std::fmt;
use std::hash::Hash;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32 as RNGType;

use crate::error::{PoolError, PoolResult};
use crate::pool::WeightedPool;
use crate::record::Record;
use crate::sum_tree::SumTree;

/// Draws records from a pool using an owned RNG.
///
/// # Examples
/// ```
/// use weightpool::{Sampler, WeightedPool};
///
/// let mut pool = WeightedPool::new();
/// pool.set("fx", 91.0, "win10").unwrap();
///
/// let mut sampler = Sampler::seeded(7);
/// assert_eq!(sampler.draw(&pool).unwrap().key, "fx");
/// ```
#[derive(Debug, Clone)]
pub struct Sampler<R = RNGType> {
    rng: R,
}

impl Sampler<RNGType> {
    /// A sampler seeded from OS entropy.
    pub fn new() -> Self {
        Sampler {
            rng: RNGType::from_os_rng(),
        }
    }

    /// A sampler with a fixed seed, for reproducible draws.
    pub fn seeded(seed: u64) -> Self {
        Sampler {
            rng: RNGType::seed_from_u64(seed),
        }
    }
}

impl Default for Sampler<RNGType> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> Sampler<R> {
    pub fn from_rng(rng: R) -> Self {
        Sampler { rng }
    }

    pub fn rng_mut(&mut self) -> &mut R {
        &mut self.rng
    }

    /// Draw one record proportionally to its weight (with replacement).
    ///
    /// Returns [PoolError::EmptyPool] if no record has a positive weight.
    pub fn draw<K, M>(&mut self, pool: &WeightedPool<K, M>) -> PoolResult<Record<K, M>>
    where
        K: Clone + Eq + Hash + Ord + fmt::Debug,
        M: Clone,
    {
        draw_with_rng(pool, &mut self.rng)
    }

    /// Draw up to `n` distinct records without replacement, see [draw_many_with_rng].
    pub fn draw_many<K, M>(
        &mut self,
        pool: &WeightedPool<K, M>,
        n: usize,
        top_k: Option<usize>,
    ) -> PoolResult<Vec<Record<K, M>>>
    where
        K: Clone + Eq + Hash + Ord + fmt::Debug,
        M: Clone,
    {
        draw_many_with_rng(pool, n, top_k, &mut self.rng)
    }

    /// Returns an iterator that lazily draws `n` records (with replacement).
    pub fn sample_iter<'a, K, M>(
        &'a mut self,
        pool: &'a WeightedPool<K, M>,
        n: usize,
    ) -> SamplingIter<'a, K, M, R>
    where
        K: Clone + Eq + Hash + Ord + fmt::Debug,
        M: Clone,
    {
        SamplingIter {
            pool,
            generator: &mut self.rng,
            remaining: n,
        }
    }
}

/// Draw one record using a **caller-supplied RNG**.
///
/// Returns [PoolError::EmptyPool] if no record has a positive weight.
pub fn draw_with_rng<K, M, R>(pool: &WeightedPool<K, M>, generator: &mut R) -> PoolResult<Record<K, M>>
where
    K: Clone + Eq + Hash + Ord + fmt::Debug,
    M: Clone,
    R: Rng + ?Sized,
{
    let index = pool.index();
    if index.is_empty() {
        return Err(PoolError::EmptyPool);
    }

    let u: f64 = generator.random_range(0.0..1.0);
    let pos = index.search(u).ok_or(PoolError::EmptyPool)?;
    let key = match index.entry(pos) {
        Some((key, _)) => key,
        None => panic!("rank index search returned out-of-range position {pos}"),
    };
    match pool.get(key) {
        Some(record) => Ok(record),
        None => panic!("rank index holds unknown key {key:?}"),
    }
}

/// Draw up to `n` distinct records without replacement.
///
/// The candidates are the `top_k` heaviest records (every weighted record when
/// `top_k` is `None`). Each pick is proportional to weight, renormalized over
/// the candidates not picked yet, so the first pick follows
/// $\dfrac{w_i}{\sum_{j \in \text{top-}k} w_j}$.
///
/// Returns $\min(n, |\text{candidates}|)$ records in pick order.
///
/// Returns [PoolError::EmptyPool] if no record has a positive weight.
pub fn draw_many_with_rng<K, M, R>(
    pool: &WeightedPool<K, M>,
    n: usize,
    top_k: Option<usize>,
    generator: &mut R,
) -> PoolResult<Vec<Record<K, M>>>
where
    K: Clone + Eq + Hash + Ord + fmt::Debug,
    M: Clone,
    R: Rng + ?Sized,
{
    let index = pool.index();
    if index.is_empty() {
        return Err(PoolError::EmptyPool);
    }

    let limit = top_k.map_or(index.len(), |k| k.min(index.len()));
    let candidates: Vec<(&K, f64)> = index.ranked().take(limit).collect();
    let weights: Vec<f64> = candidates.iter().map(|(_, w)| *w).collect();
    let mut tree = SumTree::with_leaves(&weights);

    let picks = n.min(tree.len());
    let mut out = Vec::with_capacity(picks);
    while out.len() < picks {
        let r: f64 = generator.random_range(0.0..1.0);
        let Some(leaf) = tree.find(r) else {
            break;
        };
        tree.set(leaf, 0.0);

        let key = candidates[leaf].0;
        match pool.get(key) {
            Some(record) => out.push(record),
            None => panic!("rank index holds unknown key {key:?}"),
        }
    }
    Ok(out)
}

/// A sampling iterator over a pool.
///
/// Yields a fixed number of independent draws, or stops early if the pool has
/// nothing to draw from.
pub struct SamplingIter<'a, K, M, R>
where
    K: Clone + Eq + Hash + Ord,
    R: Rng + ?Sized + 'a,
{
    pool: &'a WeightedPool<K, M>,
    generator: &'a mut R,
    remaining: usize,
}

impl<'a, K, M, R> Iterator for SamplingIter<'a, K, M, R>
where
    K: Clone + Eq + Hash + Ord + fmt::Debug,
    M: Clone,
    R: Rng + ?Sized + 'a,
{
    type Item = Record<K, M>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        match draw_with_rng(self.pool, self.generator) {
            Ok(record) => {
                self.remaining -= 1;
                Some(record)
            }
            Err(_) => {
                self.remaining = 0;
                None
            }
        }
    }
}
