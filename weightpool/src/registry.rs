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

//! Explicit registry of record sources folded into one pool.
//!
//! Sources are registered by name at startup. When several sources carry the
//! same key, the source with the higher priority wins; among equal priorities
//! the one registered later wins.

use std::fmt;
use std::hash::Hash;

use crate::error::{PoolError, PoolResult};
use crate::pool::WeightedPool;
use crate::record::Record;
use crate::source::Loader;

/// A named provider of raw records.
pub trait PoolSource<K, M> {
    fn name(&self) -> &str;

    /// Higher priority overwrites lower on key collision.
    fn priority(&self) -> i32 {
        0
    }

    fn raw_entries(&self) -> PoolResult<Vec<Record<K, M>>>;
}

pub struct SourceRegistry<K, M> {
    sources: Vec<Box<dyn PoolSource<K, M> + Send + Sync>>,
}

impl<K, M> Default for SourceRegistry<K, M> {
    fn default() -> Self {
        SourceRegistry {
            sources: Vec::new(),
        }
    }
}

impl<K, M> fmt::Debug for SourceRegistry<K, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl<K, M> SourceRegistry<K, M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns [PoolError::DuplicateSource] if the name is taken.
    pub fn register<S>(&mut self, source: S) -> PoolResult<()>
    where
        S: PoolSource<K, M> + Send + Sync + 'static,
    {
        if self.sources.iter().any(|s| s.name() == source.name()) {
            return Err(PoolError::DuplicateSource(source.name().to_string()));
        }
        tracing::debug!(name = source.name(), priority = source.priority(), "source registered");
        self.sources.push(Box::new(source));
        Ok(())
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Every source's records, lowest priority first, so that applying them
    /// in order lets higher priorities overwrite.
    ///
    /// Fails with the first source error; nothing is returned partially.
    pub fn merged_entries(&self) -> PoolResult<Vec<Record<K, M>>> {
        let mut order: Vec<&(dyn PoolSource<K, M> + Send + Sync)> =
            self.sources.iter().map(|s| s.as_ref()).collect();
        // stable: equal priorities keep registration order
        order.sort_by_key(|s| s.priority());

        let mut merged = Vec::new();
        for source in order {
            let batch = source.raw_entries()?;
            tracing::debug!(name = source.name(), records = batch.len(), "source read");
            merged.extend(batch);
        }
        Ok(merged)
    }
}

impl<K, M> SourceRegistry<K, M>
where
    K: Clone + Eq + Hash + Ord + fmt::Debug,
    M: Clone,
{
    /// Folds every source into `pool` with a single [WeightedPool::bulk_update].
    ///
    /// If any source fails or yields an invalid record, `pool` is unchanged.
    pub fn fold_into(&self, pool: &mut WeightedPool<K, M>) -> PoolResult<()> {
        pool.bulk_update(self.merged_entries()?)
    }
}

impl<K, M> Loader<K, M> for SourceRegistry<K, M> {
    fn load(&self) -> PoolResult<Vec<Record<K, M>>> {
        self.merged_entries()
    }

    fn origin(&self) -> String {
        format!("registry {:?}", self.names())
    }
}
