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

//! Weighted key pool: labeled records with a non-negative weight, enumerated
//! by descending weight and drawn with probability proportional to weight.
//!
//! A [WeightedPool] owns the `key → (weight, metadata)` map and keeps a
//! [RankIndex] in sync after every mutation. The index stores the weighted
//! keys in ascending weight order together with a normalized cumulative array
//! $c_i = \dfrac{\sum_{j \le i} w_j}{\sum_j w_j}$, so that a [Sampler] draws a
//! record by binary search on $u \sim U[0, 1)$.
//!
//! [PoolStore] wraps a pool behind a read/write lock, hydrates it lazily from
//! a [Loader] and writes it back through a [Persister]. [JsonFile] is the
//! stock collaborator for both, and [SourceRegistry] folds several named
//! sources into one pool.
//!
//! ```
//! use weightpool::{Sampler, WeightedPool};
//!
//! let mut pool = WeightedPool::new();
//! pool.set("Mozilla/5.0 (Windows NT 10.0) Firefox/94.0", 4.8, "Firefox Win10").unwrap();
//! pool.set("Mozilla/5.0 (Windows NT 10.0) Chrome/96.0", 38.0, "Chrome Win10").unwrap();
//!
//! let top = pool.top_k(1);
//! assert_eq!(top[0].metadata, "Chrome Win10");
//!
//! let mut sampler = Sampler::seeded(42);
//! let drawn = sampler.draw(&pool).unwrap();
//! assert!(pool.contains(&drawn.key));
//! ```

pub mod config;
pub mod error;
pub mod pool;
pub mod rank_index;
pub mod record;
pub mod registry;
pub mod sampler;
pub mod source;
pub mod store;
mod sum_tree;

pub use config::StoreConfig;
pub use error::{PoolError, PoolResult};
pub use pool::WeightedPool;
pub use rank_index::RankIndex;
pub use record::Record;
pub use registry::{PoolSource, SourceRegistry};
pub use sampler::{draw_many_with_rng, draw_with_rng, Sampler, SamplingIter};
pub use source::{JsonFile, Loader, Persister};
pub use store::PoolStore;
