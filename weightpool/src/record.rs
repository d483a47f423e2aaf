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

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// One entry of a [WeightedPool](crate::WeightedPool): a key, its relative
/// weight and an opaque metadata payload.
///
/// A weight of `None` is the explicit "unknown" state. Like a weight of `0.0`
/// it contributes no probability mass, but the record is still stored and
/// enumerated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<K, M> {
    pub key: K,
    #[serde(default)]
    pub weight: Option<f64>,
    pub metadata: M,
}

impl<K, M> Record<K, M> {
    pub fn new(key: K, weight: f64, metadata: M) -> Self {
        Record {
            key,
            weight: Some(weight),
            metadata,
        }
    }

    /// A record whose weight is not known.
    pub fn unweighted(key: K, metadata: M) -> Self {
        Record {
            key,
            weight: None,
            metadata,
        }
    }

    /// The weight used for sampling: absent weights count as `0.0`.
    #[inline]
    pub fn effective_weight(&self) -> f64 {
        self.weight.unwrap_or(0.0)
    }

    /// Whether this record takes part in the sampling distribution.
    #[inline]
    pub fn is_weighted(&self) -> bool {
        self.effective_weight() > 0.0
    }
}

impl<K: Ord, M> Record<K, M> {
    /// Enumeration order: descending weight, then ascending key.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        rank_order(self.effective_weight(), &self.key, other.effective_weight(), &other.key)
    }
}

/// Orders `(weight, key)` pairs by descending weight, ties broken by
/// ascending key. Weights are never NaN, so `total_cmp` agrees with `<` once
/// `-0.0` is folded into `0.0`.
#[inline]
pub(crate) fn rank_order<K: Ord>(w_a: f64, k_a: &K, w_b: f64, k_b: &K) -> Ordering {
    canonical_weight(w_b)
        .total_cmp(&canonical_weight(w_a))
        .then_with(|| k_a.cmp(k_b))
}

/// Maps `-0.0` to `0.0`; every other weight is returned as is.
#[inline]
pub(crate) fn canonical_weight(weight: f64) -> f64 {
    if weight == 0.0 {
        0.0
    } else {
        weight
    }
}

/// Weights must be finite and non-negative.
#[inline]
pub(crate) fn is_valid_weight(weight: f64) -> bool {
    weight.is_finite() && weight >= 0.0
}
