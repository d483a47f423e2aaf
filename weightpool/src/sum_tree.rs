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

//! Cumulative binary tree over a fixed number of non-negative leaves.
//!
//! Internal nodes hold the sum of their children, so the root is the total
//! weight. Leaves live at `[cap, 2 * cap)` in a flat array, with `cap` the
//! leaf count rounded up to a power of two. Selecting a leaf proportionally to
//! its value walks from the root in $\mathcal{O}(\log n)$.

type LeafIdx = usize;

#[derive(Debug, Clone)]
pub(crate) struct SumTree {
    nodes: Vec<f64>,
    cap: usize,
    n_leaves: usize,
}

impl SumTree {
    /// Leaves whose sum overflows are stored relative to the largest one;
    /// only their ratios matter to [SumTree::find].
    pub(crate) fn with_leaves(values: &[f64]) -> Self {
        let cap = values.len().max(1).next_power_of_two();
        let mut tree = SumTree {
            nodes: vec![0.0; 2 * cap],
            cap,
            n_leaves: values.len(),
        };
        tree.fill(values, 1.0);
        if tree.total().is_infinite() {
            let max = values.iter().copied().fold(0.0, f64::max);
            tree.fill(values, max);
        }
        tree
    }

    fn fill(&mut self, values: &[f64], scale: f64) {
        let cap = self.cap;
        for (leaf, &v) in self.nodes[cap..cap + values.len()].iter_mut().zip(values) {
            *leaf = v / scale;
        }
        for i in (1..cap).rev() {
            self.nodes[i] = self.nodes[2 * i] + self.nodes[2 * i + 1];
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.n_leaves
    }

    /// Sum of every leaf.
    #[inline]
    pub(crate) fn total(&self) -> f64 {
        self.nodes[1]
    }

    /// Overwrites one leaf and re-sums its ancestors from their children, so
    /// repeated updates do not accumulate drift.
    pub(crate) fn set(&mut self, leaf: LeafIdx, value: f64) {
        assert!(leaf < self.n_leaves, "invalid leaf index {leaf}");
        let mut i = self.cap + leaf;
        self.nodes[i] = value;
        while i > 1 {
            i /= 2;
            self.nodes[i] = self.nodes[2 * i] + self.nodes[2 * i + 1];
        }
    }

    /// Leaf selected by `r` in $[0, 1)$, each leaf with probability
    /// $\dfrac{v_i}{\sum_j v_j}$. Never lands on a zero leaf.
    ///
    /// Returns `None` when the total is zero.
    pub(crate) fn find(&self, r: f64) -> Option<LeafIdx> {
        if self.total() <= 0.0 {
            return None;
        }
        let mut target = r * self.total();
        let mut i = 1;
        while i < self.cap {
            let left = self.nodes[2 * i];
            let right = self.nodes[2 * i + 1];
            if target < left || right <= 0.0 {
                i = 2 * i;
            } else {
                target -= left;
                i = 2 * i + 1;
            }
        }
        Some(i - self.cap)
    }
}
