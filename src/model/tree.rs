//! CART regression trees with a variance-reduction criterion.
//!
//! Nodes live in a flat arena; children are referenced by index. Two split
//! strategies are supported: the exhaustive best threshold per feature, and a
//! single uniformly drawn threshold per feature (extremely randomized trees).
//! In both cases the best candidate over all features wins.

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Gains at or below this are treated as no improvement.
const MIN_GAIN: f64 = 1e-12;

/// How candidate thresholds are chosen for each feature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitStrategy {
    /// Every midpoint between consecutive distinct values.
    Best,
    /// One threshold drawn uniformly between the feature's min and max.
    Random,
}

/// Growth limits of a single tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub strategy: SplitStrategy,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 20,
            min_samples_split: 2,
            min_samples_leaf: 1,
            strategy: SplitStrategy::Best,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// A fitted regression tree. Samples with `x[feature] <= threshold` go left.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct Candidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct Grower<'a> {
    x: &'a Array2<f64>,
    y: &'a [f64],
    config: &'a TreeConfig,
    rng: &'a mut StdRng,
    nodes: Vec<Node>,
}

fn mean_and_sse(y: &[f64], indices: &[usize]) -> (f64, f64) {
    let n = indices.len() as f64;
    let (sum, sum_sq) = indices
        .iter()
        .fold((0.0, 0.0), |(s, sq), &i| (s + y[i], sq + y[i] * y[i]));
    let mean = sum / n;
    (mean, (sum_sq - sum * sum / n).max(0.0))
}

fn sse(sum: f64, sum_sq: f64, n: f64) -> f64 {
    (sum_sq - sum * sum / n).max(0.0)
}

impl Grower<'_> {
    fn grow(&mut self, indices: &mut [usize], depth: usize) -> usize {
        let (mean, parent_sse) = mean_and_sse(self.y, indices);
        let n = indices.len();

        let splittable = n >= self.config.min_samples_split
            && n >= 2 * self.config.min_samples_leaf.max(1)
            && depth < self.config.max_depth
            && parent_sse / n as f64 > 1e-10;

        let candidate = if splittable {
            match self.config.strategy {
                SplitStrategy::Best => self.best_split(indices, parent_sse),
                SplitStrategy::Random => self.random_split(indices, parent_sse),
            }
        } else {
            None
        };

        let Some(Candidate {
            feature, threshold, ..
        }) = candidate
        else {
            self.nodes.push(Node::Leaf { value: mean });
            return self.nodes.len() - 1;
        };

        let pivot = partition(indices, |i| self.x[[i, feature]] <= threshold);
        let node_id = self.nodes.len();
        // reserved; children are pushed after it
        self.nodes.push(Node::Leaf { value: mean });

        let (left_idx, right_idx) = indices.split_at_mut(pivot);
        let left = self.grow(left_idx, depth + 1);
        let right = self.grow(right_idx, depth + 1);
        self.nodes[node_id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        node_id
    }

    fn best_split(&self, indices: &[usize], parent_sse: f64) -> Option<Candidate> {
        let min_leaf = self.config.min_samples_leaf.max(1);
        let n = indices.len();
        let total_sum: f64 = indices.iter().map(|&i| self.y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| self.y[i] * self.y[i]).sum();
        let mut best: Option<Candidate> = None;
        let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n);

        for feature in 0..self.x.ncols() {
            pairs.clear();
            pairs.extend(indices.iter().map(|&i| (self.x[[i, feature]], self.y[i])));
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for k in 1..n {
                let (v_prev, y_prev) = pairs[k - 1];
                left_sum += y_prev;
                left_sq += y_prev * y_prev;
                if k < min_leaf || n - k < min_leaf || pairs[k].0 <= v_prev {
                    continue;
                }
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let gain = parent_sse
                    - sse(left_sum, left_sq, k as f64)
                    - sse(right_sum, right_sq, (n - k) as f64);
                if gain > MIN_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(Candidate {
                        feature,
                        threshold: v_prev + (pairs[k].0 - v_prev) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }

    fn random_split(&mut self, indices: &[usize], parent_sse: f64) -> Option<Candidate> {
        let min_leaf = self.config.min_samples_leaf.max(1);
        let mut best: Option<Candidate> = None;

        for feature in 0..self.x.ncols() {
            let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                let v = self.x[[i, feature]];
                (lo.min(v), hi.max(v))
            });
            if hi <= lo {
                continue;
            }
            let threshold = self.rng.gen_range(lo..hi);

            let (mut ls, mut lsq, mut ln) = (0.0, 0.0, 0usize);
            let (mut rs, mut rsq, mut rn) = (0.0, 0.0, 0usize);
            for &i in indices {
                let y = self.y[i];
                if self.x[[i, feature]] <= threshold {
                    ls += y;
                    lsq += y * y;
                    ln += 1;
                } else {
                    rs += y;
                    rsq += y * y;
                    rn += 1;
                }
            }
            if ln < min_leaf || rn < min_leaf {
                continue;
            }
            let gain = parent_sse - sse(ls, lsq, ln as f64) - sse(rs, rsq, rn as f64);
            if gain > MIN_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(Candidate {
                    feature,
                    threshold,
                    gain,
                });
            }
        }
        best
    }
}

/// Reorder `indices` so that elements satisfying `pred` come first; returns their count.
fn partition(indices: &mut [usize], pred: impl Fn(usize) -> bool) -> usize {
    let mut pivot = 0;
    for k in 0..indices.len() {
        if pred(indices[k]) {
            indices.swap(pivot, k);
            pivot += 1;
        }
    }
    pivot
}

impl RegressionTree {
    /// Grow a tree on the rows of `x` listed in `indices` (repeats allowed).
    ///
    /// `rng` is only consumed by [`SplitStrategy::Random`].
    pub fn fit(
        x: &Array2<f64>,
        y: &[f64],
        mut indices: Vec<usize>,
        config: &TreeConfig,
        rng: &mut StdRng,
    ) -> Self {
        if indices.is_empty() {
            return Self {
                nodes: vec![Node::Leaf { value: 0.0 }],
            };
        }
        let mut grower = Grower {
            x,
            y,
            config,
            rng,
            nodes: Vec::new(),
        };
        grower.grow(&mut indices, 0);
        Self {
            nodes: grower.nodes,
        }
    }

    pub fn predict(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Length of the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    /// Structural check for trees restored from bytes.
    pub fn is_well_formed(&self, n_features: usize) -> bool {
        !self.nodes.is_empty()
            && self.nodes.iter().enumerate().all(|(id, node)| match node {
                Node::Leaf { value } => value.is_finite(),
                Node::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    *feature < n_features
                        && *left > id
                        && *right > id
                        && *left < self.nodes.len()
                        && *right < self.nodes.len()
                }
            })
    }
}
