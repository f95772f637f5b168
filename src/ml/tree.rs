//! CART regression trees and the two ensembles built from them.

use ndarray::{ArrayView1, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Minimum relative impurity decrease for a split to be worth making.
const MIN_RELATIVE_GAIN: f64 = 1e-12;

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    /// `None` grows until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    score: f64,
}

/// A binary regression tree minimising squared error.
#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Fit on the rows of `x` listed in `samples` (repeats allowed).
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        samples: &[usize],
        params: &TreeParams,
    ) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(x, y, samples.to_vec(), 0, params);
        tree
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }
        walk(&self.nodes, 0)
    }

    fn grow(
        &mut self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        samples: Vec<usize>,
        depth: usize,
        params: &TreeParams,
    ) -> usize {
        let node_id = self.nodes.len();
        let sum: f64 = samples.iter().map(|&i| y[i]).sum();
        let value = if samples.is_empty() {
            0.0
        } else {
            sum / samples.len() as f64
        };
        self.nodes.push(Node::Leaf { value });

        let depth_reached = params.max_depth.is_some_and(|max| depth >= max);
        if depth_reached || samples.len() < params.min_samples_split.max(2) {
            return node_id;
        }

        let Some(split) = best_split(x, y, &samples, params.min_samples_leaf.max(1)) else {
            return node_id;
        };

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .iter()
            .partition(|&&i| x[[i, split.feature]] <= split.threshold);

        let left = self.grow(x, y, left_samples, depth + 1, params);
        let right = self.grow(x, y, right_samples, depth + 1, params);
        self.nodes[node_id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_id
    }
}

/// Exhaustive search over features and midpoints between distinct values.
///
/// Maximising `sum_l²/n_l + sum_r²/n_r` is equivalent to minimising the
/// children's summed squared error. Ties keep the first candidate found.
fn best_split(
    x: ArrayView2<'_, f64>,
    y: ArrayView1<'_, f64>,
    samples: &[usize],
    min_leaf: usize,
) -> Option<SplitCandidate> {
    let n = samples.len();
    if n < 2 * min_leaf {
        return None;
    }

    let first = y[samples[0]];
    if samples.iter().all(|&i| y[i] == first) {
        return None;
    }

    let total: f64 = samples.iter().map(|&i| y[i]).sum();
    let parent_score = total * total / n as f64;
    let min_gain = MIN_RELATIVE_GAIN * parent_score.abs().max(1.0);
    let mut best: Option<SplitCandidate> = None;
    let mut order = samples.to_vec();

    for feature in 0..x.ncols() {
        order.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

        let mut left_sum = 0.0;
        for k in 1..n {
            left_sum += y[order[k - 1]];
            let lower = x[[order[k - 1], feature]];
            let upper = x[[order[k], feature]];
            if lower == upper || k < min_leaf || n - k < min_leaf {
                continue;
            }

            let right_sum = total - left_sum;
            let score = left_sum * left_sum / k as f64 + right_sum * right_sum / (n - k) as f64;
            if score - parent_score <= min_gain {
                continue;
            }
            if best.as_ref().is_none_or(|b| score > b.score) {
                let mut threshold = lower + (upper - lower) / 2.0;
                if threshold >= upper {
                    threshold = lower;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    score,
                });
            }
        }
    }

    best
}

/// Bagged ensemble of fully grown trees, each fit on a bootstrap sample.
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        n_trees: usize,
        seed: u64,
    ) -> Self {
        let n = x.nrows();
        let params = TreeParams::default();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let trees = (0..n_trees.max(1))
            .map(|_| {
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(x, y, &bootstrap, &params)
            })
            .collect();

        Self { trees }
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.predict_row(row)).sum();
        total / self.trees.len() as f64
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

/// Least-squares gradient boosting: a mean start plus shrunken residual trees.
#[derive(Debug, Clone)]
pub struct GradientBoosting {
    initial: f64,
    learning_rate: f64,
    stages: Vec<RegressionTree>,
}

impl GradientBoosting {
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        n_stages: usize,
        learning_rate: f64,
        max_depth: usize,
    ) -> Self {
        let n = x.nrows();
        let initial = if n == 0 { 0.0 } else { y.sum() / n as f64 };
        let params = TreeParams {
            max_depth: Some(max_depth),
            ..TreeParams::default()
        };
        let all: Vec<usize> = (0..n).collect();

        let mut current = vec![initial; n];
        let mut stages = Vec::with_capacity(n_stages);
        for _ in 0..n_stages {
            let residuals: ndarray::Array1<f64> = (0..n).map(|i| y[i] - current[i]).collect();
            let tree = RegressionTree::fit(x, residuals.view(), &all, &params);
            for (i, value) in current.iter_mut().enumerate() {
                *value += learning_rate * tree.predict_row(x.row(i));
            }
            stages.push(tree);
        }

        Self {
            initial,
            learning_rate,
            stages,
        }
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        self.initial
            + self.learning_rate * self.stages.iter().map(|t| t.predict_row(row)).sum::<f64>()
    }

    pub fn n_stages(&self) -> usize {
        self.stages.len()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array1, Array2, array};

    use super::*;

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((20, 2), |(i, j)| if j == 0 { i as f64 } else { 1.0 });
        let y = Array1::from_shape_fn(20, |i| if i < 10 { 5.0 } else { 15.0 });
        (x, y)
    }

    #[test]
    fn test_tree_learns_step_function() {
        let (x, y) = step_data();
        let all: Vec<usize> = (0..20).collect();
        let tree = RegressionTree::fit(x.view(), y.view(), &all, &TreeParams::default());

        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict_row(array![3.0, 1.0].view()), 5.0);
        assert_eq!(tree.predict_row(array![12.0, 1.0].view()), 15.0);
        assert_eq!(tree.predict_row(array![9.5, 1.0].view()), 5.0);
        assert_eq!(tree.predict_row(array![9.6, 1.0].view()), 15.0);
    }

    #[test]
    fn test_constant_target_is_single_leaf() {
        let x = Array2::from_shape_fn((8, 1), |(i, _)| i as f64);
        let y = Array1::from_elem(8, 7.0);
        let all: Vec<usize> = (0..8).collect();
        let tree = RegressionTree::fit(x.view(), y.view(), &all, &TreeParams::default());

        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict_row(array![100.0].view()), 7.0);
    }

    #[test]
    fn test_max_depth_is_respected() {
        let x = Array2::from_shape_fn((64, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(64, |i| (i * i) as f64);
        let all: Vec<usize> = (0..64).collect();
        let params = TreeParams {
            max_depth: Some(3),
            ..TreeParams::default()
        };
        let tree = RegressionTree::fit(x.view(), y.view(), &all, &params);

        assert!(tree.depth() <= 3);
    }

    #[test]
    fn test_min_samples_leaf_blocks_small_leaves() {
        let x = Array2::from_shape_fn((4, 1), |(i, _)| i as f64);
        let y = array![0.0, 0.0, 0.0, 10.0];
        let all: Vec<usize> = (0..4).collect();
        let params = TreeParams {
            min_samples_leaf: 2,
            ..TreeParams::default()
        };
        let tree = RegressionTree::fit(x.view(), y.view(), &all, &params);

        assert_eq!(tree.predict_row(array![3.0].view()), 5.0);
    }

    #[test]
    fn test_forest_is_deterministic_for_seed() {
        let (x, y) = step_data();
        let a = RandomForest::fit(x.view(), y.view(), 25, 42);
        let b = RandomForest::fit(x.view(), y.view(), 25, 42);

        assert_eq!(a.n_trees(), 25);
        for i in 0..20 {
            assert_eq!(a.predict_row(x.row(i)), b.predict_row(x.row(i)));
        }
    }

    #[test]
    fn test_forest_predictions_stay_within_target_range() {
        let (x, y) = step_data();
        let forest = RandomForest::fit(x.view(), y.view(), 30, 7);

        for i in 0..20 {
            let p = forest.predict_row(x.row(i));
            assert!((5.0..=15.0).contains(&p));
        }
    }

    #[test]
    fn test_boosting_reduces_training_error() {
        let x = Array2::from_shape_fn((30, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(30, |i| 2.0 * i as f64 + 3.0);

        let model = GradientBoosting::fit(x.view(), y.view(), 100, 0.1, 3);
        assert_eq!(model.n_stages(), 100);

        let mean = y.sum() / 30.0;
        let baseline: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
        let fitted: f64 = (0..30)
            .map(|i| (model.predict_row(x.row(i)) - y[i]).powi(2))
            .sum();
        assert!(fitted < baseline * 0.01);
    }
}
