//! Gradient-boosted regression trees for squared-error loss
//!
//! Second-order boosting in the XGBoost formulation: each tree is grown
//! greedily on gradient and hessian sums, leaf weights are
//! `-G / (H + lambda)` shrunk by the learning rate, and a split is kept only
//! if its gain exceeds `gamma` and both children carry at least
//! `min_child_weight` hessian.

use crate::error::{ForecastError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Booster hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    /// Share of rows sampled for each tree
    pub subsample: f64,
    /// Share of features sampled for each tree
    pub colsample_bytree: f64,
    /// Minimum gain required to split
    pub gamma: f64,
    /// Minimum hessian sum per child
    pub min_child_weight: f64,
    /// L2 penalty on leaf weights
    pub reg_lambda: f64,
    pub seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            subsample: 1.0,
            colsample_bytree: 1.0,
            gamma: 0.0,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        weight: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single regression tree stored as a flat node arena; node 0 is the root
#[derive(Debug, Clone, PartialEq)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Leaf { weight } => return *weight,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] < *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Number of leaves
    pub fn leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], i: usize) -> usize {
            match &nodes[i] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    grad: &'a [f64],
    hess: &'a [f64],
    params: &'a BoostingParams,
    nodes: Vec<Node>,
    in_left: Vec<bool>,
}

struct BestSplit {
    gain: f64,
    feature: usize,
    threshold: f64,
}

impl<'a> TreeBuilder<'a> {
    fn leaf_weight(&self, g: f64, h: f64) -> f64 {
        -g / (h + self.params.reg_lambda) * self.params.learning_rate
    }

    fn score(&self, g: f64, h: f64) -> f64 {
        g * g / (h + self.params.reg_lambda)
    }

    /// `sorted[k]` holds this node's rows ordered by feature `features[k]`
    fn build(&mut self, sorted: Vec<Vec<usize>>, features: &[usize], depth: usize) -> usize {
        let rows = &sorted[0];
        let g: f64 = rows.iter().map(|&r| self.grad[r]).sum();
        let h: f64 = rows.iter().map(|&r| self.hess[r]).sum();
        let index = self.nodes.len();
        self.nodes.push(Node::Leaf {
            weight: self.leaf_weight(g, h),
        });

        if depth >= self.params.max_depth || rows.len() < 2 {
            return index;
        }
        let Some(best) = self.best_split(&sorted, features, g, h) else {
            return index;
        };

        for &r in &sorted[0] {
            self.in_left[r] = self.x[r][best.feature] < best.threshold;
        }
        let (left, right): (Vec<Vec<usize>>, Vec<Vec<usize>>) = sorted
            .iter()
            .map(|list| list.iter().partition(|&&r| self.in_left[r]))
            .unzip();

        let left = self.build(left, features, depth + 1);
        let right = self.build(right, features, depth + 1);
        self.nodes[index] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        index
    }

    fn best_split(&self, sorted: &[Vec<usize>], features: &[usize], g: f64, h: f64) -> Option<BestSplit> {
        let parent = self.score(g, h);
        let mut best: Option<BestSplit> = None;
        for (list, &feature) in sorted.iter().zip(features) {
            let (mut gl, mut hl) = (0.0, 0.0);
            for pair in list.windows(2) {
                let (r, next) = (pair[0], pair[1]);
                gl += self.grad[r];
                hl += self.hess[r];
                let (v, v_next) = (self.x[r][feature], self.x[next][feature]);
                if v == v_next {
                    continue;
                }
                let hr = h - hl;
                if hl < self.params.min_child_weight || hr < self.params.min_child_weight {
                    continue;
                }
                let gain = 0.5 * (self.score(gl, hl) + self.score(g - gl, hr) - parent)
                    - self.params.gamma;
                if gain > 0.0 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(BestSplit {
                        gain,
                        feature,
                        threshold: 0.5 * (v + v_next),
                    });
                }
            }
        }
        best
    }
}

/// Additive ensemble of regression trees
#[derive(Debug, Clone, PartialEq)]
pub struct GradientBoostedTrees {
    params: BoostingParams,
    base_score: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoostedTrees {
    /// Fit on row-major features `x` and targets `y`
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &BoostingParams) -> Result<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(ForecastError::ValidationError(format!(
                "Feature rows ({}) and targets ({}) must be equal and non-empty",
                x.len(),
                y.len()
            )));
        }
        let width = x[0].len();
        if width == 0 || x.iter().any(|r| r.len() != width) {
            return Err(ForecastError::ValidationError(
                "Feature rows must share a non-zero width".to_string(),
            ));
        }
        if !(params.subsample > 0.0 && params.subsample <= 1.0)
            || !(params.colsample_bytree > 0.0 && params.colsample_bytree <= 1.0)
        {
            return Err(ForecastError::InvalidParameter(
                "subsample and colsample_bytree must lie in (0, 1]".to_string(),
            ));
        }

        let n = y.len();
        let base_score = y.iter().sum::<f64>() / n as f64;
        let mut predictions = vec![base_score; n];
        let hess = vec![1.0; n];

        // Global per-feature orderings, filtered per tree.
        let order: Vec<Vec<usize>> = (0..width)
            .map(|f| {
                let mut idx: Vec<usize> = (0..n).collect();
                idx.sort_by(|&a, &b| x[a][f].total_cmp(&x[b][f]));
                idx
            })
            .collect();

        let mut rng = StdRng::seed_from_u64(params.seed);
        let n_features = ((width as f64 * params.colsample_bytree).round() as usize).clamp(1, width);
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            let grad: Vec<f64> = predictions.iter().zip(y).map(|(p, t)| p - t).collect();

            let mut features: Vec<usize> = (0..width).collect();
            if n_features < width {
                features.shuffle(&mut rng);
                features.truncate(n_features);
                features.sort_unstable();
            }
            let sampled: Vec<bool> = if params.subsample < 1.0 {
                (0..n).map(|_| rng.gen::<f64>() < params.subsample).collect()
            } else {
                vec![true; n]
            };
            let sorted: Vec<Vec<usize>> = features
                .iter()
                .map(|&f| order[f].iter().copied().filter(|&r| sampled[r]).collect())
                .collect();
            if sorted[0].is_empty() {
                continue;
            }

            let mut builder = TreeBuilder {
                x,
                grad: &grad,
                hess: &hess,
                params,
                nodes: Vec::new(),
                in_left: vec![false; n],
            };
            builder.build(sorted, &features, 0);
            let tree = RegressionTree {
                nodes: builder.nodes,
            };

            for (p, row) in predictions.iter_mut().zip(x) {
                *p += tree.predict_row(row);
            }
            trees.push(tree);
        }

        Ok(Self {
            params: *params,
            base_score,
            trees,
        })
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
    }

    pub fn predict(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter().map(|r| self.predict_row(r)).collect()
    }

    pub fn params(&self) -> &BoostingParams {
        &self.params
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }
}
