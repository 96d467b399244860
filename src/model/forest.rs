//! Bagged ensembles of regression trees.
//!
//! One implementation covers both random forests (bootstrap resampling,
//! best split per feature) and extra trees (full sample, random threshold per
//! feature). Tree `i` is seeded with `seed + i`, so a fit is identical across
//! runs and thread counts.

use super::state::{Fitted, Unfitted};
use super::tree::{RegressionTree, SplitStrategy, TreeConfig};
use super::{check_training_data, InferenceModel, TrainableModel};
use crate::error::{EstimatorError, Result};
use ndarray::{Array2, ArrayView1};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use tracing::debug;

/// Hyperparameters of a tree ensemble.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub strategy: SplitStrategy,
    /// Resample the training rows with replacement for every tree.
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self::random_forest()
    }
}

impl ForestConfig {
    /// 100 bootstrapped trees, best splits, depth 20, seed 42.
    pub fn random_forest() -> Self {
        Self {
            n_trees: 100,
            max_depth: 20,
            min_samples_split: 10,
            min_samples_leaf: 5,
            strategy: SplitStrategy::Best,
            bootstrap: true,
            seed: 42,
        }
    }

    /// 80 trees on the full sample, random splits, depth 18, seed 43.
    pub fn extra_trees() -> Self {
        Self {
            n_trees: 80,
            max_depth: 18,
            min_samples_split: 12,
            min_samples_leaf: 1,
            strategy: SplitStrategy::Random,
            bootstrap: false,
            seed: 43,
        }
    }

    pub fn with_n_trees(mut self, n_trees: usize) -> Self {
        self.n_trees = n_trees;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_trees == 0 {
            return Err(EstimatorError::Config("n_trees must be positive".into()));
        }
        if self.max_depth == 0 {
            return Err(EstimatorError::Config("max_depth must be positive".into()));
        }
        if self.min_samples_leaf == 0 {
            return Err(EstimatorError::Config(
                "min_samples_leaf must be positive".into(),
            ));
        }
        Ok(())
    }

    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            strategy: self.strategy,
        }
    }
}

fn bootstrap_sample(n_samples: usize, rng: &mut StdRng) -> Vec<usize> {
    let dist = Uniform::from(0..n_samples);
    (0..n_samples).map(|_| dist.sample(rng)).collect()
}

/// Serializable parameters for a fitted forest.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForestParams {
    pub config: ForestConfig,
    pub n_features: usize,
    pub trees: Vec<RegressionTree>,
}

/// Tree ensemble predicting the mean of its trees.
#[derive(Clone, Debug)]
pub struct ForestRegressor<S> {
    config: ForestConfig,
    n_features: usize,
    trees: Vec<RegressionTree>,
    _state: PhantomData<S>,
}

impl ForestRegressor<Unfitted> {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            n_features: 0,
            trees: Vec::new(),
            _state: PhantomData,
        }
    }
}

impl<S> ForestRegressor<S> {
    pub fn config(&self) -> &ForestConfig {
        &self.config
    }
}

impl ForestRegressor<Fitted> {
    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }
}

impl TrainableModel for ForestRegressor<Unfitted> {
    type Output = ForestRegressor<Fitted>;

    fn fit(self, x: &Array2<f64>, y: &[f64]) -> Result<ForestRegressor<Fitted>> {
        self.config.validate()?;
        check_training_data(x, y)?;

        let n = x.nrows();
        let tree_config = self.config.tree_config();
        let trees: Vec<RegressionTree> = (0..self.config.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(i as u64));
                let indices = if self.config.bootstrap {
                    bootstrap_sample(n, &mut rng)
                } else {
                    (0..n).collect()
                };
                RegressionTree::fit(x, y, indices, &tree_config, &mut rng)
            })
            .collect();

        debug!(
            n_trees = trees.len(),
            strategy = ?self.config.strategy,
            samples = n,
            "forest fitted"
        );

        Ok(ForestRegressor {
            config: self.config,
            n_features: x.ncols(),
            trees,
            _state: PhantomData,
        })
    }
}

impl InferenceModel for ForestRegressor<Fitted> {
    type Params = ForestParams;

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, row: ArrayView1<'_, f64>) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        total / self.trees.len() as f64
    }

    fn extract_params(&self) -> ForestParams {
        ForestParams {
            config: self.config.clone(),
            n_features: self.n_features,
            trees: self.trees.clone(),
        }
    }

    fn from_params(params: ForestParams) -> Result<Self> {
        if params.trees.is_empty() {
            return Err(EstimatorError::Serialization("forest has no trees".into()));
        }
        if !params
            .trees
            .iter()
            .all(|t| t.is_well_formed(params.n_features))
        {
            return Err(EstimatorError::Serialization(
                "forest contains a malformed tree".into(),
            ));
        }
        Ok(Self {
            config: params.config,
            n_features: params.n_features,
            trees: params.trees,
            _state: PhantomData,
        })
    }
}
