//! Weighted blend of a random forest, an extra-trees forest and a ridge model.

use super::forest::{ForestConfig, ForestParams, ForestRegressor};
use super::linear::{RidgeConfig, RidgeParams, RidgeRegression};
use super::state::{Fitted, Unfitted};
use super::{check_training_data, InferenceModel, TrainableModel};
use crate::error::{EstimatorError, Result};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Blend weight of each learner. Normalized by their sum at prediction time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendWeights {
    pub random_forest: f64,
    pub extra_trees: f64,
    pub ridge: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            random_forest: 0.55,
            extra_trees: 0.30,
            ridge: 0.15,
        }
    }
}

impl BlendWeights {
    pub fn validate(&self) -> Result<()> {
        let all = [self.random_forest, self.extra_trees, self.ridge];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) || all.iter().sum::<f64>() <= 0.0 {
            return Err(EstimatorError::Config(format!(
                "blend weights must be non-negative with a positive sum, got {all:?}"
            )));
        }
        Ok(())
    }

    /// Weights scaled to sum to one.
    pub fn normalized(&self) -> [f64; 3] {
        let sum = self.random_forest + self.extra_trees + self.ridge;
        [
            self.random_forest / sum,
            self.extra_trees / sum,
            self.ridge / sum,
        ]
    }
}

/// Hyperparameters of the three learners and their blend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    pub random_forest: ForestConfig,
    pub extra_trees: ForestConfig,
    pub ridge: RidgeConfig,
    pub weights: BlendWeights,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            random_forest: ForestConfig::random_forest(),
            extra_trees: ForestConfig::extra_trees(),
            ridge: RidgeConfig::default(),
            weights: BlendWeights::default(),
        }
    }
}

impl EnsembleConfig {
    pub fn with_random_forest(mut self, config: ForestConfig) -> Self {
        self.random_forest = config;
        self
    }

    pub fn with_extra_trees(mut self, config: ForestConfig) -> Self {
        self.extra_trees = config;
        self
    }

    pub fn with_ridge(mut self, config: RidgeConfig) -> Self {
        self.ridge = config;
        self
    }

    pub fn with_weights(mut self, weights: BlendWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.random_forest.validate()?;
        self.extra_trees.validate()?;
        self.weights.validate()
    }
}

/// Serializable parameters for a fitted ensemble.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnsembleParams {
    pub random_forest: ForestParams,
    pub extra_trees: ForestParams,
    pub ridge: RidgeParams,
    pub weights: BlendWeights,
}

/// Three-learner ensemble. Trains the learners concurrently.
#[derive(Clone, Debug)]
pub struct EnsembleRegressor<S> {
    random_forest: ForestRegressor<S>,
    extra_trees: ForestRegressor<S>,
    ridge: RidgeRegression<S>,
    weights: BlendWeights,
}

impl EnsembleRegressor<Unfitted> {
    pub fn new(config: EnsembleConfig) -> Self {
        Self {
            random_forest: ForestRegressor::new(config.random_forest),
            extra_trees: ForestRegressor::new(config.extra_trees),
            ridge: RidgeRegression::new(config.ridge),
            weights: config.weights,
        }
    }
}

impl EnsembleRegressor<Fitted> {
    pub fn weights(&self) -> &BlendWeights {
        &self.weights
    }

    /// Individual predictions: random forest, extra trees, ridge.
    pub fn member_predictions(&self, row: ArrayView1<'_, f64>) -> [f64; 3] {
        [
            self.random_forest.predict(row),
            self.extra_trees.predict(row),
            self.ridge.predict(row),
        ]
    }
}

impl TrainableModel for EnsembleRegressor<Unfitted> {
    type Output = EnsembleRegressor<Fitted>;

    fn fit(self, x: &Array2<f64>, y: &[f64]) -> Result<EnsembleRegressor<Fitted>> {
        self.weights.validate()?;
        check_training_data(x, y)?;
        info!(samples = x.nrows(), features = x.ncols(), "training ensemble");

        let Self {
            random_forest,
            extra_trees,
            ridge,
            weights,
        } = self;
        let (rf, (et, lin)) = rayon::join(
            || random_forest.fit(x, y),
            || rayon::join(|| extra_trees.fit(x, y), || ridge.fit(x, y)),
        );

        Ok(EnsembleRegressor {
            random_forest: rf?,
            extra_trees: et?,
            ridge: lin?,
            weights,
        })
    }
}

impl InferenceModel for EnsembleRegressor<Fitted> {
    type Params = EnsembleParams;

    fn n_features(&self) -> usize {
        self.ridge.n_features()
    }

    fn predict(&self, row: ArrayView1<'_, f64>) -> f64 {
        let [w_rf, w_et, w_ridge] = self.weights.normalized();
        let [rf, et, ridge] = self.member_predictions(row);
        w_rf * rf + w_et * et + w_ridge * ridge
    }

    fn extract_params(&self) -> EnsembleParams {
        EnsembleParams {
            random_forest: self.random_forest.extract_params(),
            extra_trees: self.extra_trees.extract_params(),
            ridge: self.ridge.extract_params(),
            weights: self.weights.clone(),
        }
    }

    fn from_params(params: EnsembleParams) -> Result<Self> {
        params.weights.validate()?;
        let random_forest = ForestRegressor::from_params(params.random_forest)?;
        let extra_trees = ForestRegressor::from_params(params.extra_trees)?;
        let ridge = RidgeRegression::from_params(params.ridge)?;
        let n = ridge.n_features();
        if random_forest.n_features() != n || extra_trees.n_features() != n {
            return Err(EstimatorError::Serialization(
                "ensemble members disagree on the feature count".into(),
            ));
        }
        Ok(Self {
            random_forest,
            extra_trees,
            ridge,
            weights: params.weights,
        })
    }
}
