//! Regression models over dense `f64` feature matrices.
//!
//! Every model comes in two type states: `Model<Unfitted>` carries only its
//! hyperparameters and implements [`TrainableModel`]; training consumes it and
//! returns a `Model<Fitted>` implementing [`InferenceModel`].

use crate::error::{EstimatorError, Result};
use crate::serialization::SerializableParams;
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;

pub mod ensemble;
pub mod forest;
pub mod linear;
pub mod state;
pub mod tree;

pub use ensemble::{BlendWeights, EnsembleConfig, EnsembleParams, EnsembleRegressor};
pub use forest::{ForestConfig, ForestParams, ForestRegressor};
pub use linear::{RidgeConfig, RidgeParams, RidgeRegression};
pub use state::{Fitted, Unfitted};
pub use tree::{Node, RegressionTree, SplitStrategy, TreeConfig};

/// A model that learns from a feature matrix and a target vector.
pub trait TrainableModel {
    type Output: InferenceModel;

    /// Fit on `x` (one row per sample) against `y`.
    fn fit(self, x: &Array2<f64>, y: &[f64]) -> Result<Self::Output>;
}

/// A trained model ready for prediction and serialization.
pub trait InferenceModel: Sync {
    type Params: SerializableParams;

    /// Number of features expected per sample.
    fn n_features(&self) -> usize;

    /// Predict one sample.
    fn predict(&self, row: ArrayView1<'_, f64>) -> f64;

    /// Predict every row of `x`, in parallel.
    fn predict_batch(&self, x: &Array2<f64>) -> Array1<f64> {
        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| self.predict(x.row(i)))
            .collect();
        Array1::from(predictions)
    }

    fn extract_params(&self) -> Self::Params;

    fn from_params(params: Self::Params) -> Result<Self>
    where
        Self: Sized;

    fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let bytes = self
            .extract_params()
            .to_bytes()
            .map_err(|e| EstimatorError::Serialization(e.to_string()))?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self>
    where
        Self: Sized,
    {
        let bytes = std::fs::read(path)?;
        let params = Self::Params::from_bytes(&bytes)
            .map_err(|e| EstimatorError::Serialization(e.to_string()))?;
        Self::from_params(params)
    }
}

/// Shape checks shared by the `fit` implementations.
pub(crate) fn check_training_data(x: &Array2<f64>, y: &[f64]) -> Result<()> {
    if x.nrows() == 0 {
        return Err(EstimatorError::EmptyDataset("no training samples".into()));
    }
    if x.nrows() != y.len() {
        return Err(EstimatorError::Training(format!(
            "x has {} rows but y has {} values",
            x.nrows(),
            y.len()
        )));
    }
    if x.iter().chain(y).any(|v| !v.is_finite()) {
        return Err(EstimatorError::Training(
            "training data contains non-finite values".into(),
        ));
    }
    Ok(())
}
