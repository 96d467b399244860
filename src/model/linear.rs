//! Ridge regression (L2-penalized least squares) solved in closed form.

use super::state::{Fitted, Unfitted};
use super::{check_training_data, InferenceModel, TrainableModel};
use crate::error::{EstimatorError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RidgeConfig {
    /// L2 penalty strength. The intercept is not penalized.
    pub alpha: f64,
}

impl Default for RidgeConfig {
    fn default() -> Self {
        Self { alpha: 75.0 }
    }
}

impl RidgeConfig {
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RidgeParams {
    pub weights: Vec<f64>,
    pub intercept: f64,
}

pub struct RidgeRegression<S> {
    config: RidgeConfig,
    weights: Array1<f64>,
    intercept: f64,
    _state: PhantomData<S>,
}

impl<S> Clone for RidgeRegression<S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            weights: self.weights.clone(),
            intercept: self.intercept,
            _state: PhantomData,
        }
    }
}

impl<S> std::fmt::Debug for RidgeRegression<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RidgeRegression")
            .field("alpha", &self.config.alpha)
            .field("weights", &self.weights)
            .field("intercept", &self.intercept)
            .finish()
    }
}

impl RidgeRegression<Unfitted> {
    pub fn new(config: RidgeConfig) -> Self {
        Self {
            config,
            weights: Array1::zeros(0),
            intercept: 0.0,
            _state: PhantomData,
        }
    }
}

impl RidgeRegression<Fitted> {
    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

/// Solve `a · w = b` for symmetric positive definite `a` via Cholesky.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[[i, j]];
            for k in 0..j {
                sum -= l[[i, k]] * l[[j, k]];
            }
            if i == j {
                if sum <= 1e-10 * a[[i, i]].abs().max(1.0) {
                    return None;
                }
                l[[i, i]] = sum.sqrt();
            } else {
                l[[i, j]] = sum / l[[j, j]];
            }
        }
    }

    // forward: L z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let s: f64 = (0..i).map(|k| l[[i, k]] * z[k]).sum();
        z[i] = (b[i] - s) / l[[i, i]];
    }
    // backward: Lᵀ w = z
    let mut w = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let s: f64 = (i + 1..n).map(|k| l[[k, i]] * w[k]).sum();
        w[i] = (z[i] - s) / l[[i, i]];
    }
    Some(w)
}

impl TrainableModel for RidgeRegression<Unfitted> {
    type Output = RidgeRegression<Fitted>;

    /// Minimizes `||y - Xw - b||² + alpha·||w||²` on centered data:
    /// `(XcᵀXc + alpha·I) w = Xcᵀ yc`, then `b = mean(y) - mean(X)·w`.
    fn fit(self, x: &Array2<f64>, y: &[f64]) -> Result<RidgeRegression<Fitted>> {
        check_training_data(x, y)?;
        if !(self.config.alpha >= 0.0 && self.config.alpha.is_finite()) {
            return Err(EstimatorError::Config(format!(
                "ridge alpha must be finite and non-negative, got {}",
                self.config.alpha
            )));
        }

        let y = Array1::from(y.to_vec());
        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| EstimatorError::EmptyDataset("no training samples".into()))?;
        let y_mean = y.mean().unwrap_or(0.0);

        let xc = x - &x_mean;
        let yc = &y - y_mean;

        let mut gram = xc.t().dot(&xc);
        for i in 0..gram.nrows() {
            gram[[i, i]] += self.config.alpha;
        }
        let rhs = xc.t().dot(&yc);

        let weights = cholesky_solve(&gram, &rhs).ok_or_else(|| {
            EstimatorError::Training("ridge normal equations are singular".into())
        })?;
        let intercept = y_mean - x_mean.dot(&weights);

        Ok(RidgeRegression {
            config: self.config,
            weights,
            intercept,
            _state: PhantomData,
        })
    }
}

impl InferenceModel for RidgeRegression<Fitted> {
    type Params = RidgeParams;

    fn n_features(&self) -> usize {
        self.weights.len()
    }

    fn predict(&self, row: ArrayView1<'_, f64>) -> f64 {
        row.dot(&self.weights) + self.intercept
    }

    fn extract_params(&self) -> RidgeParams {
        RidgeParams {
            weights: self.weights.to_vec(),
            intercept: self.intercept,
        }
    }

    fn from_params(params: RidgeParams) -> Result<Self> {
        Ok(Self {
            config: RidgeConfig::default(),
            weights: Array1::from(params.weights),
            intercept: params.intercept,
            _state: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_zero_alpha_recovers_exact_line() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = [1.0, 3.0, 5.0, 7.0];
        let model = RidgeRegression::new(RidgeConfig::default().with_alpha(0.0))
            .fit(&x, &y)
            .unwrap();
        assert!((model.weights()[0] - 2.0).abs() < 1e-9);
        assert!((model.intercept() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_penalty_shrinks_weights() {
        // Xc = [-1.5, -0.5, 0.5, 1.5], XcᵀXc = 5, Xcᵀyc = 10
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = [1.0, 3.0, 5.0, 7.0];
        let model = RidgeRegression::new(RidgeConfig::default().with_alpha(5.0))
            .fit(&x, &y)
            .unwrap();
        assert!((model.weights()[0] - 1.0).abs() < 1e-9);
        // intercept keeps the fit through the means: 4 - 1.5 * 1
        assert!((model.intercept() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_collinear_features_solved_with_penalty() {
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];
        let y = [1.0, 2.0, 3.0];
        let model = RidgeRegression::new(RidgeConfig::default()).fit(&x, &y).unwrap();
        assert!(model.weights().iter().all(|w| w.is_finite()));
    }

    #[test]
    fn test_singular_without_penalty_fails() {
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0]];
        let y = [1.0, 2.0, 3.0];
        let result = RidgeRegression::new(RidgeConfig::default().with_alpha(0.0)).fit(&x, &y);
        assert!(result.is_err());
    }

    #[test]
    fn test_linear_model_save_load() {
        let x = array![[0.0, 1.0], [1.0, 0.0], [2.0, 2.0]];
        let y = [1.0, 2.0, 4.0];
        let model = RidgeRegression::new(RidgeConfig::default().with_alpha(1.0))
            .fit(&x, &y)
            .unwrap();

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("model.bin");
        model.save_to_file(&path).unwrap();
        let loaded = RidgeRegression::<Fitted>::load_from_file(&path).unwrap();

        assert_eq!(model.extract_params(), loaded.extract_params());
        assert_eq!(model.predict(x.row(2)), loaded.predict(x.row(2)));
    }
}
