//! Regression metrics and the model quality summary recorded with a bundle.

use crate::error::{EstimatorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Metrics for evaluating regression models.
pub struct Metrics;

impl Metrics {
    /// Mean Squared Error: `mean((y_true - y_pred)^2)`.
    pub fn mse(y_true: &[f64], y_pred: &[f64]) -> f64 {
        debug_assert_eq!(y_true.len(), y_pred.len(), "Arrays must have the same length");
        if y_true.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = y_true
            .iter()
            .zip(y_pred)
            .map(|(&t, &p)| (t - p).powi(2))
            .sum();
        sum_sq / y_true.len() as f64
    }

    /// Root Mean Squared Error, in the units of the target.
    pub fn rmse(y_true: &[f64], y_pred: &[f64]) -> f64 {
        Self::mse(y_true, y_pred).sqrt()
    }

    /// Mean Absolute Error: `mean(|y_true - y_pred|)`.
    pub fn mae(y_true: &[f64], y_pred: &[f64]) -> f64 {
        debug_assert_eq!(y_true.len(), y_pred.len(), "Arrays must have the same length");
        if y_true.is_empty() {
            return 0.0;
        }
        let sum_abs: f64 = y_true
            .iter()
            .zip(y_pred)
            .map(|(&t, &p)| (t - p).abs())
            .sum();
        sum_abs / y_true.len() as f64
    }

    /// Coefficient of determination: `1 - SS_res / SS_tot`.
    ///
    /// Can be negative when the model is worse than predicting the mean.
    pub fn r_squared(y_true: &[f64], y_pred: &[f64]) -> f64 {
        debug_assert_eq!(y_true.len(), y_pred.len(), "Arrays must have the same length");
        if y_true.is_empty() {
            return 0.0;
        }
        let mean_true = y_true.iter().sum::<f64>() / y_true.len() as f64;
        let ss_res: f64 = y_true
            .iter()
            .zip(y_pred)
            .map(|(&t, &p)| (t - p).powi(2))
            .sum();
        let ss_tot: f64 = y_true.iter().map(|&t| (t - mean_true).powi(2)).sum();

        if ss_tot == 0.0 {
            return if ss_res == 0.0 { 1.0 } else { 0.0 };
        }
        1.0 - ss_res / ss_tot
    }

    pub fn calculate_all(y_true: &[f64], y_pred: &[f64]) -> RegressionMetrics {
        RegressionMetrics {
            mse: Self::mse(y_true, y_pred),
            rmse: Self::rmse(y_true, y_pred),
            mae: Self::mae(y_true, y_pred),
            r_squared: Self::r_squared(y_true, y_pred),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r_squared: f64,
}

/// Quality label derived from the test R².
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityVerdict {
    VeryGood,
    Good,
    NeedsWork,
}

impl QualityVerdict {
    /// `> 0.35` very good, `> 0.25` good, anything else needs work.
    pub fn from_r2(r2_test: f64) -> Self {
        if r2_test > 0.35 {
            QualityVerdict::VeryGood
        } else if r2_test > 0.25 {
            QualityVerdict::Good
        } else {
            QualityVerdict::NeedsWork
        }
    }
}

impl fmt::Display for QualityVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QualityVerdict::VeryGood => "very good",
            QualityVerdict::Good => "good",
            QualityVerdict::NeedsWork => "needs work",
        })
    }
}

/// Train and test scores of a fitted estimator, on bias-corrected prices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub r2_train: f64,
    pub r2_test: f64,
    pub mae_train: f64,
    pub mae_test: f64,
    /// `|r2_train - r2_test|`.
    pub overfit_gap: f64,
}

impl EvaluationMetrics {
    /// Scores of both splits. Each prediction slice must pair up with its targets.
    pub fn compute(
        train_true: &[f64],
        train_pred: &[f64],
        test_true: &[f64],
        test_pred: &[f64],
    ) -> Result<Self> {
        for (split, truth, pred) in [("train", train_true, train_pred), ("test", test_true, test_pred)] {
            if truth.len() != pred.len() {
                return Err(EstimatorError::Training(format!(
                    "{split} split has {} targets but {} predictions",
                    truth.len(),
                    pred.len()
                )));
            }
        }
        let r2_train = Metrics::r_squared(train_true, train_pred);
        let r2_test = Metrics::r_squared(test_true, test_pred);
        Ok(Self {
            r2_train,
            r2_test,
            mae_train: Metrics::mae(train_true, train_pred),
            mae_test: Metrics::mae(test_true, test_pred),
            overfit_gap: (r2_train - r2_test).abs(),
        })
    }

    pub fn verdict(&self) -> QualityVerdict {
        QualityVerdict::from_r2(self.r2_test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mse_error() {
        let y_true = [1.0, 2.0, 3.0, 4.0];
        let y_pred = [2.0, 3.0, 4.0, 5.0];
        assert!((Metrics::mse(&y_true, &y_pred) - 1.0).abs() < 1e-12);
        assert!((Metrics::rmse(&y_true, &y_pred) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_mae() {
        let y_true = [1.0, 2.0, 3.0, 4.0];
        let y_pred = [2.0, 1.0, 4.0, 4.0];
        assert!((Metrics::mae(&y_true, &y_pred) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_r_squared_perfect_and_mean() {
        let y = [1.0, 2.0, 3.0, 4.0];
        assert!((Metrics::r_squared(&y, &y) - 1.0).abs() < 1e-12);
        assert!(Metrics::r_squared(&y, &[2.5; 4]).abs() < 1e-12);
    }

    #[test]
    fn test_r_squared_constant_target() {
        assert_eq!(Metrics::r_squared(&[2.0; 3], &[2.0; 3]), 1.0);
        assert_eq!(Metrics::r_squared(&[2.0; 3], &[1.0; 3]), 0.0);
    }

    #[test]
    fn test_calculate_all() {
        let y = [1.0, 2.0, 3.0, 4.0];
        let metrics = Metrics::calculate_all(&y, &y);
        assert_eq!(metrics.mse, 0.0);
        assert_eq!(metrics.mae, 0.0);
        assert_eq!(metrics.r_squared, 1.0);
    }

    #[test]
    fn test_verdict_thresholds() {
        assert_eq!(QualityVerdict::from_r2(0.5), QualityVerdict::VeryGood);
        assert_eq!(QualityVerdict::from_r2(0.35), QualityVerdict::Good);
        assert_eq!(QualityVerdict::from_r2(0.3), QualityVerdict::Good);
        assert_eq!(QualityVerdict::from_r2(0.25), QualityVerdict::NeedsWork);
        assert_eq!(QualityVerdict::NeedsWork.to_string(), "needs work");
    }

    #[test]
    fn test_overfit_gap() {
        let y = [1.0, 2.0, 3.0, 4.0];
        let m = EvaluationMetrics::compute(&y, &y, &y, &[2.5; 4]).unwrap();
        assert_eq!(m.r2_train, 1.0);
        assert!((m.overfit_gap - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_evaluation_rejects_unpaired_predictions() {
        let y = [1.0, 2.0, 3.0, 4.0];
        let err = EvaluationMetrics::compute(&y, &y, &y, &[2.5; 3]).unwrap_err();
        assert!(matches!(err, EstimatorError::Training(_)));
        assert!(err.to_string().contains("test split has 4 targets but 3 predictions"));
    }
}
