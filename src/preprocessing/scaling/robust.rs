//! Robust Scaler.
//!
//! Scales features using statistics that are robust to outliers.
//! Uses median and interquartile range (IQR) instead of mean and std.
//!
//! The transformation is:
//! ```text
//! X_scaled = (X - median) / IQR
//! ```
//!
//! where IQR is the range between the 1st quartile (25%) and 3rd quartile (75%).
//! Quantiles use linear interpolation between order statistics. A column whose
//! IQR is zero (binary flags dominated by one value, constant columns) keeps a
//! scale of 1.

use crate::preprocessing::error::PreprocessingError;
use crate::preprocessing::traits::{FittedTransformer, Transformer};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Configuration for RobustScaler.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RobustScalerConfig {
    /// If true, center the data by the median before scaling.
    pub with_centering: bool,
    /// If true, scale the data by the IQR.
    pub with_scaling: bool,
    /// Quantile range for IQR (default: (25.0, 75.0)).
    pub quantile_range: (f64, f64),
}

impl Default for RobustScalerConfig {
    fn default() -> Self {
        Self {
            with_centering: true,
            with_scaling: true,
            quantile_range: (25.0, 75.0),
        }
    }
}

/// Serializable parameters for a fitted RobustScaler.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RobustScalerParams {
    pub config: RobustScalerConfig,
    /// Median of each feature.
    pub center_: Vec<f64>,
    /// IQR of each feature.
    pub scale_: Vec<f64>,
}

/// RobustScaler transformer (unfitted).
#[derive(Clone, Debug, Default)]
pub struct RobustScaler {
    config: RobustScalerConfig,
}

impl RobustScaler {
    /// Create a new RobustScaler with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to center data by median.
    pub fn with_centering(mut self, with_centering: bool) -> Self {
        self.config.with_centering = with_centering;
        self
    }

    /// Set whether to scale data by IQR.
    pub fn with_scaling(mut self, with_scaling: bool) -> Self {
        self.config.with_scaling = with_scaling;
        self
    }

    /// Set the quantile range for IQR calculation.
    ///
    /// # Errors
    /// Returns [`PreprocessingError::InvalidParameter`] unless `0 <= min < max <= 100`.
    pub fn with_quantile_range(mut self, min: f64, max: f64) -> Result<Self, PreprocessingError> {
        if !((0.0..=100.0).contains(&min) && (0.0..=100.0).contains(&max) && min < max) {
            return Err(PreprocessingError::InvalidParameter(format!(
                "quantile range must satisfy 0 <= min < max <= 100, got ({min}, {max})"
            )));
        }
        self.config.quantile_range = (min, max);
        Ok(self)
    }
}

/// Quantile `q` (in percent) of already sorted data, linearly interpolated.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    let idx = (q / 100.0 * (n - 1) as f64).clamp(0.0, (n - 1) as f64);
    let lower = idx.floor() as usize;
    let upper = (lower + 1).min(n - 1);
    let frac = idx - lower as f64;
    sorted[lower] * (1.0 - frac) + sorted[upper] * frac
}

impl Transformer for RobustScaler {
    type Input = Array2<f64>;
    type Output = Array2<f64>;
    type Params = RobustScalerParams;
    type Fitted = FittedRobustScaler;

    fn fit(&self, data: &Self::Input) -> Result<Self::Fitted, PreprocessingError> {
        let (rows, cols) = data.dim();
        if rows == 0 {
            return Err(PreprocessingError::EmptyData(
                "Cannot fit RobustScaler on empty data".to_string(),
            ));
        }

        let mut center = vec![0.0; cols];
        let mut scale = vec![1.0; cols];
        let (q_low, q_high) = self.config.quantile_range;

        for (col, column) in data.axis_iter(Axis(1)).enumerate() {
            let mut sorted = column.to_vec();
            if sorted.iter().any(|v| !v.is_finite()) {
                return Err(PreprocessingError::NumericalError(format!(
                    "non-finite value in column {col}"
                )));
            }
            sorted.sort_by(f64::total_cmp);

            if self.config.with_centering {
                center[col] = quantile(&sorted, 50.0);
            }
            if self.config.with_scaling {
                let iqr = quantile(&sorted, q_high) - quantile(&sorted, q_low);
                scale[col] = if iqr == 0.0 { 1.0 } else { iqr };
            }
        }

        Ok(FittedRobustScaler {
            config: self.config.clone(),
            center_: Array1::from(center),
            scale_: Array1::from(scale),
        })
    }
}

/// Fitted RobustScaler ready for inference.
#[derive(Clone, Debug)]
pub struct FittedRobustScaler {
    config: RobustScalerConfig,
    center_: Array1<f64>,
    scale_: Array1<f64>,
}

impl FittedRobustScaler {
    /// Median of each feature (zeros when centering is disabled).
    pub fn center(&self) -> &Array1<f64> {
        &self.center_
    }

    /// IQR of each feature (ones when scaling is disabled).
    pub fn scale(&self) -> &Array1<f64> {
        &self.scale_
    }
}

impl FittedTransformer for FittedRobustScaler {
    type Input = Array2<f64>;
    type Output = Array2<f64>;
    type Params = RobustScalerParams;

    fn transform(&self, data: &Self::Input) -> Result<Self::Output, PreprocessingError> {
        let cols = data.ncols();
        if cols != self.n_features_in() {
            return Err(PreprocessingError::FeatureMismatch {
                expected_features: self.n_features_in(),
                got_features: cols,
            });
        }

        let mut result = data.clone();
        if self.config.with_centering {
            result -= &self.center_;
        }
        if self.config.with_scaling {
            result /= &self.scale_;
        }
        Ok(result)
    }

    fn extract_params(&self) -> Self::Params {
        RobustScalerParams {
            config: self.config.clone(),
            center_: self.center_.to_vec(),
            scale_: self.scale_.to_vec(),
        }
    }

    fn from_params(params: Self::Params) -> Result<Self, PreprocessingError> {
        if params.center_.len() != params.scale_.len() {
            return Err(PreprocessingError::FeatureMismatch {
                expected_features: params.center_.len(),
                got_features: params.scale_.len(),
            });
        }
        if params.scale_.iter().any(|&s| s == 0.0 || !s.is_finite()) {
            return Err(PreprocessingError::InvalidParameter(
                "scale must be finite and non-zero".to_string(),
            ));
        }
        Ok(Self {
            config: params.config,
            center_: Array1::from(params.center_),
            scale_: Array1::from(params.scale_),
        })
    }

    fn n_features_in(&self) -> usize {
        self.center_.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn create_test_data() -> Array2<f64> {
        // second column has an outlier
        array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 8.0], [5.0, 100.0]]
    }

    #[test]
    fn test_robust_scaler_fit() {
        let fitted = RobustScaler::new().fit(&create_test_data()).unwrap();
        let center = fitted.center();
        let scale = fitted.scale();

        // [1, 2, 3, 4, 5]: median 3, Q1 2, Q3 4
        assert!((center[0] - 3.0).abs() < 1e-12);
        assert!((scale[0] - 2.0).abs() < 1e-12);

        // [2, 4, 6, 8, 100]: median 6, Q1 4, Q3 8, outlier ignored
        assert!((center[1] - 6.0).abs() < 1e-12);
        assert!((scale[1] - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_center_is_median_not_iqr_midpoint() {
        // Q1 = 1, Q3 = 10, midpoint 5.5, median 2
        let data = array![[0.0], [1.0], [2.0], [10.0], [11.0]];
        let fitted = RobustScaler::new().fit(&data).unwrap();
        assert!((fitted.center()[0] - 2.0).abs() < 1e-12);
        assert!((fitted.scale()[0] - 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_robust_scaler_transform() {
        let data = create_test_data();
        let transformed = RobustScaler::new().fit_transform(&data).unwrap();
        let expected = [-1.0, -0.5, 0.0, 0.5, 1.0];
        for (row, want) in expected.iter().enumerate() {
            assert!((transformed[[row, 0]] - want).abs() < 1e-12);
        }
    }

    #[test]
    fn test_constant_column_keeps_unit_scale() {
        let data = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0], [5.0, 1.0]];
        let fitted = RobustScaler::new().fit(&data).unwrap();
        assert_eq!(fitted.scale()[1], 1.0);
    }

    #[test]
    fn test_robust_scaler_without_centering() {
        let fitted = RobustScaler::new()
            .with_centering(false)
            .fit(&create_test_data())
            .unwrap();
        assert!(fitted.center().iter().all(|&c| c == 0.0));
    }

    #[test]
    fn test_robust_scaler_without_scaling() {
        let fitted = RobustScaler::new()
            .with_scaling(false)
            .fit(&create_test_data())
            .unwrap();
        assert!(fitted.scale().iter().all(|&s| s == 1.0));
    }

    #[test]
    fn test_invalid_quantile_range() {
        assert!(RobustScaler::new().with_quantile_range(75.0, 25.0).is_err());
        assert!(RobustScaler::new().with_quantile_range(10.0, 90.0).is_ok());
    }

    #[test]
    fn test_restored_scaler_transforms_identically() {
        let data = create_test_data();
        let fitted = RobustScaler::new().fit(&data).unwrap();
        let restored = FittedRobustScaler::from_params(fitted.extract_params()).unwrap();

        let t1 = fitted.transform(&data).unwrap();
        let t2 = restored.transform(&data).unwrap();
        assert_eq!(t1, t2);
    }

    #[test]
    fn test_transform_is_idempotent_for_fixed_params() {
        let data = create_test_data();
        let fitted = RobustScaler::new().fit(&data).unwrap();
        let first = fitted.transform(&data).unwrap();
        let second = fitted.transform(&data).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_robust_scaler_feature_mismatch() {
        let fitted = RobustScaler::new().fit(&create_test_data()).unwrap();
        let wrong = array![[1.0, 2.0, 3.0]];
        assert!(matches!(
            fitted.transform(&wrong),
            Err(PreprocessingError::FeatureMismatch {
                expected_features: 2,
                got_features: 3
            })
        ));
    }

    #[test]
    fn test_robust_scaler_empty_data() {
        let data = Array2::<f64>::zeros((0, 2));
        assert!(RobustScaler::new().fit(&data).is_err());
    }

    #[test]
    fn test_robust_scaler_rejects_nan() {
        let data = array![[1.0], [f64::NAN]];
        assert!(matches!(
            RobustScaler::new().fit(&data),
            Err(PreprocessingError::NumericalError(_))
        ));
    }

    #[test]
    fn test_robust_scaler_save_load_file() {
        let data = create_test_data();
        let fitted = RobustScaler::new().fit(&data).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.bin");
        fitted.save_to_file(&path).unwrap();
        let loaded = FittedRobustScaler::load_from_file(&path).unwrap();

        assert_eq!(loaded.n_features_in(), 2);
        assert_eq!(
            fitted.transform(&data).unwrap(),
            loaded.transform(&data).unwrap()
        );
    }
}
