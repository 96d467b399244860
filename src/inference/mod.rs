//! Thread-safe price estimation over a loaded model bundle.

use crate::correction::PriceCorrector;
use crate::error::{EstimatorError, Result};
use crate::features::{EstimateQuery, FeatureTable};
use crate::model::InferenceModel;
use crate::persistence::ModelBundle;
use crate::preprocessing::FittedTransformer;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Estimates prices from a shared, swappable [`ModelBundle`].
///
/// Readers clone the current `Arc` and never hold the lock while computing.
/// [`Estimator::reload`] loads a complete bundle before swapping it in.
#[derive(Debug)]
pub struct Estimator {
    dir: PathBuf,
    bundle: RwLock<Option<Arc<ModelBundle>>>,
    corrector: PriceCorrector,
}

fn check_query(query: &EstimateQuery) -> Result<()> {
    if !(query.surface.is_finite() && query.surface > 0.0) {
        return Err(EstimatorError::InvalidInput(format!(
            "surface must be a positive number, got {}",
            query.surface
        )));
    }
    if query.rooms < 1 {
        return Err(EstimatorError::InvalidInput(
            "rooms must be at least 1".into(),
        ));
    }
    if !(query.plot.is_finite() && query.plot >= 0.0) {
        return Err(EstimatorError::InvalidInput(format!(
            "plot must be zero or positive, got {}",
            query.plot
        )));
    }
    Ok(())
}

impl Estimator {
    /// Load the bundle in `dir`.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let bundle = ModelBundle::load(dir.as_ref())?;
        Ok(Self::from_bundle(dir, bundle))
    }

    /// Wrap an already loaded bundle; `dir` is where reloads read from.
    pub fn from_bundle<P: AsRef<Path>>(dir: P, bundle: ModelBundle) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            bundle: RwLock::new(Some(Arc::new(bundle))),
            corrector: PriceCorrector::inference(),
        }
    }

    /// An estimator with no model yet. Every estimate reports
    /// [`EstimatorError::ModelUnavailable`] until a reload succeeds.
    pub fn unloaded<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            bundle: RwLock::new(None),
            corrector: PriceCorrector::inference(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Replace the inference-time corrector.
    pub fn with_corrector(mut self, corrector: PriceCorrector) -> Self {
        self.corrector = corrector;
        self
    }

    /// The bundle currently in use.
    pub fn bundle(&self) -> Result<Arc<ModelBundle>> {
        self.bundle
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| EstimatorError::ModelUnavailable {
                path: self.dir.clone(),
            })
    }

    pub fn is_loaded(&self) -> bool {
        self.bundle
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Load the bundle from disk again and swap it in. On failure the
    /// current bundle stays in place.
    pub fn reload(&self) -> Result<()> {
        let fresh = match ModelBundle::load(&self.dir) {
            Ok(bundle) => Arc::new(bundle),
            Err(err) => {
                warn!(dir = %self.dir.display(), error = %err, "reload failed, keeping current model");
                return Err(err);
            }
        };
        *self.bundle.write().unwrap_or_else(PoisonError::into_inner) = Some(fresh);
        info!(dir = %self.dir.display(), "model reloaded");
        Ok(())
    }

    /// Model price for `query` after bias correction, before any market
    /// correction.
    pub fn raw_estimate(&self, query: &EstimateQuery) -> Result<f64> {
        check_query(query)?;
        let bundle = self.bundle()?;

        let row = bundle.feature_builder().from_query(query);
        let (cells, concordance) = row.align(bundle.columns());
        if !concordance.is_exact() {
            debug!(
                missing = ?concordance.missing,
                extra = ?concordance.extra,
                "query columns differ from the model"
            );
        }
        let table = FeatureTable::new(bundle.columns().to_vec(), vec![cells]);
        let encoded = bundle.encoder().transform(&table)?;
        let x = bundle.scaler().transform(&encoded)?;

        let log_price = bundle.ensemble().predict(x.row(0));
        Ok(log_price.exp_m1() * bundle.bias_factor())
    }

    /// Estimated price of the property described by `query`.
    pub fn estimate(&self, query: &EstimateQuery) -> Result<f64> {
        let raw = self.raw_estimate(query)?;
        let price = self.corrector.correct_price(
            raw,
            query.surface,
            query.department_code(),
            query.property_type,
            query.plot,
        );
        debug!(
            department = query.department_code(),
            surface = query.surface,
            raw,
            price,
            "estimate computed"
        );
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_unloaded_reports_unavailable() {
        let dir = tempdir().unwrap();
        let estimator = Estimator::unloaded(dir.path());
        assert!(!estimator.is_loaded());
        let err = estimator.estimate(&EstimateQuery::new(60.0, 3, "75")).unwrap_err();
        assert!(err.is_model_unavailable());
    }

    #[test]
    fn test_failed_reload_is_unavailable() {
        let dir = tempdir().unwrap();
        let estimator = Estimator::unloaded(dir.path());
        assert!(estimator.reload().unwrap_err().is_model_unavailable());
        assert!(!estimator.is_loaded());
    }

    #[test]
    fn test_load_missing_dir() {
        let dir = tempdir().unwrap();
        let err = Estimator::load(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, EstimatorError::ModelUnavailable { .. }));
    }

    #[test]
    fn test_query_validation() {
        assert!(check_query(&EstimateQuery::new(60.0, 3, "75")).is_ok());
        assert!(matches!(
            check_query(&EstimateQuery::new(0.0, 3, "75")),
            Err(EstimatorError::InvalidInput(_))
        ));
        assert!(matches!(
            check_query(&EstimateQuery::new(f64::NAN, 3, "75")),
            Err(EstimatorError::InvalidInput(_))
        ));
        assert!(matches!(
            check_query(&EstimateQuery::new(60.0, 0, "75")),
            Err(EstimatorError::InvalidInput(_))
        ));
        assert!(matches!(
            check_query(&EstimateQuery::new(60.0, 2, "75").with_plot(-1.0)),
            Err(EstimatorError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_invalid_input_checked_before_model() {
        let dir = tempdir().unwrap();
        let estimator = Estimator::unloaded(dir.path());
        let err = estimator.estimate(&EstimateQuery::new(-5.0, 3, "75")).unwrap_err();
        assert!(matches!(err, EstimatorError::InvalidInput(_)));
    }
}
