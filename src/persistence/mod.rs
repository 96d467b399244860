//! On-disk model bundle.
//!
//! A bundle is a directory of five files written by one training run:
//! the ensemble, the column encoders and the scaler as bincode, the feature
//! column list and the metadata as JSON. A save writes all five files into a
//! staging directory next to the target and only then swaps it in, so a bundle
//! directory never mixes files from two training runs. Loading checks every
//! file before reading any of them.

use crate::dataset::CleaningConfig;
use crate::error::{EstimatorError, Result};
use crate::features::FeatureBuilder;
use crate::metrics::EvaluationMetrics;
use crate::model::{EnsembleRegressor, Fitted, InferenceModel};
use crate::preprocessing::{FittedColumnEncoder, FittedRobustScaler, FittedTransformer};
use crate::serialization::SerializableParams;
use crate::trainer::TrainingConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Bumped whenever the layout of any bundle file changes.
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

pub const ENSEMBLE_FILE: &str = "ensemble.bin";
pub const ENCODERS_FILE: &str = "encoders.bin";
pub const SCALER_FILE: &str = "scaler.bin";
pub const COLUMNS_FILE: &str = "columns.json";
pub const METADATA_FILE: &str = "metadata.json";

/// Every file a complete bundle holds.
pub const BUNDLE_FILES: [&str; 5] = [
    ENSEMBLE_FILE,
    ENCODERS_FILE,
    SCALER_FILE,
    COLUMNS_FILE,
    METADATA_FILE,
];

/// Facts about the training run that produced a bundle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub format_version: u32,
    /// Multiplier applied to every raw prediction.
    pub bias_factor: f64,
    pub metrics: EvaluationMetrics,
    pub training: TrainingConfig,
    pub cleaning: CleaningConfig,
    pub n_train: usize,
    pub n_test: usize,
    pub created_at: DateTime<Utc>,
}

/// Everything inference needs, fitted once and read-only afterwards.
#[derive(Clone, Debug)]
pub struct ModelBundle {
    ensemble: EnsembleRegressor<Fitted>,
    encoder: FittedColumnEncoder,
    scaler: FittedRobustScaler,
    columns: Vec<String>,
    metadata: BundleMetadata,
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    debug!(path = %path.display(), bytes = bytes.len(), "bundle file written");
    Ok(())
}

/// `<dir-name><suffix>` in the parent of `dir`.
fn sibling(dir: &Path, suffix: &str) -> Result<PathBuf> {
    let name = dir.file_name().ok_or_else(|| {
        EstimatorError::Config(format!("bundle directory {} has no name", dir.display()))
    })?;
    let mut sibling = name.to_owned();
    sibling.push(suffix);
    Ok(dir.with_file_name(sibling))
}

fn remove_stale(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)?;
    }
    Ok(())
}

/// Replace `dir` with the complete bundle in `staging`.
///
/// Between the two renames `dir` is briefly absent, which readers see as an
/// unavailable model rather than a mix of old and new files.
fn swap_into_place(staging: &Path, dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::rename(staging, dir)?;
        return Ok(());
    }
    let previous = sibling(dir, &format!(".previous-{}", std::process::id()))?;
    remove_stale(&previous)?;
    fs::rename(dir, &previous)?;
    if let Err(err) = fs::rename(staging, dir) {
        fs::rename(&previous, dir)?;
        return Err(err.into());
    }
    if let Err(err) = fs::remove_dir_all(&previous) {
        warn!(path = %previous.display(), error = %err, "could not remove replaced bundle");
    }
    Ok(())
}

impl ModelBundle {
    pub fn new(
        ensemble: EnsembleRegressor<Fitted>,
        encoder: FittedColumnEncoder,
        scaler: FittedRobustScaler,
        columns: Vec<String>,
        metadata: BundleMetadata,
    ) -> Result<Self> {
        if encoder.columns() != columns.as_slice() {
            return Err(EstimatorError::Training(
                "encoder columns differ from the bundle column list".into(),
            ));
        }
        if scaler.n_features_in() != columns.len() || ensemble.n_features() != columns.len() {
            return Err(EstimatorError::Training(format!(
                "bundle expects {} features, scaler has {} and ensemble {}",
                columns.len(),
                scaler.n_features_in(),
                ensemble.n_features()
            )));
        }
        Ok(Self {
            ensemble,
            encoder,
            scaler,
            columns,
            metadata,
        })
    }

    pub fn ensemble(&self) -> &EnsembleRegressor<Fitted> {
        &self.ensemble
    }

    pub fn encoder(&self) -> &FittedColumnEncoder {
        &self.encoder
    }

    pub fn scaler(&self) -> &FittedRobustScaler {
        &self.scaler
    }

    /// Feature columns in training order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn metadata(&self) -> &BundleMetadata {
        &self.metadata
    }

    pub fn bias_factor(&self) -> f64 {
        self.metadata.bias_factor
    }

    /// Feature builder configured as during training.
    pub fn feature_builder(&self) -> FeatureBuilder {
        FeatureBuilder::new(self.metadata.training.features.clone())
    }

    /// Write all five files as the bundle in `dir`, replacing any previous one.
    ///
    /// On failure `dir` still holds the previous bundle, or nothing if there
    /// was none.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        self.save_with(dir.as_ref(), write_synced)
    }

    fn save_with<W>(&self, dir: &Path, write: W) -> Result<()>
    where
        W: Fn(&Path, &[u8]) -> Result<()>,
    {
        let staging = sibling(dir, &format!(".staging-{}", std::process::id()))?;
        remove_stale(&staging)?;
        fs::create_dir_all(&staging)?;

        let staged = self
            .write_files(&staging, write)
            .and_then(|()| swap_into_place(&staging, dir));
        if let Err(err) = staged {
            if let Err(cleanup) = remove_stale(&staging) {
                warn!(path = %staging.display(), error = %cleanup, "could not remove staging directory");
            }
            return Err(err);
        }

        info!(dir = %dir.display(), "model bundle saved");
        Ok(())
    }

    fn write_files<W>(&self, staging: &Path, write: W) -> Result<()>
    where
        W: Fn(&Path, &[u8]) -> Result<()>,
    {
        write(&staging.join(ENSEMBLE_FILE), &self.ensemble.extract_params().to_bytes()?)?;
        write(&staging.join(ENCODERS_FILE), &self.encoder.extract_params().to_bytes()?)?;
        write(&staging.join(SCALER_FILE), &self.scaler.extract_params().to_bytes()?)?;
        write(&staging.join(COLUMNS_FILE), &serde_json::to_vec_pretty(&self.columns)?)?;
        write(&staging.join(METADATA_FILE), &serde_json::to_vec_pretty(&self.metadata)?)?;
        #[cfg(unix)]
        File::open(staging)?.sync_all()?;
        Ok(())
    }

    /// Read a bundle from `dir`. Any missing file makes the whole bundle unavailable.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if let Some(missing) = BUNDLE_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| !path.is_file())
        {
            return Err(EstimatorError::ModelUnavailable { path: missing });
        }

        let metadata_path = dir.join(METADATA_FILE);
        let metadata_bytes = fs::read(&metadata_path)?;
        let metadata: BundleMetadata = serde_json::from_slice(&metadata_bytes)?;
        if metadata.format_version != BUNDLE_FORMAT_VERSION {
            return Err(EstimatorError::IncompatibleBundle {
                found: metadata.format_version,
                expected: BUNDLE_FORMAT_VERSION,
            });
        }

        let columns: Vec<String> = serde_json::from_slice(&fs::read(dir.join(COLUMNS_FILE))?)?;
        let ensemble = EnsembleRegressor::<Fitted>::load_from_file(dir.join(ENSEMBLE_FILE))?;
        let encoder = FittedColumnEncoder::load_from_file(dir.join(ENCODERS_FILE))?;
        let scaler = FittedRobustScaler::load_from_file(dir.join(SCALER_FILE))?;
        // a save swapped the directory while the payload was read
        if fs::read(&metadata_path)? != metadata_bytes {
            return Err(EstimatorError::BundleChanged {
                path: dir.to_path_buf(),
            });
        }

        let bundle = Self::new(ensemble, encoder, scaler, columns, metadata)?;
        info!(
            dir = %dir.display(),
            created_at = %bundle.metadata.created_at,
            r2_test = bundle.metadata.metrics.r2_test,
            "model bundle loaded"
        );
        Ok(bundle)
    }
}

/// True when `dir` holds every bundle file.
pub fn bundle_exists<P: AsRef<Path>>(dir: P) -> bool {
    let dir = dir.as_ref();
    BUNDLE_FILES.iter().all(|name| dir.join(name).is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{PropertyType, TransactionRecord};
    use crate::trainer::Trainer;
    use crate::model::{EnsembleConfig, ForestConfig};
    use tempfile::tempdir;

    fn small_bundle() -> ModelBundle {
        bundle_priced_at(4000.0)
    }

    fn bundle_priced_at(price_per_m2: f64) -> ModelBundle {
        let records: Vec<TransactionRecord> = (0..60)
            .map(|i| {
                let surface = 30.0 + i as f64 * 2.0;
                TransactionRecord {
                    price: surface * price_per_m2,
                    surface,
                    rooms: 1 + (i % 5) as u32,
                    plot: None,
                    property_type: Some(PropertyType::Apartment),
                    postal_code: Some(if i % 2 == 0 { "69003" } else { "13008" }.to_string()),
                    sale_date: None,
                }
            })
            .collect();
        let forest = ForestConfig::random_forest().with_n_trees(5);
        let config = TrainingConfig::default().with_ensemble(
            EnsembleConfig::default()
                .with_random_forest(forest)
                .with_extra_trees(ForestConfig::extra_trees().with_n_trees(5)),
        );
        Trainer::new(config)
            .with_cleaning(CleaningConfig::default().with_min_department_count(1))
            .fit_records(&records)
            .unwrap()
    }

    #[test]
    fn test_save_load_preserves_predictions() {
        let bundle = small_bundle();
        let dir = tempdir().unwrap();
        bundle.save(dir.path()).unwrap();
        assert!(bundle_exists(dir.path()));

        let loaded = ModelBundle::load(dir.path()).unwrap();
        assert_eq!(loaded.columns(), bundle.columns());
        assert_eq!(loaded.metadata(), bundle.metadata());

        let table = crate::features::FeatureTable::new(
            bundle.columns().to_vec(),
            vec![crate::features::FeatureBuilder::default()
                .from_query(&crate::features::EstimateQuery::new(55.0, 2, "69"))
                .values()],
        );
        let x = bundle
            .scaler()
            .transform(&bundle.encoder().transform(&table).unwrap())
            .unwrap();
        let x_loaded = loaded
            .scaler()
            .transform(&loaded.encoder().transform(&table).unwrap())
            .unwrap();
        assert_eq!(x, x_loaded);
        assert_eq!(
            bundle.ensemble().predict(x.row(0)),
            loaded.ensemble().predict(x_loaded.row(0))
        );
    }

    fn predict_query(bundle: &ModelBundle) -> f64 {
        let table = crate::features::FeatureTable::new(
            bundle.columns().to_vec(),
            vec![bundle
                .feature_builder()
                .from_query(&crate::features::EstimateQuery::new(55.0, 2, "69"))
                .values()],
        );
        let x = bundle
            .scaler()
            .transform(&bundle.encoder().transform(&table).unwrap())
            .unwrap();
        bundle.ensemble().predict(x.row(0))
    }

    fn leftovers(dir: &Path) -> Vec<String> {
        let name = dir.file_name().unwrap().to_string_lossy().to_string();
        fs::read_dir(dir.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .filter(|entry| entry.starts_with(&name) && *entry != name)
            .collect()
    }

    #[test]
    fn test_save_replaces_previous_bundle_whole() {
        let old = bundle_priced_at(4000.0);
        let new = bundle_priced_at(8000.0);
        let dir = tempdir().unwrap();
        old.save(dir.path()).unwrap();
        new.save(dir.path()).unwrap();

        let loaded = ModelBundle::load(dir.path()).unwrap();
        assert_eq!(loaded.metadata(), new.metadata());
        assert_eq!(predict_query(&loaded), predict_query(&new));
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn test_failed_last_write_keeps_previous_bundle() {
        let old = bundle_priced_at(4000.0);
        let new = bundle_priced_at(8000.0);
        let dir = tempdir().unwrap();
        old.save(dir.path()).unwrap();

        let result = new.save_with(dir.path(), |path: &Path, bytes: &[u8]| {
            if path.ends_with(METADATA_FILE) {
                return Err(std::io::Error::other("disk full").into());
            }
            write_synced(path, bytes)
        });
        assert!(matches!(result, Err(EstimatorError::Io(_))));

        let loaded = ModelBundle::load(dir.path()).unwrap();
        assert_eq!(loaded.metadata(), old.metadata());
        assert_eq!(predict_query(&loaded), predict_query(&old));
        assert_ne!(predict_query(&loaded), predict_query(&new));
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn test_failed_first_save_leaves_nothing() {
        let parent = tempdir().unwrap();
        let dir = parent.path().join("model");
        let result = small_bundle().save_with(&dir, |path: &Path, bytes: &[u8]| {
            if path.ends_with(SCALER_FILE) {
                return Err(std::io::Error::other("disk full").into());
            }
            write_synced(path, bytes)
        });
        assert!(result.is_err());
        assert!(!dir.exists());
        assert!(ModelBundle::load(&dir).unwrap_err().is_model_unavailable());
        assert!(leftovers(&dir).is_empty());
    }

    #[test]
    fn test_save_creates_missing_directory() {
        let parent = tempdir().unwrap();
        let dir = parent.path().join("nested").join("model");
        small_bundle().save(&dir).unwrap();
        assert!(bundle_exists(&dir));
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let bundle = small_bundle();
        let dir = tempdir().unwrap();
        bundle.save(dir.path()).unwrap();
        fs::remove_file(dir.path().join(SCALER_FILE)).unwrap();

        let err = ModelBundle::load(dir.path()).unwrap_err();
        match err {
            EstimatorError::ModelUnavailable { path } => assert!(path.ends_with(SCALER_FILE)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_version_mismatch_is_incompatible() {
        let bundle = small_bundle();
        let dir = tempdir().unwrap();
        bundle.save(dir.path()).unwrap();

        let mut metadata = bundle.metadata().clone();
        metadata.format_version = BUNDLE_FORMAT_VERSION + 1;
        fs::write(
            dir.path().join(METADATA_FILE),
            serde_json::to_vec(&metadata).unwrap(),
        )
        .unwrap();

        let err = ModelBundle::load(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            EstimatorError::IncompatibleBundle { found, expected }
                if found == BUNDLE_FORMAT_VERSION + 1 && expected == BUNDLE_FORMAT_VERSION
        ));
    }

    #[test]
    fn test_empty_dir_is_unavailable() {
        let dir = tempdir().unwrap();
        assert!(!bundle_exists(dir.path()));
        assert!(ModelBundle::load(dir.path()).unwrap_err().is_model_unavailable());
    }
}
