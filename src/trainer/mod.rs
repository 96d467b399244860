//! Training orchestration: from a raw DVF export to a saved model bundle.

pub mod bias;

pub use bias::{bias_factor, BIAS_BOUNDS};

use crate::dataset::{
    clean_records, CleaningConfig, CleaningStats, DepartmentBuckets, InMemoryDataset,
    IngestConfig, RawTable, TransactionRecord,
};
use crate::error::{EstimatorError, Result};
use crate::features::{FeatureBuilder, FeatureConfig, FeatureRow, FeatureTable};
use crate::metrics::{EvaluationMetrics, QualityVerdict};
use crate::model::{EnsembleConfig, EnsembleRegressor, InferenceModel, TrainableModel};
use crate::persistence::{BundleMetadata, ModelBundle, BUNDLE_FORMAT_VERSION};
use crate::preprocessing::{
    ColumnEncoder, FittedColumnEncoder, FittedRobustScaler, FittedTransformer, RobustScaler,
    Transformer,
};
use chrono::Utc;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Hyperparameters of one training run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub ensemble: EnsembleConfig,
    pub features: FeatureConfig,
    /// Share of samples held out for evaluation.
    pub test_fraction: f64,
    pub split_seed: u64,
    /// A bundle is saved only when the test R² is strictly above this.
    pub min_test_r2: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            ensemble: EnsembleConfig::default(),
            features: FeatureConfig::default(),
            test_fraction: 0.2,
            split_seed: 42,
            min_test_r2: 0.25,
        }
    }
}

impl TrainingConfig {
    pub fn with_ensemble(mut self, ensemble: EnsembleConfig) -> Self {
        self.ensemble = ensemble;
        self
    }

    pub fn with_features(mut self, features: FeatureConfig) -> Self {
        self.features = features;
        self
    }

    pub fn with_test_fraction(mut self, test_fraction: f64) -> Self {
        self.test_fraction = test_fraction;
        self
    }

    pub fn with_split_seed(mut self, seed: u64) -> Self {
        self.split_seed = seed;
        self
    }

    pub fn with_min_test_r2(mut self, min_test_r2: f64) -> Self {
        self.min_test_r2 = min_test_r2;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(EstimatorError::Config(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        self.ensemble.validate()
    }
}

/// Result of [`Trainer::run`].
#[derive(Clone, Debug, PartialEq)]
pub enum TrainingOutcome {
    /// The model passed the quality gate and was written to `dir`.
    Saved {
        metrics: EvaluationMetrics,
        dir: PathBuf,
    },
    /// The model scored too low; nothing was written.
    Rejected { metrics: EvaluationMetrics },
}

impl TrainingOutcome {
    pub fn metrics(&self) -> &EvaluationMetrics {
        match self {
            TrainingOutcome::Saved { metrics, .. } | TrainingOutcome::Rejected { metrics } => {
                metrics
            }
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, TrainingOutcome::Saved { .. })
    }
}

/// Runs the training pipeline with fixed configuration.
#[derive(Clone, Debug, Default)]
pub struct Trainer {
    config: TrainingConfig,
    ingest: IngestConfig,
    cleaning: CleaningConfig,
}

fn encode(
    encoder: &FittedColumnEncoder,
    scaler: &FittedRobustScaler,
    rows: &[FeatureRow],
) -> Result<Array2<f64>> {
    let encoded = encoder.transform(&FeatureTable::from_rows(rows))?;
    Ok(scaler.transform(&encoded)?)
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn with_ingest(mut self, ingest: IngestConfig) -> Self {
        self.ingest = ingest;
        self
    }

    pub fn with_cleaning(mut self, cleaning: CleaningConfig) -> Self {
        self.cleaning = cleaning;
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Read and clean the source, capped at the configured sample size.
    pub fn load_records<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> Result<(Vec<TransactionRecord>, CleaningStats)> {
        self.ingest.validate()?;
        self.cleaning.validate()?;
        let table = RawTable::read_path(path, &self.ingest)?;
        Ok(clean_records(&table, &self.cleaning))
    }

    /// Fit encoders, scaler, ensemble and bias factor on cleaned records.
    pub fn fit_records(&self, records: &[TransactionRecord]) -> Result<ModelBundle> {
        self.config.validate()?;
        if records.is_empty() {
            return Err(EstimatorError::EmptyDataset(
                "no records left after cleaning".into(),
            ));
        }

        let buckets = DepartmentBuckets::fit(records, self.cleaning.min_department_count);
        let builder = FeatureBuilder::new(self.config.features.clone());
        let rows: Vec<FeatureRow> = records
            .iter()
            .map(|record| builder.from_record(record, &buckets))
            .collect();
        let log_prices: Vec<f64> = records.iter().map(|r| r.price.ln_1p()).collect();

        let dataset = InMemoryDataset::new(rows, log_prices)?;
        let (train, test) =
            dataset.train_test_split(self.config.test_fraction, self.config.split_seed)?;
        info!(train = train.len(), test = test.len(), "dataset split");

        let train_table = FeatureTable::from_rows(train.samples());
        let encoder = ColumnEncoder::new().fit(&train_table)?;
        let scaler = RobustScaler::new().fit(&encoder.transform(&train_table)?)?;
        let x_train = encode(&encoder, &scaler, train.samples())?;
        let x_test = encode(&encoder, &scaler, test.samples())?;

        let ensemble =
            EnsembleRegressor::new(self.config.ensemble.clone()).fit(&x_train, train.targets())?;

        let to_prices = |log: &[f64]| log.iter().map(|v| v.exp_m1()).collect::<Vec<f64>>();
        let train_actual = to_prices(train.targets());
        let test_actual = to_prices(test.targets());
        let train_raw: Vec<f64> = ensemble
            .predict_batch(&x_train)
            .iter()
            .map(|v| v.exp_m1())
            .collect();
        let bias = bias_factor(&train_actual, &train_raw);

        let train_pred: Vec<f64> = train_raw.iter().map(|p| p * bias).collect();
        let test_pred: Vec<f64> = ensemble
            .predict_batch(&x_test)
            .iter()
            .map(|p| p.exp_m1() * bias)
            .collect();
        let metrics =
            EvaluationMetrics::compute(&train_actual, &train_pred, &test_actual, &test_pred)?;
        info!(
            bias_factor = bias,
            r2_train = metrics.r2_train,
            r2_test = metrics.r2_test,
            mae_test = metrics.mae_test,
            overfit_gap = metrics.overfit_gap,
            verdict = %metrics.verdict(),
            "model evaluated"
        );

        let metadata = BundleMetadata {
            format_version: BUNDLE_FORMAT_VERSION,
            bias_factor: bias,
            metrics,
            training: self.config.clone(),
            cleaning: self.cleaning.clone(),
            n_train: train.len(),
            n_test: test.len(),
            created_at: Utc::now(),
        };
        let columns = train_table.columns().to_vec();
        ModelBundle::new(ensemble, encoder, scaler, columns, metadata)
    }

    /// Save `bundle` to `dir` when its test R² clears the quality gate.
    pub fn gate<P: AsRef<Path>>(&self, bundle: &ModelBundle, dir: P) -> Result<TrainingOutcome> {
        let metrics = bundle.metadata().metrics;
        if metrics.r2_test > self.config.min_test_r2 {
            bundle.save(dir.as_ref())?;
            Ok(TrainingOutcome::Saved {
                metrics,
                dir: dir.as_ref().to_path_buf(),
            })
        } else {
            warn!(
                r2_test = metrics.r2_test,
                min_test_r2 = self.config.min_test_r2,
                verdict = %QualityVerdict::from_r2(metrics.r2_test),
                "model rejected, bundle not saved"
            );
            Ok(TrainingOutcome::Rejected { metrics })
        }
    }

    /// Full pipeline: load, clean, fit, evaluate and save when good enough.
    pub fn run<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        data: P,
        model_dir: Q,
    ) -> Result<TrainingOutcome> {
        let (records, stats) = self.load_records(data)?;
        info!(kept = stats.kept, dropped = stats.dropped(), "records ready");
        let bundle = self.fit_records(&records)?;
        self.gate(&bundle, model_dir)
    }
}
