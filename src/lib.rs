//! # immoprix
//!
//! Market value estimation for French residential property, trained on public
//! DVF sale records.
//!
//! ## Pipeline
//!
//! Training reads a DVF export in bounded chunks, drops implausible rows,
//! derives a fixed feature row per sale and fits a blend of a random forest,
//! an extra-trees forest and a ridge regression on log-prices. A global bias
//! factor learned on the training split rescales every prediction. Models are
//! only saved when they clear a test-set quality gate.
//!
//! Inference rebuilds the same feature row for a query, encodes and scales it
//! with the fitted transformers, and pulls the prediction toward a market
//! reference price per m² when the two disagree strongly.
//!
//! ## Quick Start
//!
//! ```no_run
//! use immoprix::features::EstimateQuery;
//! use immoprix::inference::Estimator;
//!
//! let estimator = Estimator::load("model")?;
//! let price = estimator.estimate(&EstimateQuery::new(60.0, 3, "75"))?;
//! println!("{price:.0} €");
//! # Ok::<(), immoprix::EstimatorError>(())
//! ```
//!
//! ## Module Structure
//!
//! - `dataset`: DVF ingestion, cleaning and in-memory splits
//! - `features`: feature rows for records and queries
//! - `preprocessing`: label encoding and robust scaling
//! - `model`: tree, forest, ridge and ensemble regressors
//! - `trainer`: training pipeline and bias correction
//! - `correction`: market references and the price corrector
//! - `persistence`: the on-disk model bundle
//! - `inference`: the shared [`inference::Estimator`]
//! - `presentation`: form checks and display figures

pub mod config;

/// Transaction records and DVF file handling.
pub mod dataset;

pub mod error;

/// Feature rows derived from records and queries.
pub mod features;

pub mod logging;
pub mod metrics;

/// Regression models with compile-time fitted state.
pub mod model;

/// Data preprocessing transformers.
pub mod preprocessing;

pub mod serialization;
pub mod trainer;

/// Post-hoc price correction against market references.
pub mod correction;

pub mod inference;
pub mod persistence;
pub mod presentation;

pub use error::{EstimatorError, Result};
