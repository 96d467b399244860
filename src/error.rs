//! Crate-wide error type.

use crate::preprocessing::PreprocessingError;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EstimatorError>;

/// Errors surfaced by the estimation pipeline.
///
/// Data-quality problems met while cleaning are not errors: rows are dropped
/// and counted instead. Only failures that stop a whole operation land here.
#[derive(Debug, Error)]
pub enum EstimatorError {
    /// One or more artifact files are missing; the model has not been trained.
    #[error("model unavailable: {} is missing (train the model first)", .path.display())]
    ModelUnavailable { path: PathBuf },

    /// A new bundle replaced the directory while it was being read.
    #[error("model bundle at {} changed while loading", .path.display())]
    BundleChanged { path: PathBuf },

    /// The bundle on disk was written by an incompatible format version.
    #[error("incompatible model bundle: format version {found}, expected {expected}")]
    IncompatibleBundle { found: u32, expected: u32 },

    /// A user-facing input constraint was violated.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Nothing left to train on after loading and cleaning.
    #[error("empty dataset: {0}")]
    EmptyDataset(String),

    /// Training could not complete.
    #[error("training failed: {0}")]
    Training(String),

    /// A transformer failed to fit or transform.
    #[error(transparent)]
    Preprocessing(#[from] PreprocessingError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bincode::Error> for EstimatorError {
    fn from(err: bincode::Error) -> Self {
        EstimatorError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for EstimatorError {
    fn from(err: serde_json::Error) -> Self {
        EstimatorError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for EstimatorError {
    fn from(err: toml::de::Error) -> Self {
        EstimatorError::Config(err.to_string())
    }
}

impl EstimatorError {
    /// True when the failure means "no trained model", as opposed to a bug or bad input.
    pub fn is_model_unavailable(&self) -> bool {
        matches!(
            self,
            EstimatorError::ModelUnavailable { .. }
                | EstimatorError::BundleChanged { .. }
                | EstimatorError::IncompatibleBundle { .. }
        )
    }
}
