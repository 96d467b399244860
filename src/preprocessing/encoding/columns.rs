use super::label::{FittedLabelEncoder, HandleUnknown, LabelEncoder, LabelEncoderParams};
use crate::features::{FeatureTable, FeatureValue};
use crate::preprocessing::error::PreprocessingError;
use crate::preprocessing::traits::{FittedTransformer, Transformer};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fits a [`LabelEncoder`] for every column that holds categorical cells.
#[derive(Clone, Debug, Default)]
pub struct ColumnEncoder {
    handle_unknown: HandleUnknown,
}

impl ColumnEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handle_unknown(mut self, handle_unknown: HandleUnknown) -> Self {
        self.handle_unknown = handle_unknown;
        self
    }
}

impl Transformer for ColumnEncoder {
    type Input = FeatureTable;
    type Output = Array2<f64>;
    type Params = ColumnEncoderParams;
    type Fitted = FittedColumnEncoder;

    fn fit(&self, table: &FeatureTable) -> Result<FittedColumnEncoder, PreprocessingError> {
        if table.is_empty() {
            return Err(PreprocessingError::EmptyData(
                "Cannot fit ColumnEncoder on empty data".to_string(),
            ));
        }

        let mut encoders = BTreeMap::new();
        for (idx, name) in table.columns().iter().enumerate() {
            let is_categorical = table
                .column(idx)
                .any(|cell| matches!(cell, FeatureValue::Categorical(_)));
            if !is_categorical {
                continue;
            }

            let labels: Vec<String> = table
                .column(idx)
                .map(|cell| match cell {
                    FeatureValue::Categorical(s) => s.clone(),
                    FeatureValue::Numeric(v) => v.to_string(),
                })
                .collect();
            let encoder = LabelEncoder::new()
                .with_handle_unknown(self.handle_unknown)
                .fit(&labels)?;
            encoders.insert(name.clone(), encoder);
        }

        Ok(FittedColumnEncoder {
            columns: table.columns().to_vec(),
            encoders,
        })
    }
}

/// Serializable parameters for a fitted ColumnEncoder.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnEncoderParams {
    pub columns: Vec<String>,
    pub encoders: Vec<(String, LabelEncoderParams)>,
}

/// Per-column label encoders fitted on training data.
#[derive(Clone, Debug)]
pub struct FittedColumnEncoder {
    columns: Vec<String>,
    encoders: BTreeMap<String, FittedLabelEncoder>,
}

impl FittedColumnEncoder {
    /// Column layout seen during fit.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Encoder of a categorical column.
    pub fn encoder(&self, column: &str) -> Option<&FittedLabelEncoder> {
        self.encoders.get(column)
    }

    pub fn categorical_columns(&self) -> impl Iterator<Item = &str> {
        self.encoders.keys().map(String::as_str)
    }

    fn encode_cell(&self, column: &str, cell: &FeatureValue) -> Result<f64, PreprocessingError> {
        match (self.encoders.get(column), cell) {
            (None, FeatureValue::Numeric(v)) => Ok(*v),
            (None, FeatureValue::Categorical(_)) => {
                Err(PreprocessingError::UnknownColumn(column.to_string()))
            }
            (Some(encoder), cell) => {
                let label = match cell {
                    FeatureValue::Categorical(s) => s.clone(),
                    FeatureValue::Numeric(v) => v.to_string(),
                };
                encoder.encode_label(&label).map_err(|err| match err {
                    PreprocessingError::UnknownCategory { value, .. } => {
                        PreprocessingError::UnknownCategory {
                            column: Some(column.to_string()),
                            value,
                        }
                    }
                    other => other,
                })
            }
        }
    }
}

impl FittedTransformer for FittedColumnEncoder {
    type Input = FeatureTable;
    type Output = Array2<f64>;
    type Params = ColumnEncoderParams;

    fn transform(&self, table: &FeatureTable) -> Result<Array2<f64>, PreprocessingError> {
        if table.columns() != self.columns.as_slice() {
            return Err(PreprocessingError::FeatureMismatch {
                expected_features: self.columns.len(),
                got_features: table.n_columns(),
            });
        }

        let mut out = Array2::zeros((table.n_rows(), self.columns.len()));
        for (r, row) in table.rows().iter().enumerate() {
            for (c, (column, cell)) in self.columns.iter().zip(row).enumerate() {
                out[[r, c]] = self.encode_cell(column, cell)?;
            }
        }
        Ok(out)
    }

    fn extract_params(&self) -> ColumnEncoderParams {
        ColumnEncoderParams {
            columns: self.columns.clone(),
            encoders: self
                .encoders
                .iter()
                .map(|(name, enc)| (name.clone(), enc.extract_params()))
                .collect(),
        }
    }

    fn from_params(params: ColumnEncoderParams) -> Result<Self, PreprocessingError> {
        let mut encoders = BTreeMap::new();
        for (name, enc) in params.encoders {
            if !params.columns.contains(&name) {
                return Err(PreprocessingError::UnknownColumn(name));
            }
            encoders.insert(name, FittedLabelEncoder::from_params(enc)?);
        }
        Ok(Self {
            columns: params.columns,
            encoders,
        })
    }

    fn n_features_in(&self) -> usize {
        self.columns.len()
    }
}
