//! Label encoding for string categories.
//!
//! Maps category labels to integer indices (0, 1, 2, ...) in lexicographic order.

use crate::preprocessing::error::PreprocessingError;
use crate::preprocessing::traits::{FittedTransformer, Transformer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Code assigned to categories not seen during fit.
pub const SENTINEL_CODE: f64 = 0.0;

/// Strategy for handling unknown categories during transform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleUnknown {
    /// Map unknown categories to [`SENTINEL_CODE`].
    #[default]
    Sentinel,
    /// Raise an error when unknown categories are encountered.
    Error,
}

/// Label encoder for a single categorical column.
///
/// Classes are the distinct training values sorted lexicographically, so the
/// code of a label is stable for a given training set.
///
/// # Example
/// ```ignore
/// use immoprix::preprocessing::{LabelEncoder, Transformer, FittedTransformer};
///
/// let labels = vec!["92".to_string(), "75".to_string(), "other".to_string()];
/// let fitted = LabelEncoder::new().fit(&labels)?;
///
/// // "75" -> 0, "92" -> 1, "other" -> 2
/// let encoded = fitted.transform(&labels)?;
///
/// // never seen: falls back to 0
/// assert_eq!(fitted.encode_or_sentinel("2A"), 0.0);
/// ```
#[derive(Clone, Debug, Default)]
pub struct LabelEncoder {
    handle_unknown: HandleUnknown,
}

impl LabelEncoder {
    /// Create a new LabelEncoder that maps unknown labels to the sentinel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the unknown-category strategy used by `transform`.
    pub fn with_handle_unknown(mut self, handle_unknown: HandleUnknown) -> Self {
        self.handle_unknown = handle_unknown;
        self
    }
}

impl Transformer for LabelEncoder {
    type Input = [String];
    type Output = Vec<f64>;
    type Params = LabelEncoderParams;
    type Fitted = FittedLabelEncoder;

    fn fit(&self, labels: &[String]) -> Result<FittedLabelEncoder, PreprocessingError> {
        if labels.is_empty() {
            return Err(PreprocessingError::EmptyData(
                "Cannot fit LabelEncoder on empty data".to_string(),
            ));
        }

        let classes: BTreeSet<&String> = labels.iter().collect();
        let classes_: Vec<String> = classes.into_iter().cloned().collect();

        Ok(FittedLabelEncoder::build(classes_, self.handle_unknown))
    }
}

/// Serializable parameters for a fitted LabelEncoder.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LabelEncoderParams {
    /// Unique classes in sorted order.
    pub classes_: Vec<String>,
    pub handle_unknown: HandleUnknown,
}

/// Fitted LabelEncoder ready for inference.
#[derive(Clone, Debug)]
pub struct FittedLabelEncoder {
    classes_: Vec<String>,
    class_to_idx: HashMap<String, usize>,
    handle_unknown: HandleUnknown,
}

impl FittedLabelEncoder {
    fn build(classes_: Vec<String>, handle_unknown: HandleUnknown) -> Self {
        let class_to_idx = classes_
            .iter()
            .enumerate()
            .map(|(idx, class)| (class.clone(), idx))
            .collect();
        Self {
            classes_,
            class_to_idx,
            handle_unknown,
        }
    }

    /// Get the unique classes.
    pub fn classes(&self) -> &[String] {
        &self.classes_
    }

    /// Get the number of classes.
    pub fn n_classes(&self) -> usize {
        self.classes_.len()
    }

    /// Whether `label` was seen during fit.
    pub fn contains(&self, label: &str) -> bool {
        self.class_to_idx.contains_key(label)
    }

    /// Encode a single label, reporting labels not seen during fit.
    pub fn encode(&self, label: &str) -> Result<f64, PreprocessingError> {
        self.class_to_idx
            .get(label)
            .map(|&idx| idx as f64)
            .ok_or_else(|| PreprocessingError::UnknownCategory {
                column: None,
                value: label.to_string(),
            })
    }

    /// Encode a single label; unseen labels get [`SENTINEL_CODE`].
    pub fn encode_or_sentinel(&self, label: &str) -> f64 {
        match self.class_to_idx.get(label) {
            Some(&idx) => idx as f64,
            None => SENTINEL_CODE,
        }
    }

    /// Encode a single label following the configured unknown-category strategy.
    pub fn encode_label(&self, label: &str) -> Result<f64, PreprocessingError> {
        match self.handle_unknown {
            HandleUnknown::Sentinel => Ok(self.encode_or_sentinel(label)),
            HandleUnknown::Error => self.encode(label),
        }
    }

    /// Map an encoded index back to its label.
    pub fn decode(&self, code: f64) -> Result<&str, PreprocessingError> {
        let idx = code.round();
        if idx < 0.0 || idx as usize >= self.classes_.len() {
            return Err(PreprocessingError::InvalidParameter(format!(
                "Index {} out of bounds for {} classes",
                idx,
                self.classes_.len()
            )));
        }
        Ok(&self.classes_[idx as usize])
    }
}

impl FittedTransformer for FittedLabelEncoder {
    type Input = [String];
    type Output = Vec<f64>;
    type Params = LabelEncoderParams;

    fn transform(&self, labels: &[String]) -> Result<Vec<f64>, PreprocessingError> {
        labels.iter().map(|label| self.encode_label(label)).collect()
    }

    fn extract_params(&self) -> LabelEncoderParams {
        LabelEncoderParams {
            classes_: self.classes_.clone(),
            handle_unknown: self.handle_unknown,
        }
    }

    fn from_params(params: LabelEncoderParams) -> Result<Self, PreprocessingError> {
        if params.classes_.is_empty() {
            return Err(PreprocessingError::EmptyData(
                "LabelEncoder params have no classes".to_string(),
            ));
        }
        if params.classes_.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PreprocessingError::InvalidParameter(
                "LabelEncoder classes must be sorted and unique".to_string(),
            ));
        }
        Ok(Self::build(params.classes_, params.handle_unknown))
    }

    fn n_features_in(&self) -> usize {
        1
    }
}
