//! Error types for preprocessing operations.

use thiserror::Error;

/// Error type for preprocessing operations.
#[derive(Debug, Error)]
pub enum PreprocessingError {
    /// Numerical computation error (overflow, NaN in input, etc.).
    #[error("Numerical error: {0}")]
    NumericalError(String),
    /// A categorical value was not seen during fit (strict encoding only).
    #[error(
        "Unknown category {value:?}{}",
        .column.as_ref().map(|c| format!(" for column {c}")).unwrap_or_default()
    )]
    UnknownCategory {
        column: Option<String>,
        value: String,
    },
    /// No encoder was fitted for the requested column.
    #[error("No encoder fitted for column {0}")]
    UnknownColumn(String),
    /// Invalid hyperparameter value.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// Empty data provided where non-empty was required.
    #[error("Empty data: {0}")]
    EmptyData(String),
    /// Feature dimension mismatch.
    #[error("Feature mismatch: expected {expected_features} features, got {got_features}")]
    FeatureMismatch {
        expected_features: usize,
        got_features: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_numerical_error() {
        let err = PreprocessingError::NumericalError("NaN in column 3".to_string());
        assert!(err.to_string().contains("Numerical error"));
    }

    #[test]
    fn test_error_display_unknown_category() {
        let err = PreprocessingError::UnknownCategory {
            column: Some("department".to_string()),
            value: "2A".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("department"));
        assert!(msg.contains("2A"));
    }

    #[test]
    fn test_error_display_empty_data() {
        let err = PreprocessingError::EmptyData("no rows".to_string());
        assert!(err.to_string().contains("Empty data"));
    }

    #[test]
    fn test_error_display_feature_mismatch() {
        let err = PreprocessingError::FeatureMismatch {
            expected_features: 14,
            got_features: 3,
        };
        assert!(err.to_string().contains("expected 14 features, got 3"));
    }

    #[test]
    fn test_error_is_std_error() {
        let err = PreprocessingError::InvalidParameter("test".to_string());
        let _: &dyn std::error::Error = &err;
    }
}
