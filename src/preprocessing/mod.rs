//! Data preprocessing transformers.
//!
//! Transformers follow a type-state pattern: an unfitted [`Transformer`] holds
//! hyperparameters and learns from training data; the [`FittedTransformer`] it
//! returns is immutable, serializable, and reused verbatim at inference.
//!
//! # Available Transformers
//!
//! - [`ColumnEncoder`]: one [`LabelEncoder`] per categorical column, numeric
//!   columns passed through.
//! - [`RobustScaler`]: median centering and IQR scaling, robust to outliers.
//!
//! # Example
//!
//! ```ignore
//! use immoprix::preprocessing::{ColumnEncoder, RobustScaler, Transformer, FittedTransformer};
//!
//! let encoder = ColumnEncoder::new().fit(&train_table)?;
//! let encoded = encoder.transform(&train_table)?;
//! let scaler = RobustScaler::new().fit(&encoded)?;
//!
//! scaler.save_to_file("scaler.bin")?;
//! ```

pub mod encoding;
pub mod error;
pub mod scaling;
pub mod traits;

pub use encoding::{
    ColumnEncoder, ColumnEncoderParams, FittedColumnEncoder, FittedLabelEncoder, HandleUnknown,
    LabelEncoder, LabelEncoderParams, SENTINEL_CODE,
};
pub use error::PreprocessingError;
pub use scaling::{FittedRobustScaler, RobustScaler, RobustScalerConfig, RobustScalerParams};
pub use traits::{FittedTransformer, Transformer};
