//! Categorical feature encoding.
//!
//! [`LabelEncoder`] maps the string categories of one column to integer codes.
//! [`ColumnEncoder`] fits one label encoder per categorical column of a
//! [`FeatureTable`](crate::features::FeatureTable) and passes numeric columns
//! through, producing the dense matrix the scaler and models consume.

mod columns;
mod label;

pub use columns::{ColumnEncoder, ColumnEncoderParams, FittedColumnEncoder};
pub use label::{FittedLabelEncoder, HandleUnknown, LabelEncoder, LabelEncoderParams, SENTINEL_CODE};
