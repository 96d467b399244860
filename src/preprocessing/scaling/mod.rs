//! Feature scaling transformers.

mod robust;

pub use robust::{FittedRobustScaler, RobustScaler, RobustScalerConfig, RobustScalerParams};
