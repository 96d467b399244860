//! Post-hoc price correction against market references.
//!
//! A single parametrized [`PriceCorrector`] serves two stages: a light check
//! right after model inference ([`PriceCorrector::inference`]) and a detailed
//! re-estimation before display ([`PriceCorrector::presentation`]).

pub mod corrector;
pub mod reference;

pub use corrector::{
    BlendBand, BlendPolicy, ClampBand, Correction, CorrectionInput, NonPositivePolicy,
    PriceCorrector, Threshold, TypeAdjustments,
};
pub use reference::{MarketReferenceTable, RateSource};
