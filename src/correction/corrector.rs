//! Rule-based price sanity correction against market references.

use super::reference::MarketReferenceTable;
use crate::dataset::PropertyType;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A multiplicative factor applied past a limit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub limit: f64,
    pub factor: f64,
}

/// Reference-price multipliers by property type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeAdjustments {
    pub house: f64,
    /// Houses with surface above the limit.
    pub large_house: Option<Threshold>,
    /// Houses with surface below the limit. Ignored when `large_house` applies.
    pub small_house: Option<Threshold>,
    /// Houses with a plot above the limit.
    pub house_plot: Option<Threshold>,
    /// Any property with a plot above the limit.
    pub plot: Option<Threshold>,
    pub commercial: f64,
    pub outbuilding: f64,
    /// House adjustments only apply to a positive surface.
    pub house_requires_surface: bool,
}

impl TypeAdjustments {
    /// No adjustment for any type.
    pub fn neutral() -> Self {
        Self {
            house: 1.0,
            large_house: None,
            small_house: None,
            house_plot: None,
            plot: None,
            commercial: 1.0,
            outbuilding: 1.0,
            house_requires_surface: false,
        }
    }

    /// Combined factor for a property.
    pub fn factor(&self, property_type: PropertyType, surface: f64, plot: f64) -> f64 {
        let mut factor = match property_type {
            PropertyType::Apartment => 1.0,
            PropertyType::House if self.house_requires_surface && surface <= 0.0 => 1.0,
            PropertyType::House => {
                let mut f = self.house;
                match (self.large_house, self.small_house) {
                    (Some(large), _) if surface > large.limit => f *= large.factor,
                    (_, Some(small)) if surface < small.limit => f *= small.factor,
                    _ => {}
                }
                if let Some(bonus) = self.house_plot.filter(|b| plot > b.limit) {
                    f *= bonus.factor;
                }
                f
            }
            PropertyType::Commercial => self.commercial,
            PropertyType::Outbuilding => self.outbuilding,
        };
        if let Some(bonus) = self.plot.filter(|b| plot > b.limit) {
            factor *= bonus.factor;
        }
        factor
    }
}

/// Ratio band of a [`BlendPolicy`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlendBand {
    /// Upper ratio bound of the band.
    pub max_ratio: f64,
    /// Whether `max_ratio` itself belongs to the band.
    pub inclusive: bool,
    /// Weight of the raw price; the reference gets `1 - model_weight`.
    pub model_weight: f64,
}

impl BlendBand {
    fn admits(&self, ratio: f64) -> bool {
        if self.inclusive {
            ratio <= self.max_ratio
        } else {
            ratio < self.max_ratio
        }
    }
}

/// Ordered ratio bands mapping `raw / reference` to a blend weight.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlendPolicy {
    pub bands: Vec<BlendBand>,
    /// Weight used when no band admits the ratio (e.g. NaN).
    pub fallback_weight: f64,
}

impl BlendPolicy {
    /// Weight of the first band admitting `ratio`.
    pub fn model_weight(&self, ratio: f64) -> f64 {
        self.bands
            .iter()
            .find(|band| band.admits(ratio))
            .map_or(self.fallback_weight, |band| band.model_weight)
    }
}

/// Bounds on the final price, as multiples of the unadjusted reference price.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClampBand {
    pub lower: f64,
    pub upper: f64,
    /// Extra multiplier on the upper bound for houses.
    pub house_upper_widening: f64,
}

/// What to do with a raw price that is zero or negative.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NonPositivePolicy {
    /// Return the adjusted reference price.
    ReturnReference,
    /// Treat it like any other price.
    Blend,
}

/// Inputs of one correction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CorrectionInput<'a> {
    pub raw_price: f64,
    pub surface: f64,
    /// Postal or department code used for the reference lookup.
    pub code: &'a str,
    pub property_type: PropertyType,
    pub plot: f64,
}

/// Result of a correction with its intermediate values.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Correction {
    pub price: f64,
    /// Reference price per m².
    pub rate: f64,
    /// `rate × surface`.
    pub base_price: f64,
    /// Base price after type adjustments.
    pub reference_price: f64,
    /// `raw / reference`, absent when the non-positive policy short-circuited.
    pub ratio: Option<f64>,
    pub model_weight: Option<f64>,
    pub clamped: bool,
}

/// Pulls a model price toward a market reference.
///
/// 1. rate `R` from the reference table, `Pbase = R × S`, `Pref = Pbase × type factor`;
/// 2. `ratio = P / Pref`, blended price `w·P + (1 − w)·Pref` with `w` from the
///    [`BlendPolicy`];
/// 3. optional clamp to `[lower × Pbase, upper × Pbase]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceCorrector {
    pub table: MarketReferenceTable,
    pub adjustments: TypeAdjustments,
    pub blend: BlendPolicy,
    pub clamp: Option<ClampBand>,
    pub non_positive: NonPositivePolicy,
}

impl PriceCorrector {
    /// Detailed re-estimation applied before display.
    pub fn presentation() -> Self {
        Self {
            table: MarketReferenceTable::detailed_v2024(),
            adjustments: TypeAdjustments {
                house: 1.08,
                large_house: Some(Threshold {
                    limit: 150.0,
                    factor: 0.95,
                }),
                small_house: Some(Threshold {
                    limit: 80.0,
                    factor: 1.05,
                }),
                house_plot: Some(Threshold {
                    limit: 200.0,
                    factor: 1.02,
                }),
                plot: None,
                commercial: 0.75,
                outbuilding: 0.60,
                house_requires_surface: true,
            },
            blend: BlendPolicy {
                bands: vec![
                    BlendBand {
                        max_ratio: 0.7,
                        inclusive: false,
                        model_weight: 0.70,
                    },
                    BlendBand {
                        max_ratio: 1.3,
                        inclusive: true,
                        model_weight: 0.85,
                    },
                    BlendBand {
                        max_ratio: 1.8,
                        inclusive: true,
                        model_weight: 0.50,
                    },
                    BlendBand {
                        max_ratio: f64::INFINITY,
                        inclusive: true,
                        model_weight: 0.30,
                    },
                ],
                fallback_weight: 0.70,
            },
            clamp: Some(ClampBand {
                lower: 0.4,
                upper: 1.8,
                house_upper_widening: 1.1,
            }),
            non_positive: NonPositivePolicy::ReturnReference,
        }
    }

    /// Light sanity check applied right after model inference.
    pub fn inference() -> Self {
        Self {
            table: MarketReferenceTable::light_v2024(),
            adjustments: TypeAdjustments {
                house: 1.05,
                plot: Some(Threshold {
                    limit: 200.0,
                    factor: 1.10,
                }),
                ..TypeAdjustments::neutral()
            },
            blend: BlendPolicy {
                bands: vec![
                    BlendBand {
                        max_ratio: 0.5,
                        inclusive: false,
                        model_weight: 0.6,
                    },
                    BlendBand {
                        max_ratio: 2.0,
                        inclusive: true,
                        model_weight: 1.0,
                    },
                    BlendBand {
                        max_ratio: f64::INFINITY,
                        inclusive: true,
                        model_weight: 0.4,
                    },
                ],
                fallback_weight: 1.0,
            },
            clamp: None,
            non_positive: NonPositivePolicy::Blend,
        }
    }

    pub fn correct(&self, input: &CorrectionInput<'_>) -> Correction {
        let rate = self.table.rate_for(input.code);
        let base_price = rate * input.surface;
        let reference_price =
            base_price * self.adjustments.factor(input.property_type, input.surface, input.plot);

        if input.raw_price <= 0.0 && self.non_positive == NonPositivePolicy::ReturnReference {
            return Correction {
                price: reference_price,
                rate,
                base_price,
                reference_price,
                ratio: None,
                model_weight: None,
                clamped: false,
            };
        }

        let ratio = input.raw_price / reference_price;
        let w = self.blend.model_weight(ratio);
        let blended = w * input.raw_price + (1.0 - w) * reference_price;

        let (price, clamped) = match self.clamp {
            Some(band) => {
                let lower = band.lower * base_price;
                let mut upper = band.upper * base_price;
                if input.property_type == PropertyType::House {
                    upper *= band.house_upper_widening;
                }
                let price = blended.min(upper).max(lower);
                (price, price != blended)
            }
            None => (blended, false),
        };

        debug!(
            code = input.code,
            raw = input.raw_price,
            reference = reference_price,
            ratio,
            weight = w,
            price,
            clamped,
            "price corrected"
        );

        Correction {
            price,
            rate,
            base_price,
            reference_price,
            ratio: Some(ratio),
            model_weight: Some(w),
            clamped,
        }
    }

    /// Corrected price only.
    pub fn correct_price(
        &self,
        raw_price: f64,
        surface: f64,
        code: &str,
        property_type: PropertyType,
        plot: f64,
    ) -> f64 {
        self.correct(&CorrectionInput {
            raw_price,
            surface,
            code,
            property_type,
            plot,
        })
        .price
    }
}
