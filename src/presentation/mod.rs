//! Form validation and the figures shown alongside an estimate.

use crate::correction::PriceCorrector;
use crate::dataset::PropertyType;
use crate::error::{EstimatorError, Result};
use crate::features::EstimateQuery;
use crate::inference::Estimator;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Sales from this year on count as recent.
pub const RECENT_FROM_YEAR: i32 = 2023;
/// Half-width of the displayed price band, as a share of the price.
pub const PRICE_BAND: f64 = 0.20;
/// Largest share of the total price attributed to the plot.
pub const MAX_PLOT_SHARE: f64 = 0.3;

const MIN_SURFACE: f64 = 8.0;
const MAX_SURFACE: f64 = 1000.0;

/// What a user typed into the estimate form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormInput {
    pub postal_code: String,
    pub surface: f64,
    pub rooms: u32,
    pub plot: f64,
    pub property_type: PropertyType,
    /// Year of the sale being estimated.
    pub year: i32,
}

/// A problem with a [`FormInput`]. Errors block the estimate, hints do not.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationIssue {
    InvalidPostalCode,
    SurfaceTooSmall,
    SurfaceTooLarge,
    SurfaceExceedsPlot,
    FewRoomsForHouse,
    SmallHouse,
}

impl ValidationIssue {
    pub fn is_error(self) -> bool {
        !matches!(
            self,
            ValidationIssue::FewRoomsForHouse | ValidationIssue::SmallHouse
        )
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValidationIssue::InvalidPostalCode => "postal code must be exactly 5 digits",
            ValidationIssue::SurfaceTooSmall => "surface looks too small (minimum 8 m²)",
            ValidationIssue::SurfaceTooLarge => "surface looks very large (over 1000 m²)",
            ValidationIssue::SurfaceExceedsPlot => "living surface cannot exceed the plot",
            ValidationIssue::FewRoomsForHouse => "a house usually has at least 3 rooms",
            ValidationIssue::SmallHouse => "surface looks small for a house",
        })
    }
}

/// Check a form. An empty result means it can be estimated as is.
pub fn validate_form(form: &FormInput) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let code = &form.postal_code;
    if code.len() != 5 || !code.bytes().all(|b| b.is_ascii_digit()) {
        issues.push(ValidationIssue::InvalidPostalCode);
    }

    if form.surface < MIN_SURFACE {
        issues.push(ValidationIssue::SurfaceTooSmall);
    } else if form.surface > MAX_SURFACE {
        issues.push(ValidationIssue::SurfaceTooLarge);
    }

    let plot_bound = !matches!(
        form.property_type,
        PropertyType::Apartment | PropertyType::Commercial
    );
    if plot_bound && form.plot >= 0.0 && form.surface > form.plot {
        issues.push(ValidationIssue::SurfaceExceedsPlot);
    }

    if form.property_type == PropertyType::House {
        if form.rooms < 3 {
            issues.push(ValidationIssue::FewRoomsForHouse);
        }
        if form.surface < 50.0 {
            issues.push(ValidationIssue::SmallHouse);
        }
    }
    issues
}

/// Broad market area a department belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketZone {
    Paris,
    InnerRing,
    OuterRing,
    Province,
}

impl MarketZone {
    pub fn of_department(department: &str) -> Self {
        match department {
            "75" => MarketZone::Paris,
            "92" | "93" | "94" => MarketZone::InnerRing,
            "77" | "78" | "91" | "95" => MarketZone::OuterRing,
            _ => MarketZone::Province,
        }
    }

    /// Usual price per m² range and mean.
    pub fn bounds(self) -> (f64, f64, f64) {
        match self {
            MarketZone::Paris => (7000.0, 13000.0, 9200.0),
            MarketZone::InnerRing => (3500.0, 7000.0, 5000.0),
            MarketZone::OuterRing => (2500.0, 4500.0, 3200.0),
            MarketZone::Province => (2000.0, 5000.0, 3000.0),
        }
    }
}

/// How a price per m² compares with its zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceVerdict {
    VeryHigh,
    Premium,
    VeryLow,
    GoodPrice,
    Normal,
}

impl fmt::Display for PriceVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PriceVerdict::VeryHigh => "very high",
            PriceVerdict::Premium => "premium",
            PriceVerdict::VeryLow => "very low",
            PriceVerdict::GoodPrice => "good price",
            PriceVerdict::Normal => "normal",
        })
    }
}

/// Zone, its reference figures and the verdict for one price per m².
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZoneAssessment {
    pub zone: MarketZone,
    pub low: f64,
    pub high: f64,
    pub reference: f64,
    pub verdict: PriceVerdict,
}

impl ZoneAssessment {
    pub fn assess(department: &str, price_per_m2: f64) -> Self {
        let zone = MarketZone::of_department(department);
        let (low, high, reference) = zone.bounds();
        let verdict = if price_per_m2 > high {
            PriceVerdict::VeryHigh
        } else if price_per_m2 > reference * 1.2 {
            PriceVerdict::Premium
        } else if price_per_m2 < low {
            PriceVerdict::VeryLow
        } else if price_per_m2 < reference * 0.8 {
            PriceVerdict::GoodPrice
        } else {
            PriceVerdict::Normal
        };
        Self {
            zone,
            low,
            high,
            reference,
            verdict,
        }
    }
}

/// Part of the price attributed to the plot.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlotValue {
    pub share: f64,
    pub value: f64,
    pub per_m2: f64,
}

impl PlotValue {
    /// `None` without a plot.
    pub fn estimate(price: f64, surface: f64, plot: f64) -> Option<Self> {
        if plot <= 0.0 {
            return None;
        }
        let share = MAX_PLOT_SHARE.min(plot / (4.0 * surface));
        let value = price * share;
        Some(Self {
            share,
            value,
            per_m2: value / plot,
        })
    }
}

/// Display name of a postal code: "Paris 1er", "Paris 16e", "Département 69".
///
/// Paris districts are read from the last two digits, so 75016 and 75116 both
/// name the 16th.
pub fn location_label(postal_code: &str) -> String {
    if postal_code.len() != 5 || !postal_code.is_ascii() {
        return "Paris".to_string();
    }
    if postal_code.starts_with("75") {
        let number = postal_code[3..].trim_start_matches('0');
        return match number {
            "" => "Paris".to_string(),
            "1" => "Paris 1er".to_string(),
            n => format!("Paris {n}e"),
        };
    }
    format!("Département {}", &postal_code[..2])
}

/// Price per m² above which a figure is flagged as unusually high.
pub fn high_price_threshold(department: &str) -> f64 {
    if department == "75" {
        12_000.0
    } else {
        8_000.0
    }
}

/// An estimate with everything shown next to it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EstimateReport {
    pub location: String,
    pub property_type: PropertyType,
    pub surface: f64,
    /// Price returned by the estimator.
    pub model_price: f64,
    /// Price after the presentation correction.
    pub price: f64,
    pub low: f64,
    pub high: f64,
    pub price_per_m2: f64,
    pub zone: ZoneAssessment,
    pub plot: Option<PlotValue>,
    /// Set when the price per m² is above the zone's alert threshold.
    pub high_price_warning: bool,
    /// `price / model_price`.
    pub correction_factor: f64,
    /// Non-blocking remarks on the form.
    pub hints: Vec<String>,
}

impl EstimateReport {
    /// Validate `form`, estimate it and apply the presentation correction.
    pub fn build(estimator: &Estimator, form: &FormInput) -> Result<Self> {
        Self::build_with(estimator, &PriceCorrector::presentation(), form)
    }

    pub fn build_with(
        estimator: &Estimator,
        corrector: &PriceCorrector,
        form: &FormInput,
    ) -> Result<Self> {
        let issues = validate_form(form);
        let errors: Vec<String> = issues
            .iter()
            .filter(|issue| issue.is_error())
            .map(ToString::to_string)
            .collect();
        if !errors.is_empty() {
            return Err(EstimatorError::InvalidInput(errors.join("; ")));
        }

        let department = &form.postal_code[..2];
        let query = EstimateQuery::new(form.surface, form.rooms, department)
            .with_plot(form.plot)
            .with_property_type(form.property_type)
            .with_recent(form.year >= RECENT_FROM_YEAR);
        let model_price = estimator.estimate(&query)?;

        let price = corrector.correct_price(
            model_price,
            form.surface,
            &form.postal_code,
            form.property_type,
            form.plot,
        );
        let price_per_m2 = price / form.surface;
        debug!(model_price, price, price_per_m2, "report built");

        Ok(Self {
            location: location_label(&form.postal_code),
            property_type: form.property_type,
            surface: form.surface,
            model_price,
            price,
            low: price * (1.0 - PRICE_BAND),
            high: price * (1.0 + PRICE_BAND),
            price_per_m2,
            zone: ZoneAssessment::assess(department, price_per_m2),
            plot: PlotValue::estimate(price, form.surface, form.plot),
            high_price_warning: price_per_m2 > high_price_threshold(department),
            correction_factor: price / model_price,
            hints: issues
                .iter()
                .filter(|issue| !issue.is_error())
                .map(ToString::to_string)
                .collect(),
        })
    }
}

/// `1234567.8` as `1 234 568`.
pub fn format_amount(amount: f64) -> String {
    let rounded = amount.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(' ');
        }
        out.push(ch);
    }
    out
}

impl fmt::Display for EstimateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} - {} of {} m²",
            self.location,
            self.property_type.dvf_label(),
            self.surface
        )?;
        writeln!(f, "Estimated price: {} €", format_amount(self.price))?;
        writeln!(
            f,
            "Range: {}K - {}K €",
            format_amount(self.low / 1000.0),
            format_amount(self.high / 1000.0)
        )?;
        writeln!(
            f,
            "Price per m²: {} €/m² ({}, zone reference {} €/m²)",
            format_amount(self.price_per_m2),
            self.zone.verdict,
            format_amount(self.zone.reference)
        )?;
        if let Some(plot) = &self.plot {
            writeln!(f, "Plot: {} €/m²", format_amount(plot.per_m2))?;
        }
        if self.high_price_warning {
            writeln!(f, "Warning: high price for this area")?;
        }
        for hint in &self.hints {
            writeln!(f, "Note: {hint}")?;
        }
        write!(f, "Market correction: x{:.2}", self.correction_factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(code: &str, surface: f64, rooms: u32, plot: f64, kind: PropertyType) -> FormInput {
        FormInput {
            postal_code: code.to_string(),
            surface,
            rooms,
            plot,
            property_type: kind,
            year: 2024,
        }
    }

    #[test]
    fn test_valid_apartment_has_no_issues() {
        assert!(validate_form(&form("75011", 60.0, 3, 0.0, PropertyType::Apartment)).is_empty());
    }

    #[test]
    fn test_postal_code_rules() {
        for code in ["7501", "750111", "75O11", ""] {
            let issues = validate_form(&form(code, 60.0, 3, 0.0, PropertyType::Apartment));
            assert_eq!(issues, vec![ValidationIssue::InvalidPostalCode], "{code}");
        }
    }

    #[test]
    fn test_surface_rules() {
        let small = validate_form(&form("69003", 7.5, 1, 0.0, PropertyType::Apartment));
        assert_eq!(small, vec![ValidationIssue::SurfaceTooSmall]);
        let large = validate_form(&form("69003", 1200.0, 9, 0.0, PropertyType::Apartment));
        assert_eq!(large, vec![ValidationIssue::SurfaceTooLarge]);
        assert!(validate_form(&form("69003", 8.0, 1, 0.0, PropertyType::Apartment)).is_empty());
    }

    #[test]
    fn test_surface_exceeding_plot() {
        let house = validate_form(&form("33000", 120.0, 4, 100.0, PropertyType::House));
        assert_eq!(house, vec![ValidationIssue::SurfaceExceedsPlot]);
        let commercial = validate_form(&form("33000", 120.0, 4, 100.0, PropertyType::Commercial));
        assert!(commercial.is_empty());
    }

    #[test]
    fn test_house_hints_do_not_block() {
        let issues = validate_form(&form("33000", 45.0, 2, 300.0, PropertyType::House));
        assert_eq!(
            issues,
            vec![ValidationIssue::FewRoomsForHouse, ValidationIssue::SmallHouse]
        );
        assert!(issues.iter().all(|issue| !issue.is_error()));
    }

    #[test]
    fn test_location_labels() {
        assert_eq!(location_label("75001"), "Paris 1er");
        assert_eq!(location_label("75016"), "Paris 16e");
        assert_eq!(location_label("75000"), "Paris");
        assert_eq!(location_label("69003"), "Département 69");
        assert_eq!(location_label("123"), "Paris");
    }

    #[test]
    fn test_location_label_reads_arrondissement_from_last_two_digits() {
        // 75116 is the second code of the 16th; digits 3..5 carry the district
        assert_eq!(location_label("75116"), "Paris 16e");
        assert_eq!(location_label("75108"), "Paris 8e");
        assert_ne!(location_label("75116"), "Paris 11e");
    }

    #[test]
    fn test_zone_verdicts() {
        assert_eq!(ZoneAssessment::assess("75", 14000.0).verdict, PriceVerdict::VeryHigh);
        assert_eq!(ZoneAssessment::assess("75", 11500.0).verdict, PriceVerdict::Premium);
        assert_eq!(ZoneAssessment::assess("75", 9000.0).verdict, PriceVerdict::Normal);
        assert_eq!(ZoneAssessment::assess("75", 6000.0).verdict, PriceVerdict::VeryLow);
        assert_eq!(ZoneAssessment::assess("92", 3800.0).verdict, PriceVerdict::GoodPrice);
        assert_eq!(ZoneAssessment::assess("78", 3200.0).zone, MarketZone::OuterRing);
        assert_eq!(ZoneAssessment::assess("23", 3000.0).zone, MarketZone::Province);
    }

    #[test]
    fn test_plot_value_share_is_capped() {
        assert_eq!(PlotValue::estimate(300_000.0, 100.0, 0.0), None);
        let small = PlotValue::estimate(300_000.0, 100.0, 80.0).unwrap();
        assert!((small.share - 0.2).abs() < 1e-12);
        assert!((small.per_m2 - 750.0).abs() < 1e-9);
        let large = PlotValue::estimate(300_000.0, 100.0, 2000.0).unwrap();
        assert_eq!(large.share, MAX_PLOT_SHARE);
    }

    #[test]
    fn test_high_price_thresholds() {
        assert_eq!(high_price_threshold("75"), 12_000.0);
        assert_eq!(high_price_threshold("13"), 8_000.0);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1_234_567.8), "1 234 568");
        assert_eq!(format_amount(950.0), "950");
        assert_eq!(format_amount(-12_000.0), "-12 000");
    }
}
