//! Versioned market price-per-m² references.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Expected price per m² by administrative code, with a default.
///
/// Codes are either five-digit postal codes (Paris districts) or two-character
/// department codes. Lookup tries the exact code, then its department, then
/// the default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketReferenceTable {
    version: String,
    rates: BTreeMap<String, f64>,
    default_rate: f64,
}

/// Which key of the table produced a rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateSource {
    Exact,
    Department,
    Default,
}

impl MarketReferenceTable {
    pub fn new(version: impl Into<String>, default_rate: f64) -> Self {
        Self {
            version: version.into(),
            rates: BTreeMap::new(),
            default_rate,
        }
    }

    pub fn with_rate(mut self, code: impl Into<String>, rate: f64) -> Self {
        self.rates.insert(code.into(), rate);
        self
    }

    fn with_rates(self, rates: &[(&str, f64)]) -> Self {
        rates
            .iter()
            .fold(self, |table, &(code, rate)| table.with_rate(code, rate))
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn default_rate(&self) -> f64 {
        self.default_rate
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Rate for `code` and where it came from.
    pub fn lookup(&self, code: &str) -> (f64, RateSource) {
        let code = code.trim();
        if let Some(&rate) = self.rates.get(code) {
            return (rate, RateSource::Exact);
        }
        if code.chars().count() > 2 {
            if let Some(&rate) = code.get(..2).and_then(|dept| self.rates.get(dept)) {
                return (rate, RateSource::Department);
            }
        }
        (self.default_rate, RateSource::Default)
    }

    /// Price per m² for `code`.
    pub fn rate_for(&self, code: &str) -> f64 {
        self.lookup(code).0
    }

    /// Department-level sanity table used right after model inference.
    pub fn light_v2024() -> Self {
        Self::new("2024-light", 3000.0).with_rates(&[
            ("75", 9200.0),
            ("92", 6500.0),
            ("13", 3500.0),
            ("69", 4200.0),
            ("33", 3800.0),
        ])
    }

    /// Paris districts, Île-de-France and large cities, used for display.
    pub fn detailed_v2024() -> Self {
        Self::new("2024-detailed", 2800.0).with_rates(&[
            ("75001", 12000.0),
            ("75002", 10500.0),
            ("75003", 9800.0),
            ("75004", 11500.0),
            ("75005", 10200.0),
            ("75006", 12500.0),
            ("75007", 12000.0),
            ("75008", 13000.0),
            ("75009", 9200.0),
            ("75010", 8500.0),
            ("75011", 8800.0),
            ("75012", 8000.0),
            ("75013", 7500.0),
            ("75014", 8500.0),
            ("75015", 8800.0),
            ("75016", 11000.0),
            ("75017", 9200.0),
            ("75018", 7500.0),
            ("75019", 7000.0),
            ("75020", 8000.0),
            ("75", 9200.0),
            ("92", 6500.0),
            ("93", 3800.0),
            ("94", 4200.0),
            ("77", 3000.0),
            ("78", 3800.0),
            ("91", 3400.0),
            ("95", 3200.0),
            ("06", 5200.0),
            ("13", 3500.0),
            ("69", 4200.0),
            ("33", 3800.0),
            ("31", 3400.0),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_precedence() {
        let table = MarketReferenceTable::detailed_v2024();
        assert_eq!(table.lookup("75008"), (13000.0, RateSource::Exact));
        assert_eq!(table.lookup("75000"), (9200.0, RateSource::Department));
        assert_eq!(table.lookup("92100"), (6500.0, RateSource::Department));
        assert_eq!(table.lookup("92"), (6500.0, RateSource::Exact));
        assert_eq!(table.lookup("23000"), (2800.0, RateSource::Default));
        assert_eq!(table.lookup("2"), (2800.0, RateSource::Default));
    }

    #[test]
    fn test_light_table() {
        let table = MarketReferenceTable::light_v2024();
        assert_eq!(table.len(), 5);
        assert_eq!(table.rate_for("69"), 4200.0);
        assert_eq!(table.rate_for("93"), 3000.0);
        assert_eq!(table.version(), "2024-light");
    }

    #[test]
    fn test_detailed_table_covers_all_paris_districts() {
        let table = MarketReferenceTable::detailed_v2024();
        for district in 1..=20 {
            let code = format!("750{district:02}");
            assert_eq!(table.lookup(&code).1, RateSource::Exact, "{code}");
        }
    }
}
