//! Transaction records: reading raw DVF exports, cleaning them, and holding
//! the resulting training matrices in memory.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod cleaning;
pub mod ingest;
pub mod memory;

pub use self::cleaning::{
    clean_records, correct_postal_code, parse_locale_decimal, parse_sale_date, write_cleaned,
    CleaningConfig, CleaningReport, CleaningStats, DepartmentBuckets, OTHER_DEPARTMENT,
};
pub use self::ingest::{ChunkedReader, Headers, IngestConfig, RawRecord, RawTable};
pub use self::memory::InMemoryDataset;

/// DVF column names.
pub mod columns {
    pub const PRICE: &str = "Valeur fonciere";
    pub const SURFACE: &str = "Surface reelle bati";
    pub const ROOMS: &str = "Nombre pieces principales";
    pub const PLOT: &str = "Surface terrain";
    pub const PROPERTY_TYPE: &str = "Type local";
    pub const POSTAL_CODE: &str = "Code postal";
    pub const SALE_DATE: &str = "Date mutation";
    /// Added by the cleaning pass.
    pub const CORRECTED_POSTAL_CODE: &str = "Code postal corrigé";
}

/// Kind of property sold, as recorded in the `Type local` column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    #[default]
    Apartment,
    House,
    Commercial,
    Outbuilding,
}

impl PropertyType {
    pub const ALL: [PropertyType; 4] = [
        PropertyType::Apartment,
        PropertyType::House,
        PropertyType::Commercial,
        PropertyType::Outbuilding,
    ];

    /// Label used in DVF exports. This is also the categorical value the
    /// model is trained on.
    pub fn dvf_label(self) -> &'static str {
        match self {
            PropertyType::Apartment => "Appartement",
            PropertyType::House => "Maison",
            PropertyType::Commercial => "Local industriel. commercial ou assimilé",
            PropertyType::Outbuilding => "Dépendance",
        }
    }

    /// Parse a DVF `Type local` cell.
    pub fn from_dvf(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|t| t.dvf_label() == label)
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dvf_label())
    }
}

impl FromStr for PropertyType {
    type Err = String;

    /// Accepts DVF labels and short English or French names, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(t) = Self::from_dvf(s) {
            return Ok(t);
        }
        match s.trim().to_lowercase().as_str() {
            "apartment" | "appartement" | "flat" => Ok(PropertyType::Apartment),
            "house" | "maison" => Ok(PropertyType::House),
            "commercial" | "local" => Ok(PropertyType::Commercial),
            "outbuilding" | "dependance" | "dépendance" => Ok(PropertyType::Outbuilding),
            other => Err(format!("unknown property type: {other}")),
        }
    }
}

/// One sale that passed cleaning.
///
/// Price, surface and rooms are always present and within the configured bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub price: f64,
    pub surface: f64,
    pub rooms: u32,
    pub plot: Option<f64>,
    pub property_type: Option<PropertyType>,
    /// Five-digit corrected postal code.
    pub postal_code: Option<String>,
    pub sale_date: Option<NaiveDate>,
}

impl TransactionRecord {
    /// First two characters of the postal code.
    pub fn department(&self) -> Option<&str> {
        self.postal_code.as_deref().and_then(|code| code.get(..2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_type_dvf_labels_round_trip() {
        for t in PropertyType::ALL {
            assert_eq!(PropertyType::from_dvf(t.dvf_label()), Some(t));
        }
        assert_eq!(PropertyType::from_dvf("Local"), None);
    }

    #[test]
    fn test_property_type_from_str_aliases() {
        assert_eq!("Maison".parse::<PropertyType>(), Ok(PropertyType::House));
        assert_eq!("house".parse::<PropertyType>(), Ok(PropertyType::House));
        assert_eq!("Local".parse::<PropertyType>(), Ok(PropertyType::Commercial));
        assert!("castle".parse::<PropertyType>().is_err());
    }

    #[test]
    fn test_department_from_postal_code() {
        let record = TransactionRecord {
            price: 300_000.0,
            surface: 40.0,
            rooms: 2,
            plot: None,
            property_type: None,
            postal_code: Some("69003".to_string()),
            sale_date: None,
        };
        assert_eq!(record.department(), Some("69"));
    }
}
