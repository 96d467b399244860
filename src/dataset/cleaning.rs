//! Row cleaning, postal-code repair and department bucketing.

use super::columns;
use super::ingest::{ChunkedReader, IngestConfig, RawRecord, RawTable};
use super::{PropertyType, TransactionRecord};
use crate::error::{EstimatorError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::io::{Read, Write};
use tracing::{info, warn};

/// Department bucket for rare departments and missing postal codes.
pub const OTHER_DEPARTMENT: &str = "other";

/// Sane bounds applied to training rows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    pub min_price: f64,
    pub max_price: f64,
    pub min_surface: f64,
    pub max_surface: f64,
    pub min_rooms: u32,
    pub max_rooms: u32,
    /// Departments observed fewer times than this fall into [`OTHER_DEPARTMENT`].
    pub min_department_count: usize,
    /// Number of most frequent postal codes listed in a [`CleaningReport`].
    pub top_codes: usize,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            min_price: 12_000.0,
            max_price: 4_000_000.0,
            min_surface: 10.0,
            max_surface: 800.0,
            min_rooms: 1,
            max_rooms: 15,
            min_department_count: 100,
            top_codes: 10,
        }
    }
}

impl CleaningConfig {
    pub fn with_price_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_price = min;
        self.max_price = max;
        self
    }

    pub fn with_surface_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_surface = min;
        self.max_surface = max;
        self
    }

    pub fn with_room_bounds(mut self, min: u32, max: u32) -> Self {
        self.min_rooms = min;
        self.max_rooms = max;
        self
    }

    pub fn with_min_department_count(mut self, count: usize) -> Self {
        self.min_department_count = count;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let ordered = self.min_price <= self.max_price
            && self.min_surface <= self.max_surface
            && self.min_rooms <= self.max_rooms;
        if !ordered {
            return Err(EstimatorError::Config(
                "cleaning bounds must satisfy min <= max".into(),
            ));
        }
        Ok(())
    }
}

/// Parse a number that may use a comma as decimal separator.
///
/// Unparseable or non-finite input yields `None`.
pub fn parse_locale_decimal(raw: &str) -> Option<f64> {
    let normalized = raw.trim().replace(',', ".");
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a sale date in `dd/mm/yyyy` or `yyyy-mm-dd` form.
pub fn parse_sale_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

/// Repair a postal code token into a five-digit code.
///
/// Non-digit characters are discarded. Fewer than four digits cannot be
/// repaired; otherwise the digits are right-padded with `0` and truncated to five.
///
/// ```
/// use immoprix::dataset::correct_postal_code;
///
/// assert_eq!(correct_postal_code("7500").as_deref(), Some("75000"));
/// assert_eq!(correct_postal_code("75001.0").as_deref(), Some("75001"));
/// assert_eq!(correct_postal_code("750"), None);
/// ```
pub fn correct_postal_code(token: &str) -> Option<String> {
    let digits: String = token.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return None;
    }
    let mut code: String = digits.chars().take(5).collect();
    while code.len() < 5 {
        code.push('0');
    }
    Some(code)
}

fn parse_rooms(raw: &str) -> Option<u32> {
    let value = parse_locale_decimal(raw)?;
    if value.fract() != 0.0 || value < 0.0 || value > u32::MAX as f64 {
        return None;
    }
    Some(value as u32)
}

/// Counts of rows kept and dropped by [`clean_records`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningStats {
    pub rows_read: usize,
    /// Price, surface or room count missing or unparseable.
    pub missing_core: usize,
    pub out_of_bounds: usize,
    pub invalid_date: usize,
    pub kept: usize,
}

impl CleaningStats {
    pub fn dropped(&self) -> usize {
        self.missing_core + self.out_of_bounds + self.invalid_date
    }
}

enum RowOutcome {
    Kept(TransactionRecord),
    MissingCore,
    OutOfBounds,
    InvalidDate,
}

fn clean_row(row: &RawRecord<'_>, config: &CleaningConfig, has_dates: bool) -> RowOutcome {
    let price = row.get(columns::PRICE).and_then(parse_locale_decimal);
    let surface = row.get(columns::SURFACE).and_then(parse_locale_decimal);
    let rooms = row.get(columns::ROOMS).and_then(parse_rooms);

    let (price, surface, rooms) = match (price, surface, rooms) {
        (Some(p), Some(s), Some(r)) => (p, s, r),
        _ => return RowOutcome::MissingCore,
    };

    let in_bounds = (config.min_price..=config.max_price).contains(&price)
        && (config.min_surface..=config.max_surface).contains(&surface)
        && (config.min_rooms..=config.max_rooms).contains(&rooms);
    if !in_bounds {
        return RowOutcome::OutOfBounds;
    }

    let sale_date = if has_dates {
        match row.get(columns::SALE_DATE).and_then(parse_sale_date) {
            Some(date) => Some(date),
            None => return RowOutcome::InvalidDate,
        }
    } else {
        None
    };

    let postal_code = row
        .get(columns::CORRECTED_POSTAL_CODE)
        .and_then(correct_postal_code)
        .or_else(|| row.get(columns::POSTAL_CODE).and_then(correct_postal_code));

    RowOutcome::Kept(TransactionRecord {
        price,
        surface,
        rooms,
        plot: row.get(columns::PLOT).and_then(parse_locale_decimal),
        property_type: row.get(columns::PROPERTY_TYPE).and_then(PropertyType::from_dvf),
        postal_code,
        sale_date,
    })
}

/// Keep rows with a price, surface and room count inside the configured bounds.
///
/// When the source has a `Date mutation` column, rows whose date does not parse
/// are dropped too. Drops are counted, never reported as errors.
pub fn clean_records(
    table: &RawTable,
    config: &CleaningConfig,
) -> (Vec<TransactionRecord>, CleaningStats) {
    let has_dates = table.headers().contains(columns::SALE_DATE);
    let mut stats = CleaningStats {
        rows_read: table.len(),
        ..Default::default()
    };
    let mut records = Vec::with_capacity(table.len());

    for row in table.rows() {
        match clean_row(&row, config, has_dates) {
            RowOutcome::Kept(record) => records.push(record),
            RowOutcome::MissingCore => stats.missing_core += 1,
            RowOutcome::OutOfBounds => stats.out_of_bounds += 1,
            RowOutcome::InvalidDate => stats.invalid_date += 1,
        }
    }
    stats.kept = records.len();

    if !has_dates {
        warn!("no sale date column; using default year and season");
    }
    if stats.dropped() > 0 {
        warn!(
            missing_core = stats.missing_core,
            out_of_bounds = stats.out_of_bounds,
            invalid_date = stats.invalid_date,
            "dropped rows during cleaning"
        );
    }
    info!(rows_read = stats.rows_read, kept = stats.kept, "cleaning done");
    (records, stats)
}

/// Departments frequent enough to keep their own category.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentBuckets {
    frequent: BTreeSet<String>,
}

impl DepartmentBuckets {
    /// Count departments over `records` and keep those seen at least `min_count` times.
    pub fn fit(records: &[TransactionRecord], min_count: usize) -> Self {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for dept in records.iter().filter_map(TransactionRecord::department) {
            *counts.entry(dept).or_default() += 1;
        }
        let frequent: BTreeSet<String> = counts
            .into_iter()
            .filter(|&(_, n)| n >= min_count)
            .map(|(dept, _)| dept.to_string())
            .collect();
        info!(
            departments = frequent.len(),
            min_count, "department buckets fitted"
        );
        Self { frequent }
    }

    /// Department category for a record.
    pub fn bucket(&self, department: Option<&str>) -> String {
        match department {
            Some(dept) if self.frequent.contains(dept) => dept.to_string(),
            _ => OTHER_DEPARTMENT.to_string(),
        }
    }

    pub fn departments(&self) -> impl Iterator<Item = &str> {
        self.frequent.iter().map(String::as_str)
    }
}

/// Summary of a cleaning pass over a raw export.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub rows_read: usize,
    /// Rows whose postal code could be repaired.
    pub valid_codes: usize,
    pub distinct_codes: usize,
    /// Most frequent corrected codes with their counts, most frequent first.
    pub top_codes: Vec<(String, usize)>,
    /// Rows whose price parsed as a number.
    pub valid_prices: usize,
}

impl CleaningReport {
    pub fn log(&self) {
        info!(
            rows_read = self.rows_read,
            valid_codes = self.valid_codes,
            distinct_codes = self.distinct_codes,
            valid_prices = self.valid_prices,
            "cleaning report"
        );
        for (code, count) in &self.top_codes {
            info!(code = %code, count, "frequent postal code");
        }
    }
}

fn format_price(price: f64) -> String {
    // f64 Display never uses exponent notation
    price.to_string()
}

/// Rewrite a raw export with normalized prices and a corrected postal code column.
///
/// Every source row is kept. The whole input is read chunk by chunk; the sample
/// cap of `ingest` does not apply here.
pub fn write_cleaned<R: Read, W: Write>(
    source: R,
    sink: W,
    ingest: &IngestConfig,
    top_n: usize,
) -> Result<CleaningReport> {
    let read_config = ingest.clone().with_sample_cap(usize::MAX);
    let mut reader = ChunkedReader::new(source, &read_config)?;
    let headers = reader.headers().clone();
    let price_pos = headers.position(columns::PRICE);
    let code_pos = headers.position(columns::POSTAL_CODE);

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b',')
        .flexible(true)
        .from_writer(sink);
    let mut header_row: Vec<&str> = headers.names().iter().map(String::as_str).collect();
    header_row.push(columns::CORRECTED_POSTAL_CODE);
    writer.write_record(&header_row)?;

    let mut report = CleaningReport::default();
    let mut code_counts: HashMap<String, usize> = HashMap::new();

    for chunk in reader.by_ref() {
        for record in chunk? {
            report.rows_read += 1;
            let mut out: Vec<String> = (0..headers.len())
                .map(|i| record.get(i).unwrap_or("").to_string())
                .collect();

            if let Some(pos) = price_pos {
                out[pos] = match record.get(pos).and_then(parse_locale_decimal) {
                    Some(price) => {
                        report.valid_prices += 1;
                        format_price(price)
                    }
                    None => String::new(),
                };
            }

            let corrected = code_pos
                .and_then(|pos| record.get(pos))
                .and_then(correct_postal_code);
            if let Some(code) = &corrected {
                report.valid_codes += 1;
                *code_counts.entry(code.clone()).or_default() += 1;
            }
            out.push(corrected.unwrap_or_default());
            writer.write_record(&out)?;
        }
    }
    writer.flush()?;

    report.distinct_codes = code_counts.len();
    let mut ranked: Vec<(String, usize)> = code_counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(top_n);
    report.top_codes = ranked;

    report.log();
    Ok(report)
}
