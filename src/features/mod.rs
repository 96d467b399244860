//! Feature construction shared by training and inference.
//!
//! Both paths go through [`FeatureBuilder`], so a training record and an
//! inference query with the same attributes produce the same [`FeatureRow`].

use crate::dataset::{DepartmentBuckets, PropertyType, TransactionRecord};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Feature column names in training order.
pub const FEATURE_COLUMNS: [&str; 14] = [
    "surface",
    "rooms",
    "plot",
    "has_plot",
    "surface_per_room",
    "log_surface",
    "surface_x_rooms",
    "small_unit",
    "large_unit",
    "department",
    "recent",
    "season",
    "year",
    "property_type",
];

/// Columns holding string categories.
pub const CATEGORICAL_COLUMNS: [&str; 3] = ["department", "season", "property_type"];

/// Meteorological season of a sale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    Winter,
    Spring,
    #[default]
    Summer,
    Autumn,
}

impl Season {
    /// Season of a calendar month (1-12). Dec/Jan/Feb is winter.
    pub fn from_month(month: u32) -> Self {
        match month {
            12 | 1 | 2 => Season::Winter,
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            _ => Season::Autumn,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One cell of a feature row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FeatureValue {
    Numeric(f64),
    Categorical(String),
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Numeric(v)
    }
}

impl From<bool> for FeatureValue {
    fn from(v: bool) -> Self {
        FeatureValue::Numeric(if v { 1.0 } else { 0.0 })
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        FeatureValue::Categorical(v.to_string())
    }
}

/// Derived features of one sale or query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub surface: f64,
    pub rooms: f64,
    pub plot: f64,
    pub has_plot: bool,
    pub surface_per_room: f64,
    pub log_surface: f64,
    pub surface_x_rooms: f64,
    pub small_unit: bool,
    pub large_unit: bool,
    pub department: String,
    pub recent: bool,
    pub season: Season,
    pub year: i32,
    pub property_type: PropertyType,
}

impl FeatureRow {
    /// Named cells in [`FEATURE_COLUMNS`] order.
    pub fn named_values(&self) -> Vec<(&'static str, FeatureValue)> {
        vec![
            ("surface", self.surface.into()),
            ("rooms", self.rooms.into()),
            ("plot", self.plot.into()),
            ("has_plot", self.has_plot.into()),
            ("surface_per_room", self.surface_per_room.into()),
            ("log_surface", self.log_surface.into()),
            ("surface_x_rooms", self.surface_x_rooms.into()),
            ("small_unit", self.small_unit.into()),
            ("large_unit", self.large_unit.into()),
            ("department", self.department.as_str().into()),
            ("recent", self.recent.into()),
            ("season", self.season.label().into()),
            ("year", f64::from(self.year).into()),
            ("property_type", self.property_type.dvf_label().into()),
        ]
    }

    /// Cells in [`FEATURE_COLUMNS`] order.
    pub fn values(&self) -> Vec<FeatureValue> {
        self.named_values().into_iter().map(|(_, v)| v).collect()
    }

    /// Cells reordered to `columns`. Unknown row cells are dropped and columns
    /// the row lacks are filled with `0`.
    pub fn align(&self, columns: &[String]) -> (Vec<FeatureValue>, ColumnConcordance) {
        let named = self.named_values();
        let concordance = ColumnConcordance::between(
            named.iter().map(|(name, _)| *name),
            columns.iter().map(String::as_str),
        );
        let mut by_name: HashMap<&str, FeatureValue> = named.into_iter().collect();
        let aligned = columns
            .iter()
            .map(|col| {
                by_name
                    .remove(col.as_str())
                    .unwrap_or(FeatureValue::Numeric(0.0))
            })
            .collect();
        (aligned, concordance)
    }
}

/// Named columns of feature cells, one inner vector per sample.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<Vec<FeatureValue>>,
}

impl FeatureTable {
    /// Rows must have one cell per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<FeatureValue>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self { columns, rows }
    }

    /// Table of feature rows with the [`FEATURE_COLUMNS`] layout.
    pub fn from_rows(rows: &[FeatureRow]) -> Self {
        Self {
            columns: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: rows.iter().map(FeatureRow::values).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<FeatureValue>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cells of column `index`, top to bottom.
    pub fn column(&self, index: usize) -> impl Iterator<Item = &FeatureValue> {
        self.rows.iter().filter_map(move |row| row.get(index))
    }
}

/// How a produced row's columns compare with an expected column list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnConcordance {
    /// Expected columns the row did not produce.
    pub missing: Vec<String>,
    /// Produced columns that are not expected.
    pub extra: Vec<String>,
}

impl ColumnConcordance {
    pub fn between<'p, 'e>(
        produced: impl Iterator<Item = &'p str> + Clone,
        expected: impl Iterator<Item = &'e str> + Clone,
    ) -> Self {
        let missing = expected
            .clone()
            .filter(|e| !produced.clone().any(|p| p == *e))
            .map(str::to_string)
            .collect();
        let extra = produced
            .filter(|p| !expected.clone().any(|e| e == *p))
            .map(str::to_string)
            .collect();
        Self { missing, extra }
    }

    pub fn is_exact(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

/// Attributes of a property to estimate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EstimateQuery {
    pub surface: f64,
    pub rooms: u32,
    /// Department code, or any code whose first two characters name one.
    pub department: String,
    pub plot: f64,
    pub property_type: PropertyType,
    pub recent: bool,
}

impl EstimateQuery {
    pub fn new(surface: f64, rooms: u32, department: impl Into<String>) -> Self {
        Self {
            surface,
            rooms,
            department: department.into(),
            plot: 0.0,
            property_type: PropertyType::Apartment,
            recent: true,
        }
    }

    pub fn with_plot(mut self, plot: f64) -> Self {
        self.plot = plot;
        self
    }

    pub fn with_property_type(mut self, property_type: PropertyType) -> Self {
        self.property_type = property_type;
        self
    }

    pub fn with_recent(mut self, recent: bool) -> Self {
        self.recent = recent;
        self
    }

    /// First two characters of `department`, the key models are trained on.
    pub fn department_code(&self) -> &str {
        let code = self.department.trim();
        match code.char_indices().nth(2) {
            Some((end, _)) => &code[..end],
            None => code,
        }
    }
}

/// Thresholds and defaults of the feature formulas.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Plots strictly larger than this count as `has_plot`.
    pub plot_threshold: f64,
    pub small_unit_below: f64,
    pub large_unit_above: f64,
    /// Sales from this year on are `recent`.
    pub recent_from_year: i32,
    /// Year assumed for training records without a sale date.
    pub undated_year: i32,
    /// Year assumed for inference queries.
    pub query_year: i32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            plot_threshold: 50.0,
            small_unit_below: 40.0,
            large_unit_above: 120.0,
            recent_from_year: 2023,
            undated_year: 2022,
            query_year: 2024,
        }
    }
}

/// Stateless transform from records and queries to [`FeatureRow`]s.
#[derive(Clone, Debug, Default)]
pub struct FeatureBuilder {
    config: FeatureConfig,
}

impl FeatureBuilder {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        &self,
        surface: f64,
        rooms: f64,
        plot: f64,
        department: String,
        recent: bool,
        season: Season,
        year: i32,
        property_type: PropertyType,
    ) -> FeatureRow {
        FeatureRow {
            surface,
            rooms,
            plot,
            has_plot: plot > self.config.plot_threshold,
            surface_per_room: surface / rooms.max(1.0),
            log_surface: surface.ln_1p(),
            surface_x_rooms: surface * rooms,
            small_unit: surface < self.config.small_unit_below,
            large_unit: surface > self.config.large_unit_above,
            department,
            recent,
            season,
            year,
            property_type,
        }
    }

    /// Features of a cleaned training record.
    ///
    /// Undated records get the default year, summer, and are not recent.
    pub fn from_record(
        &self,
        record: &TransactionRecord,
        buckets: &DepartmentBuckets,
    ) -> FeatureRow {
        let (year, season) = match record.sale_date {
            Some(date) => (date.year(), Season::from_month(date.month())),
            None => (self.config.undated_year, Season::Summer),
        };
        let recent = record.sale_date.is_some() && year >= self.config.recent_from_year;
        self.build(
            record.surface,
            f64::from(record.rooms),
            record.plot.unwrap_or(0.0),
            buckets.bucket(record.department()),
            recent,
            season,
            year,
            record.property_type.unwrap_or_default(),
        )
    }

    /// Features of an inference query: fixed query year, summer.
    pub fn from_query(&self, query: &EstimateQuery) -> FeatureRow {
        self.build(
            query.surface,
            f64::from(query.rooms),
            query.plot,
            query.department_code().to_string(),
            query.recent,
            Season::Summer,
            self.config.query_year,
            query.property_type,
        )
    }
}
