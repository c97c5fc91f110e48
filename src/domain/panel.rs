//! Panel data model.
//!
//! A panel holds parallel columns indexed by row, each row being one
//! (instrument, time) observation. `stock` and `price` are mandatory; `date`
//! is optional and, when present, gives every instrument an explicit time
//! ordering. The schema is checked once in [`PanelBuilder::build`] so later
//! stages never see ragged columns or ambiguous names.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::domain::error::FactorError;
use crate::domain::operator::Operator;

pub const STOCK_COLUMN: &str = "stock";
pub const DATE_COLUMN: &str = "date";
pub const PRICE_COLUMN: &str = "price";

/// Rows observed at one time point.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossSection {
    pub date: Option<NaiveDate>,
    pub rows: Vec<usize>,
}

impl CrossSection {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Panel {
    stocks: Vec<String>,
    dates: Option<Vec<NaiveDate>>,
    columns: BTreeMap<String, Vec<f64>>,
    cross_sections: Vec<CrossSection>,
    histories: Option<Vec<Vec<usize>>>,
}

impl Panel {
    pub fn builder(stocks: Vec<String>) -> PanelBuilder {
        PanelBuilder {
            stocks,
            dates: None,
            columns: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.stocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stocks.is_empty()
    }

    pub fn stocks(&self) -> &[String] {
        &self.stocks
    }

    pub fn stock(&self, row: usize) -> &str {
        &self.stocks[row]
    }

    pub fn date(&self, row: usize) -> Option<NaiveDate> {
        self.dates.as_ref().map(|d| d[row])
    }

    pub fn has_time_axis(&self) -> bool {
        self.dates.is_some()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn prices(&self) -> &[f64] {
        // presence is enforced by the builder
        self.columns
            .get(PRICE_COLUMN)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Cross-sections in ascending date order; a single one when there is no time axis.
    pub fn cross_sections(&self) -> &[CrossSection] {
        &self.cross_sections
    }

    /// Per-instrument row indices in ascending time order.
    ///
    /// Time-series operators depend on this grouping, so a panel without a
    /// `date` column is rejected rather than treated as if rows were ordered.
    pub fn histories(&self) -> Result<&[Vec<usize>], FactorError> {
        self.histories.as_deref().ok_or_else(|| {
            FactorError::configuration(
                "time-series operators require a 'date' column to order each instrument's history",
            )
        })
    }

    /// Number of distinct instruments.
    pub fn instrument_count(&self) -> usize {
        self.stocks.iter().collect::<HashSet<_>>().len()
    }
}

pub struct PanelBuilder {
    stocks: Vec<String>,
    dates: Option<Vec<NaiveDate>>,
    columns: Vec<(String, Vec<f64>)>,
}

impl PanelBuilder {
    pub fn dates(mut self, dates: Vec<NaiveDate>) -> Self {
        self.dates = Some(dates);
        self
    }

    pub fn column(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.columns.push((name.into(), values));
        self
    }

    pub fn build(self) -> Result<Panel, FactorError> {
        let len = self.stocks.len();

        if let Some(stock) = self.stocks.iter().find(|s| s.trim().is_empty()) {
            return Err(FactorError::configuration(format!(
                "instrument identifiers must be non-empty, found '{stock}'"
            )));
        }

        if let Some(dates) = &self.dates {
            if dates.len() != len {
                return Err(FactorError::configuration(format!(
                    "column '{DATE_COLUMN}' has {} rows, expected {len}",
                    dates.len()
                )));
            }
        }

        let mut columns = BTreeMap::new();
        for (name, values) in self.columns {
            validate_column_name(&name)?;
            if values.len() != len {
                return Err(FactorError::configuration(format!(
                    "column '{name}' has {} rows, expected {len}",
                    values.len()
                )));
            }
            if columns.insert(name.clone(), values).is_some() {
                return Err(FactorError::configuration(format!(
                    "duplicate column '{name}'"
                )));
            }
        }

        if !columns.contains_key(PRICE_COLUMN) {
            return Err(FactorError::configuration(format!(
                "missing required column '{PRICE_COLUMN}'"
            )));
        }

        let cross_sections = build_cross_sections(&self.stocks, self.dates.as_deref())?;
        let histories = self
            .dates
            .as_deref()
            .map(|dates| build_histories(&self.stocks, dates));

        Ok(Panel {
            stocks: self.stocks,
            dates: self.dates,
            columns,
            cross_sections,
            histories,
        })
    }
}

fn validate_column_name(name: &str) -> Result<(), FactorError> {
    if name == STOCK_COLUMN || name == DATE_COLUMN {
        return Err(FactorError::configuration(format!(
            "'{name}' is reserved and cannot be a numeric column"
        )));
    }
    if Operator::is_reserved(name) {
        return Err(FactorError::configuration(format!(
            "column '{name}' collides with an operator name"
        )));
    }
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(FactorError::configuration(format!(
            "column name '{name}' is not a valid identifier"
        )));
    }
    Ok(())
}

fn build_cross_sections(
    stocks: &[String],
    dates: Option<&[NaiveDate]>,
) -> Result<Vec<CrossSection>, FactorError> {
    let grouped: BTreeMap<Option<NaiveDate>, Vec<usize>> = match dates {
        Some(dates) => {
            let mut map: BTreeMap<Option<NaiveDate>, Vec<usize>> = BTreeMap::new();
            for (row, date) in dates.iter().enumerate() {
                map.entry(Some(*date)).or_default().push(row);
            }
            map
        }
        None if stocks.is_empty() => BTreeMap::new(),
        None => BTreeMap::from([(None, (0..stocks.len()).collect())]),
    };

    let mut sections = Vec::with_capacity(grouped.len());
    for (date, rows) in grouped {
        let mut seen = HashSet::with_capacity(rows.len());
        for &row in &rows {
            if !seen.insert(stocks[row].as_str()) {
                let at = date
                    .map(|d| format!(" on {d}"))
                    .unwrap_or_default();
                return Err(FactorError::configuration(format!(
                    "instrument '{}' appears more than once{at}",
                    stocks[row]
                )));
            }
        }
        sections.push(CrossSection { date, rows });
    }
    Ok(sections)
}

fn build_histories(stocks: &[String], dates: &[NaiveDate]) -> Vec<Vec<usize>> {
    let mut slot: HashMap<&str, usize> = HashMap::new();
    let mut histories: Vec<Vec<usize>> = Vec::new();
    for (row, stock) in stocks.iter().enumerate() {
        let idx = *slot.entry(stock.as_str()).or_insert_with(|| {
            histories.push(Vec::new());
            histories.len() - 1
        });
        histories[idx].push(row);
    }
    for rows in &mut histories {
        rows.sort_by_key(|&row| dates[row]);
    }
    histories
}
