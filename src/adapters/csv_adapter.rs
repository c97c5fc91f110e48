//! CSV panel file adapter.
//!
//! Expects a header row with `stock` and `price` columns, an optional `date`
//! column in `YYYY-MM-DD` form, and any number of further numeric columns.
//! Empty cells and `NaN` are undefined values, except in `price`.

use crate::domain::error::FactorError;
use crate::domain::panel::{DATE_COLUMN, PRICE_COLUMN, Panel, STOCK_COLUMN};
use crate::ports::panel_source::PanelSource;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvPanelAdapter {
    path: PathBuf,
}

impl CsvPanelAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl PanelSource for CsvPanelAdapter {
    fn load_panel(&self) -> Result<Panel, FactorError> {
        let content = fs::read_to_string(&self.path)?;
        parse_panel(&content).map_err(|e| match e {
            FactorError::Data { reason } => FactorError::Data {
                reason: format!("{}: {}", self.path.display(), reason),
            },
            other => other,
        })
    }
}

fn data_error(reason: impl Into<String>) -> FactorError {
    FactorError::Data {
        reason: reason.into(),
    }
}

fn parse_value(raw: &str, line: usize, column: &str) -> Result<f64, FactorError> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    raw.parse::<f64>().map_err(|_| {
        data_error(format!(
            "line {line}: invalid number '{raw}' in column '{column}'"
        ))
    })
}

/// Parse panel CSV text.
pub fn parse_panel(content: &str) -> Result<Panel, FactorError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| data_error(format!("CSV header error: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let find = |name: &str| headers.iter().position(|h| h == name);
    let stock_idx =
        find(STOCK_COLUMN).ok_or_else(|| data_error(format!("missing required column '{STOCK_COLUMN}'")))?;
    if find(PRICE_COLUMN).is_none() {
        return Err(data_error(format!(
            "missing required column '{PRICE_COLUMN}'"
        )));
    }
    let date_idx = find(DATE_COLUMN);
    let numeric: Vec<(usize, &str)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != stock_idx && Some(*i) != date_idx)
        .map(|(i, h)| (i, h.as_str()))
        .collect();

    let mut stocks = Vec::new();
    let mut dates = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); numeric.len()];

    for (n, result) in rdr.records().enumerate() {
        // header is line 1
        let line = n + 2;
        let record = result.map_err(|e| data_error(format!("CSV parse error: {e}")))?;

        let stock = record.get(stock_idx).unwrap_or_default();
        stocks.push(stock.to_string());

        if let Some(idx) = date_idx {
            let raw = record.get(idx).unwrap_or_default();
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
                data_error(format!(
                    "line {line}: invalid date '{raw}', expected YYYY-MM-DD"
                ))
            })?;
            dates.push(date);
        }

        for (slot, &(idx, name)) in numeric.iter().enumerate() {
            let value = parse_value(record.get(idx).unwrap_or_default(), line, name)?;
            if name == PRICE_COLUMN && value.is_nan() {
                return Err(data_error(format!("line {line}: missing price for '{stock}'")));
            }
            columns[slot].push(value);
        }
    }

    let mut builder = Panel::builder(stocks);
    if date_idx.is_some() {
        builder = builder.dates(dates);
    }
    for (&(_, name), values) in numeric.iter().zip(columns) {
        builder = builder.column(name, values);
    }

    builder.build().map_err(|e| match e {
        FactorError::Configuration { reason } => FactorError::Data { reason },
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PANEL_CSV: &str = "\
date,stock,price,roe,pe_ratio
2024-01-02,AAA,150.0,0.15,25
2024-01-02,BBB,2800.0,0.20,30
2024-01-03,AAA,152.5,,25
2024-01-03,BBB,2790.0,NaN,31
";

    #[test]
    fn parses_dated_panel() {
        let panel = parse_panel(PANEL_CSV).unwrap();
        assert_eq!(panel.len(), 4);
        assert!(panel.has_time_axis());
        assert_eq!(panel.cross_sections().len(), 2);
        assert_eq!(panel.stock(1), "BBB");
        assert_eq!(panel.prices()[2], 152.5);
        assert_eq!(panel.column("pe_ratio").unwrap()[3], 31.0);
    }

    #[test]
    fn empty_and_nan_cells_are_undefined() {
        let panel = parse_panel(PANEL_CSV).unwrap();
        let roe = panel.column("roe").unwrap();
        assert!(roe[2].is_nan());
        assert!(roe[3].is_nan());
    }

    #[test]
    fn date_column_is_optional() {
        let panel = parse_panel("stock,price,roe\nA,1,0.1\nB,2,0.2\n").unwrap();
        assert!(!panel.has_time_axis());
        assert_eq!(panel.cross_sections().len(), 1);
    }

    #[test]
    fn missing_stock_column() {
        let err = parse_panel("price,roe\n1,2\n").unwrap_err();
        assert!(matches!(err, FactorError::Data { .. }));
        assert!(err.to_string().contains("'stock'"));
    }

    #[test]
    fn missing_price_column() {
        let err = parse_panel("stock,roe\nA,2\n").unwrap_err();
        assert!(err.to_string().contains("'price'"));
    }

    #[test]
    fn missing_price_value() {
        let err = parse_panel("stock,price\nA,\n").unwrap_err();
        assert!(err.to_string().contains("missing price"));
    }

    #[test]
    fn invalid_number_reports_line() {
        let err = parse_panel("stock,price,roe\nA,1,0.1\nB,2,abc\n").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("line 3"));
        assert!(msg.contains("'roe'"));
    }

    #[test]
    fn invalid_date_rejected() {
        let err = parse_panel("date,stock,price\n01/02/2024,A,1\n").unwrap_err();
        assert!(err.to_string().contains("invalid date"));
    }

    #[test]
    fn duplicate_instrument_is_data_error() {
        let err = parse_panel("stock,price\nA,1\nA,2\n").unwrap_err();
        assert!(matches!(err, FactorError::Data { .. }));
    }

    #[test]
    fn operator_named_column_is_data_error() {
        let err = parse_panel("stock,price,rank\nA,1,2\n").unwrap_err();
        assert!(matches!(err, FactorError::Data { .. }));
    }

    #[test]
    fn ragged_row_rejected() {
        let err = parse_panel("stock,price,roe\nA,1\n").unwrap_err();
        assert!(matches!(err, FactorError::Data { .. }));
    }

    #[test]
    fn load_panel_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("panel.csv");
        fs::write(&path, PANEL_CSV).unwrap();

        let panel = CsvPanelAdapter::new(path).load_panel().unwrap();
        assert_eq!(panel.instrument_count(), 2);
    }

    #[test]
    fn load_panel_missing_file_is_io_error() {
        let adapter = CsvPanelAdapter::new(PathBuf::from("/nonexistent/panel.csv"));
        assert!(matches!(adapter.load_panel(), Err(FactorError::Io(_))));
    }
}
