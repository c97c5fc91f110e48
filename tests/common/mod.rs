#![allow(dead_code)]

use chrono::NaiveDate;
use factortrader::domain::backtest::BacktestConfig;
use factortrader::domain::error::FactorError;
use factortrader::domain::panel::Panel;
use factortrader::domain::simulator::TradeRecord;
use factortrader::ports::panel_source::PanelSource;
use factortrader::ports::trade_log_sink::TradeLogSink;
use std::cell::RefCell;
use std::io::Write;

pub const TICKERS: [&str; 6] = ["AAA", "BBB", "CCC", "DDD", "EEE", "FFF"];
pub const PRICES: [f64; 6] = [150.0, 2800.0, 300.0, 3400.0, 700.0, 600.0];
pub const ROE: [f64; 6] = [0.15, 0.20, 0.18, 0.10, 0.05, 0.12];
pub const PE_RATIO: [f64; 6] = [25.0, 30.0, 20.0, 50.0, 100.0, 40.0];

pub const FUNDAMENTALS_CSV: &str = "\
stock,price,roe,pe_ratio
AAA,150,0.15,25
BBB,2800,0.20,30
CCC,300,0.18,20
DDD,3400,0.10,50
EEE,700,0.05,100
FFF,600,0.12,40
";

pub struct MockPanelSource {
    pub panel: Option<Panel>,
    pub error: Option<String>,
}

impl MockPanelSource {
    pub fn with_panel(panel: Panel) -> Self {
        Self {
            panel: Some(panel),
            error: None,
        }
    }

    pub fn with_error(reason: &str) -> Self {
        Self {
            panel: None,
            error: Some(reason.to_string()),
        }
    }
}

impl PanelSource for MockPanelSource {
    fn load_panel(&self) -> Result<Panel, FactorError> {
        if let Some(reason) = &self.error {
            return Err(FactorError::Data {
                reason: reason.clone(),
            });
        }
        self.panel.clone().ok_or_else(|| FactorError::Data {
            reason: "no panel".into(),
        })
    }
}

#[derive(Default)]
pub struct RecordingTradeLog {
    pub written: RefCell<Vec<TradeRecord>>,
}

impl TradeLogSink for RecordingTradeLog {
    fn write_trades(&self, trades: &[TradeRecord]) -> Result<(), FactorError> {
        self.written.borrow_mut().extend_from_slice(trades);
        Ok(())
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn stocks(codes: &[&str]) -> Vec<String> {
    codes.iter().map(|s| s.to_string()).collect()
}

/// Six instruments, one cross-section, with `roe` and `pe_ratio`.
pub fn fundamentals_panel() -> Panel {
    Panel::builder(stocks(&TICKERS))
        .column("price", PRICES.to_vec())
        .column("roe", ROE.to_vec())
        .column("pe_ratio", PE_RATIO.to_vec())
        .build()
        .unwrap()
}

/// One cross-section with an explicit `score` column.
pub fn scored_panel(prices: &[f64], scores: &[f64]) -> Panel {
    let codes: Vec<String> = (0..prices.len()).map(|i| format!("S{i}")).collect();
    Panel::builder(codes)
        .column("price", prices.to_vec())
        .column("score", scores.to_vec())
        .build()
        .unwrap()
}

/// `instruments` instruments over `days` consecutive days with deterministic
/// price paths, rows grouped by date.
pub fn generate_panel(instruments: usize, days: usize) -> Panel {
    let start = date("2024-01-01");
    let mut codes = Vec::new();
    let mut dates = Vec::new();
    let mut prices = Vec::new();
    let mut volume = Vec::new();

    for d in 0..days {
        for i in 0..instruments {
            codes.push(format!("T{i:02}"));
            dates.push(start + chrono::Days::new(d as u64));
            let drift = (i as f64 + 1.0) * 0.01;
            let wiggle = ((d * (i + 3)) % 7) as f64 - 3.0;
            prices.push(50.0 + 10.0 * i as f64 + drift * d as f64 * 10.0 + wiggle);
            volume.push(1000.0 + ((d + 1) * (i + 1) % 11) as f64 * 100.0);
        }
    }

    Panel::builder(codes)
        .dates(dates)
        .column("price", prices)
        .column("volume", volume)
        .build()
        .unwrap()
}

pub fn sample_config(buy_count: usize, sell_count: usize) -> BacktestConfig {
    BacktestConfig {
        initial_capital: 100_000.0,
        buy_count,
        sell_count,
    }
}

pub fn write_temp_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}
