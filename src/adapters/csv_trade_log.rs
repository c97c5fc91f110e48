//! CSV trade log writer.

use crate::domain::error::FactorError;
use crate::domain::simulator::TradeRecord;
use crate::ports::trade_log_sink::TradeLogSink;
use std::io;
use std::path::PathBuf;

pub const TRADE_LOG_HEADER: [&str; 7] = [
    "date",
    "stock",
    "signal",
    "action",
    "price",
    "shares",
    "cash_after",
];

pub struct CsvTradeLogWriter {
    path: PathBuf,
}

impl CsvTradeLogWriter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

/// Write trades to any `io::Write` in trade log format.
pub fn write_trade_log<W: io::Write>(writer: W, trades: &[TradeRecord]) -> Result<(), FactorError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(TRADE_LOG_HEADER).map_err(io::Error::from)?;
    for trade in trades {
        let date = trade.date.map(|d| d.to_string()).unwrap_or_default();
        wtr.write_record([
            date,
            trade.stock.clone(),
            trade.signal.to_string(),
            trade.action.to_string(),
            trade.price.to_string(),
            trade.shares.to_string(),
            format!("{:.2}", trade.cash_after),
        ])
        .map_err(io::Error::from)?;
    }
    wtr.flush()?;
    Ok(())
}

impl TradeLogSink for CsvTradeLogWriter {
    fn write_trades(&self, trades: &[TradeRecord]) -> Result<(), FactorError> {
        let file = std::fs::File::create(&self.path)?;
        write_trade_log(file, trades)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::SignalKind;
    use crate::domain::simulator::TradeAction;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn sample_trades() -> Vec<TradeRecord> {
        vec![
            TradeRecord {
                date: NaiveDate::from_ymd_opt(2024, 1, 2),
                stock: "AAA".into(),
                signal: SignalKind::Buy,
                action: TradeAction::Executed,
                price: 150.0,
                shares: 222,
                cash_after: 66700.0,
            },
            TradeRecord {
                date: None,
                stock: "BBB".into(),
                signal: SignalKind::Sell,
                action: TradeAction::NoPosition,
                price: 2800.5,
                shares: 0,
                cash_after: 66700.0,
            },
        ]
    }

    #[test]
    fn writes_header_and_rows() {
        let mut buf = Vec::new();
        write_trade_log(&mut buf, &sample_trades()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "date,stock,signal,action,price,shares,cash_after");
        assert_eq!(lines[1], "2024-01-02,AAA,buy,executed,150,222,66700.00");
        assert_eq!(lines[2], ",BBB,sell,no_position,2800.5,0,66700.00");
    }

    #[test]
    fn writes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trades.csv");
        CsvTradeLogWriter::new(path.clone())
            .write_trades(&sample_trades())
            .unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn unwritable_path_is_io_error() {
        let writer = CsvTradeLogWriter::new(PathBuf::from("/nonexistent/dir/trades.csv"));
        assert!(matches!(
            writer.write_trades(&sample_trades()),
            Err(FactorError::Io(_))
        ));
    }
}
