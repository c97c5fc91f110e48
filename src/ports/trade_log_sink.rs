//! Trade log output port trait.

use crate::domain::error::FactorError;
use crate::domain::simulator::TradeRecord;

pub trait TradeLogSink {
    fn write_trades(&self, trades: &[TradeRecord]) -> Result<(), FactorError>;
}
