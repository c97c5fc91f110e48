//! Long position tracking and closed round trips.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub stock: String,
    pub shares: u64,
    pub entry_price: f64,
    pub entry_date: Option<NaiveDate>,
}

impl Position {
    pub fn cost_basis(&self) -> f64 {
        self.shares as f64 * self.entry_price
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.shares as f64 * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.market_value(price) - self.cost_basis()
    }
}

/// A completed buy-then-sell round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub stock: String,
    pub shares: u64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_date: Option<NaiveDate>,
    pub exit_date: Option<NaiveDate>,
    pub pnl: f64,
}

impl ClosedTrade {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}
