//! Portfolio state and equity tracking.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

use super::position::{ClosedTrade, Position};

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: Option<NaiveDate>,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub positions: BTreeMap<String, Position>,
    pub closed_trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            positions: BTreeMap::new(),
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn add_position(&mut self, position: Position) {
        self.positions.insert(position.stock.clone(), position);
    }

    pub fn get_position(&self, stock: &str) -> Option<&Position> {
        self.positions.get(stock)
    }

    pub fn has_position(&self, stock: &str) -> bool {
        self.positions.contains_key(stock)
    }

    pub fn remove_position(&mut self, stock: &str) -> Option<Position> {
        self.positions.remove(stock)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn record_trade(&mut self, trade: ClosedTrade) {
        self.closed_trades.push(trade);
    }

    pub fn record_equity(&mut self, date: Option<NaiveDate>, equity: f64) {
        self.equity_curve.push(EquityPoint { date, equity });
    }

    /// Cash plus positions marked at `price_map`; unpriced positions count at entry price.
    pub fn total_equity(&self, price_map: &HashMap<String, f64>) -> f64 {
        let position_value: f64 = self
            .positions
            .values()
            .map(|pos| {
                let price = price_map
                    .get(&pos.stock)
                    .copied()
                    .unwrap_or(pos.entry_price);
                pos.market_value(price)
            })
            .sum();
        self.cash + position_value
    }
}
