//! Equal-weight long-only portfolio simulator.
//!
//! Consumes signal batches in order. Each instrument moves `Idle -> Long ->
//! Idle`; there is no shorting and a held instrument is never topped up.
//!
//! # Batch Semantics
//!
//! - Every buy and sell price is validated before anything changes
//! - Sells run first and close the whole position at the signal price
//! - A sell with nothing held is recorded as a no-op
//! - The buy cohort budget is `cash / buy signals in the batch`, fixed when
//!   the first buy is attempted
//! - A buy for a held instrument, or one that affords zero shares, is
//!   recorded as a no-op

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::domain::error::FactorError;
use crate::domain::execution::{self, EntryResult};
use crate::domain::portfolio::{EquityPoint, Portfolio};
use crate::domain::position::{ClosedTrade, Position};
use crate::domain::signal::{SignalBatch, SignalKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAction {
    Executed,
    NoPosition,
    AlreadyHeld,
    InsufficientCapital,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Executed => write!(f, "executed"),
            TradeAction::NoPosition => write!(f, "no_position"),
            TradeAction::AlreadyHeld => write!(f, "already_held"),
            TradeAction::InsufficientCapital => write!(f, "insufficient_capital"),
        }
    }
}

/// One line of the trade log. No-ops are logged with zero shares.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub date: Option<NaiveDate>,
    pub stock: String,
    pub signal: SignalKind,
    pub action: TradeAction,
    pub price: f64,
    pub shares: u64,
    pub cash_after: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub initial_capital: f64,
    pub cash: f64,
    pub positions: Vec<Position>,
    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
    pub closed_trades: Vec<ClosedTrade>,
    pub final_value: f64,
}

impl SimulationResult {
    pub fn executed_trades(&self) -> usize {
        self.trades
            .iter()
            .filter(|t| t.action == TradeAction::Executed)
            .count()
    }
}

#[derive(Debug)]
pub struct PortfolioSimulator {
    portfolio: Portfolio,
    last_prices: HashMap<String, f64>,
    trades: Vec<TradeRecord>,
}

fn valid_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

/// Every buy and sell price in `batch` must be positive and finite.
pub fn validate_prices(batch: &SignalBatch) -> Result<(), FactorError> {
    match batch
        .signals
        .iter()
        .find(|s| s.kind != SignalKind::Hold && !valid_price(s.price))
    {
        Some(bad) => Err(FactorError::InvalidPrice {
            stock: bad.stock.clone(),
            price: bad.price,
        }),
        None => Ok(()),
    }
}

impl PortfolioSimulator {
    pub fn new(initial_capital: f64) -> Result<Self, FactorError> {
        if !(initial_capital.is_finite() && initial_capital > 0.0) {
            return Err(FactorError::configuration(format!(
                "initial_capital must be positive, got {initial_capital}"
            )));
        }
        Ok(PortfolioSimulator {
            portfolio: Portfolio::new(initial_capital),
            last_prices: HashMap::new(),
            trades: Vec::new(),
        })
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn cash(&self) -> f64 {
        self.portfolio.cash
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    /// Remember the latest observed price for `stock`. Invalid prices are ignored.
    pub fn observe_price(&mut self, stock: &str, price: f64) {
        if valid_price(price) {
            self.last_prices.insert(stock.to_string(), price);
        }
    }

    /// Cash plus holdings at the last observed prices.
    pub fn portfolio_value(&self) -> f64 {
        self.portfolio.total_equity(&self.last_prices)
    }

    /// Record an equity point at the last observed prices and return it.
    pub fn mark_to_market(&mut self, date: Option<NaiveDate>) -> f64 {
        let equity = self.portfolio_value();
        self.portfolio.record_equity(date, equity);
        equity
    }

    pub fn process_batch(&mut self, batch: &SignalBatch) -> Result<(), FactorError> {
        validate_prices(batch)?;

        let buy_signals = batch.buys().count();
        let mut budget: Option<f64> = None;

        for signal in &batch.signals {
            self.observe_price(&signal.stock, signal.price);
            match signal.kind {
                SignalKind::Sell => self.sell(&signal.stock, signal.price, batch.date),
                SignalKind::Buy => {
                    if self.portfolio.has_position(&signal.stock) {
                        debug!(stock = %signal.stock, "buy skipped, already held");
                        self.record(batch.date, &signal.stock, SignalKind::Buy, TradeAction::AlreadyHeld, signal.price, 0);
                        continue;
                    }
                    let cash = self.portfolio.cash;
                    let cohort_budget = *budget.get_or_insert(cash / buy_signals as f64);
                    self.buy(&signal.stock, signal.price, batch.date, cohort_budget);
                }
                SignalKind::Hold => {}
            }
        }
        Ok(())
    }

    fn sell(&mut self, stock: &str, price: f64, date: Option<NaiveDate>) {
        match execution::exit_position(&mut self.portfolio, stock, price, date) {
            Some(exit) => {
                debug!(stock, shares = exit.shares, price, pnl = exit.pnl, "sell executed");
                self.record(date, stock, SignalKind::Sell, TradeAction::Executed, price, exit.shares);
            }
            None => {
                warn!(stock, "sell signal with no position held");
                self.record(date, stock, SignalKind::Sell, TradeAction::NoPosition, price, 0);
            }
        }
    }

    fn buy(&mut self, stock: &str, price: f64, date: Option<NaiveDate>, budget: f64) {
        match execution::enter_long(&mut self.portfolio, stock, price, date, budget) {
            EntryResult::Entered { shares, cost } => {
                debug!(stock, shares, price, cost, "buy executed");
                self.record(date, stock, SignalKind::Buy, TradeAction::Executed, price, shares);
            }
            EntryResult::InsufficientCapital => {
                warn!(stock, price, budget, "buy skipped, budget affords no shares");
                self.record(date, stock, SignalKind::Buy, TradeAction::InsufficientCapital, price, 0);
            }
        }
    }

    fn record(
        &mut self,
        date: Option<NaiveDate>,
        stock: &str,
        signal: SignalKind,
        action: TradeAction,
        price: f64,
        shares: u64,
    ) {
        self.trades.push(TradeRecord {
            date,
            stock: stock.to_string(),
            signal,
            action,
            price,
            shares,
            cash_after: self.portfolio.cash,
        });
    }

    pub fn finish(self) -> SimulationResult {
        let final_value = self.portfolio_value();
        let Portfolio {
            cash,
            initial_capital,
            positions,
            closed_trades,
            equity_curve,
        } = self.portfolio;
        SimulationResult {
            initial_capital,
            cash,
            positions: positions.into_values().collect(),
            trades: self.trades,
            equity_curve,
            closed_trades,
            final_value,
        }
    }
}
