//! Trade execution at the signal price.
//!
//! Fills are immediate and cost-free: a buy debits exactly `shares * price`
//! and a sell credits exactly `shares * price`, so trading never changes the
//! marked value of the portfolio.

use chrono::NaiveDate;

use super::portfolio::Portfolio;
use super::position::{ClosedTrade, Position};

/// Result of an entry attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Entered { shares: u64, cost: f64 },
    InsufficientCapital,
}

/// Enter a long position sized to `budget`.
///
/// 1. Whole shares only: `floor(budget / price)`, stepped down until the cost
///    fits the budget
/// 2. Zero shares, or a cost above available cash, is `InsufficientCapital`
/// 3. Debit the cost and add the position
pub fn enter_long(
    portfolio: &mut Portfolio,
    stock: &str,
    price: f64,
    date: Option<NaiveDate>,
    budget: f64,
) -> EntryResult {
    let estimate = (budget / price).floor();
    if !(estimate >= 1.0) {
        return EntryResult::InsufficientCapital;
    }
    // the quotient can round up onto an integer the budget cannot pay for
    let mut shares = estimate as u64;
    while shares > 0 && shares as f64 * price > budget {
        shares -= 1;
    }
    if shares == 0 {
        return EntryResult::InsufficientCapital;
    }

    let cost = shares as f64 * price;
    if cost > portfolio.cash {
        return EntryResult::InsufficientCapital;
    }

    portfolio.cash -= cost;
    portfolio.add_position(Position {
        stock: stock.to_string(),
        shares,
        entry_price: price,
        entry_date: date,
    });

    EntryResult::Entered { shares, cost }
}

/// Result of an exit.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitResult {
    pub shares: u64,
    pub exit_price: f64,
    pub proceeds: f64,
    pub pnl: f64,
}

/// Close the whole position in `stock`, if any, and record the round trip.
pub fn exit_position(
    portfolio: &mut Portfolio,
    stock: &str,
    price: f64,
    date: Option<NaiveDate>,
) -> Option<ExitResult> {
    let position = portfolio.remove_position(stock)?;

    let proceeds = position.market_value(price);
    let pnl = position.unrealized_pnl(price);
    portfolio.cash += proceeds;

    portfolio.record_trade(ClosedTrade {
        stock: position.stock,
        shares: position.shares,
        entry_price: position.entry_price,
        exit_price: price,
        entry_date: position.entry_date,
        exit_date: date,
        pnl,
    });

    Some(ExitResult {
        shares: position.shares,
        exit_price: price,
        proceeds,
        pnl,
    })
}
