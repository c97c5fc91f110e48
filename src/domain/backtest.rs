//! Backtest orchestration.
//!
//! Evaluates the factor, ranks it, derives every signal batch and checks every
//! traded price before a simulator exists, so any expression, configuration,
//! schema or price error surfaces without touching portfolio state. The
//! simulator then walks the batches in date order and marks the portfolio to
//! market after each cross-section.

use tracing::info;

use crate::domain::error::FactorError;
use crate::domain::evaluator;
use crate::domain::expression_parser;
use crate::domain::panel::Panel;
use crate::domain::ranker::{self, Ranking};
use crate::domain::signal::{self, SignalBatch, SignalConfig};
use crate::domain::simulator::{self, PortfolioSimulator, SimulationResult};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub buy_count: usize,
    pub sell_count: usize,
}

impl BacktestConfig {
    pub fn signal_config(&self) -> SignalConfig {
        SignalConfig {
            buy_count: self.buy_count,
            sell_count: self.sell_count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub factor: Vec<f64>,
    pub ranking: Ranking,
    pub batches: Vec<SignalBatch>,
    pub simulation: SimulationResult,
}

pub fn run_backtest(
    panel: &Panel,
    expression: &str,
    config: &BacktestConfig,
) -> Result<BacktestResult, FactorError> {
    let expr = expression_parser::parse(expression)?;
    info!(expression = %expr, "evaluating factor");
    let factor = evaluator::evaluate_expr(panel, &expr)?;

    let ranking = ranker::rank_factor(panel, &factor)?;
    let batches = signal::generate_signals(panel, &ranking, &config.signal_config())?;
    info!(
        cross_sections = batches.len(),
        signals = batches.iter().map(|b| b.signals.len()).sum::<usize>(),
        "signals generated"
    );

    for batch in &batches {
        simulator::validate_prices(batch)?;
    }

    let mut simulator = PortfolioSimulator::new(config.initial_capital)?;
    let prices = panel.prices();
    for (section, batch) in panel.cross_sections().iter().zip(&batches) {
        simulator.process_batch(batch)?;
        for &row in &section.rows {
            simulator.observe_price(panel.stock(row), prices[row]);
        }
        simulator.mark_to_market(section.date);
    }

    let simulation = simulator.finish();
    info!(
        final_value = simulation.final_value,
        trades = simulation.executed_trades(),
        "simulation complete"
    );

    Ok(BacktestResult {
        factor,
        ranking,
        batches,
        simulation,
    })
}
