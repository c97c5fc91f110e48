//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvPanelAdapter;
use crate::adapters::csv_trade_log::{self, CsvTradeLogWriter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult};
use crate::domain::config_validation::{
    validate_backtest_config, validate_data_config, validate_factor_config,
};
use crate::domain::error::FactorError;
use crate::domain::expression::Expr;
use crate::domain::expression_parser;
use crate::domain::metrics::Metrics;
use crate::domain::operator::{Operator, OperatorKind, REGISTRY_VERSION};
use crate::ports::config_port::ConfigPort;
use crate::ports::panel_source::PanelSource;
use crate::ports::trade_log_sink::TradeLogSink;

#[derive(Parser, Debug)]
#[command(name = "factortrader", about = "Factor expression backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Panel CSV, overrides [data] panel_path
        #[arg(short, long)]
        panel: Option<PathBuf>,
        /// Factor expression, overrides [factor] expression
        #[arg(short, long)]
        expression: Option<String>,
        /// Trade log CSV, overrides [report] trade_log_path
        #[arg(short, long)]
        trades: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Parse a factor expression and show its structure
    Validate {
        #[arg(short, long)]
        expression: String,
    },
    /// List the available operators
    Operators,
}

/// Install the stderr log subscriber. `RUST_LOG` overrides the default level.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "factortrader=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            panel,
            expression,
            trades,
            dry_run,
        } => {
            let overrides = Overrides {
                panel,
                expression,
                trades,
            };
            if dry_run {
                run_dry_run(&config, &overrides)
            } else {
                run_backtest(&config, &overrides)
            }
        }
        Command::Validate { expression } => run_validate(&expression),
        Command::Operators => run_operators(),
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub panel: Option<PathBuf>,
    pub expression: Option<String>,
    pub trades: Option<PathBuf>,
}

fn fail(err: &FactorError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

fn fail_expression(err: &FactorError, expression: &str) -> ExitCode {
    eprintln!("error: {}", err.display_with_context(expression));
    err.into()
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = match e {
            FactorError::Io(io_err) => FactorError::Io(io::Error::new(
                io_err.kind(),
                format!("failed to read {}: {}", path.display(), io_err),
            )),
            other => other,
        };
        fail(&err)
    })
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, FactorError> {
    validate_backtest_config(adapter)?;

    let count = |key: &str| {
        usize::try_from(adapter.get_int("backtest", key, 0)).map_err(|_| {
            FactorError::ConfigInvalid {
                section: "backtest".into(),
                key: key.into(),
                reason: format!("{key} must be non-negative"),
            }
        })
    };

    Ok(BacktestConfig {
        initial_capital: adapter.get_double("backtest", "initial_capital", 0.0),
        buy_count: count("buy_count")?,
        sell_count: count("sell_count")?,
    })
}

pub fn resolve_expression(
    expression_override: Option<&str>,
    adapter: &dyn ConfigPort,
) -> Result<String, FactorError> {
    if let Some(e) = expression_override {
        return Ok(e.to_string());
    }
    validate_factor_config(adapter)?;
    Ok(adapter
        .get_string("factor", "expression")
        .unwrap_or_default())
}

pub fn resolve_panel_path(
    panel_override: Option<&PathBuf>,
    adapter: &dyn ConfigPort,
) -> Result<PathBuf, FactorError> {
    if let Some(p) = panel_override {
        return Ok(p.clone());
    }
    validate_data_config(adapter)?;
    Ok(PathBuf::from(
        adapter
            .get_string("data", "panel_path")
            .unwrap_or_default()
            .trim(),
    ))
}

pub fn resolve_trade_log_path(
    trades_override: Option<&PathBuf>,
    adapter: &dyn ConfigPort,
) -> Option<PathBuf> {
    trades_override.cloned().or_else(|| {
        adapter
            .get_string("report", "trade_log_path")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    })
}

/// Config, expression and panel path, all checked before any data is read.
struct RunPlan {
    config: BacktestConfig,
    expression: String,
    expr: Expr,
    panel_path: PathBuf,
}

fn plan(adapter: &dyn ConfigPort, overrides: &Overrides) -> Result<RunPlan, ExitCode> {
    let config = build_backtest_config(adapter).map_err(|e| fail(&e))?;
    let expression =
        resolve_expression(overrides.expression.as_deref(), adapter).map_err(|e| fail(&e))?;
    let expr = expression_parser::parse(&expression).map_err(|e| fail_expression(&e, &expression))?;
    let panel_path = resolve_panel_path(overrides.panel.as_ref(), adapter).map_err(|e| fail(&e))?;
    Ok(RunPlan {
        config,
        expression,
        expr,
        panel_path,
    })
}

fn run_backtest(config_path: &PathBuf, overrides: &Overrides) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let plan = match plan(&adapter, overrides) {
        Ok(p) => p,
        Err(code) => return code,
    };

    eprintln!("Factor: {}", plan.expr);
    eprintln!("Loading panel from {}", plan.panel_path.display());
    let panel = match CsvPanelAdapter::new(plan.panel_path.clone()).load_panel() {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };
    eprintln!(
        "  {} rows, {} instruments, {} cross-sections",
        panel.len(),
        panel.instrument_count(),
        panel.cross_sections().len()
    );

    let result = match backtest_engine::run_backtest(&panel, &plan.expression, &plan.config) {
        Ok(r) => r,
        Err(e) if e.is_expression_error() => return fail_expression(&e, &plan.expression),
        Err(e) => return fail(&e),
    };

    print_summary(&result);

    let trades = &result.simulation.trades;
    match resolve_trade_log_path(overrides.trades.as_ref(), &adapter) {
        Some(path) => {
            if let Err(e) = CsvTradeLogWriter::new(path.clone()).write_trades(trades) {
                return fail(&e);
            }
            eprintln!("\nTrade log written to: {}", path.display());
        }
        None => {
            if let Err(e) = csv_trade_log::write_trade_log(io::stdout().lock(), trades) {
                return fail(&e);
            }
        }
    }

    ExitCode::SUCCESS
}

fn print_summary(result: &BacktestResult) {
    let sim = &result.simulation;
    let metrics = Metrics::compute(sim);

    eprintln!("\n=== Results ===");
    eprintln!("Initial Capital:  {:.2}", sim.initial_capital);
    eprintln!("Final Value:      {:.2}", sim.final_value);
    eprintln!("Cash:             {:.2}", sim.cash);
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!("Max Drawdown:     -{:.1}%", metrics.max_drawdown * 100.0);
    eprintln!("Total Trades:     {}", metrics.total_trades);
    eprintln!("Round Trips:      {}", metrics.round_trips);
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", metrics.profit_factor);

    if !sim.positions.is_empty() {
        eprintln!("\n=== Open Positions ===");
        for pos in &sim.positions {
            eprintln!(
                "  {:<10} {:>8} shares @ {:.2}",
                pos.stock, pos.shares, pos.entry_price
            );
        }
    }
}

pub fn run_dry_run(config_path: &PathBuf, overrides: &Overrides) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let plan = match plan(&adapter, overrides) {
        Ok(p) => p,
        Err(code) => return code,
    };
    eprintln!("Config validated successfully");

    eprintln!("\nBacktest:");
    eprintln!("  initial_capital: {:.2}", plan.config.initial_capital);
    eprintln!("  buy_count:       {}", plan.config.buy_count);
    eprintln!("  sell_count:      {}", plan.config.sell_count);

    eprintln!("\nFactor (parsed):");
    eprintln!("  {}", plan.expr);
    print_expression_details(&plan.expr);

    eprintln!("\nPanel: {}", plan.panel_path.display());
    if let Some(path) = resolve_trade_log_path(overrides.trades.as_ref(), &adapter) {
        eprintln!("Trade log: {}", path.display());
    }

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn print_expression_details(expr: &Expr) {
    let operators: Vec<&str> = expr.operators().into_iter().collect();
    let mut columns: Vec<&str> = Vec::new();
    for (name, _) in expr.columns() {
        if !columns.contains(&name) {
            columns.push(name);
        }
    }

    if !operators.is_empty() {
        eprintln!("  operators: {}", operators.join(", "));
    }
    if !columns.is_empty() {
        eprintln!("  columns:   {}", columns.join(", "));
    }
    if expr.needs_time_axis() {
        eprintln!("  requires a date column");
    }
}

fn run_validate(expression: &str) -> ExitCode {
    eprintln!("Validating expression: {expression}");
    match expression_parser::parse(expression) {
        Ok(expr) => {
            println!("{expr}");
            print_expression_details(&expr);
            ExitCode::SUCCESS
        }
        Err(e) => fail_expression(&e, expression),
    }
}

fn run_operators() -> ExitCode {
    println!("operator registry v{REGISTRY_VERSION}");
    for op in Operator::ALL {
        let signature = op.signature();
        let kind = match signature.kind {
            OperatorKind::CrossSectional => "cross-sectional",
            OperatorKind::TimeSeries => "time-series",
        };
        println!("  {:<12} {:<26} {}", op.name(), signature.to_string(), kind);
    }
    ExitCode::SUCCESS
}
