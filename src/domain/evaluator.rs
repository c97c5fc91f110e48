//! Factor expression evaluation.
//!
//! Walks a parsed [`Expr`] against a [`Panel`] and produces one value per
//! panel row.
//!
//! # Evaluation Semantics
//!
//! - Column references are bound against the panel before any computation
//! - Arithmetic broadcasts scalars over series; `NaN` propagates
//! - Division by an exact zero fails with `DegenerateInput`
//! - Cross-sectional operators run once per cross-section
//! - Time-series operators run once per instrument history, in date order
//! - A constant expression is broadcast to the panel length
//!
//! The panel is never modified and evaluation has no hidden state, so the
//! same expression on the same panel gives bit-identical output.

use crate::domain::error::FactorError;
use crate::domain::expression::{Argument, BinaryOp, Expr, UnaryOp};
use crate::domain::expression_parser;
use crate::domain::operator::Operator;
use crate::domain::operators;
use crate::domain::panel::Panel;

/// Intermediate value: literals stay scalar until they meet a series.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(f64),
    Series(Vec<f64>),
}

impl Value {
    fn into_series(self, len: usize) -> Vec<f64> {
        match self {
            Value::Scalar(v) => vec![v; len],
            Value::Series(values) => values,
        }
    }
}

/// Check that every column the expression references is a numeric panel column.
pub fn bind(expr: &Expr, panel: &Panel) -> Result<(), FactorError> {
    for (name, position) in expr.columns() {
        if panel.column(name).is_none() {
            return Err(FactorError::UnresolvedReference {
                name: name.to_string(),
                position,
            });
        }
    }
    Ok(())
}

/// Parse `input` and evaluate it against `panel`.
pub fn evaluate(panel: &Panel, input: &str) -> Result<Vec<f64>, FactorError> {
    let expr = expression_parser::parse(input)?;
    evaluate_expr(panel, &expr)
}

pub fn evaluate_expr(panel: &Panel, expr: &Expr) -> Result<Vec<f64>, FactorError> {
    bind(expr, panel)?;
    if expr.needs_time_axis() {
        panel.histories()?;
    }
    Ok(eval(panel, expr)?.into_series(panel.len()))
}

fn eval(panel: &Panel, expr: &Expr) -> Result<Value, FactorError> {
    match expr {
        Expr::Literal(v) => Ok(Value::Scalar(*v)),
        Expr::Column { name, position } => panel
            .column(name)
            .map(|values| Value::Series(values.to_vec()))
            .ok_or_else(|| FactorError::UnresolvedReference {
                name: name.clone(),
                position: *position,
            }),
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => Ok(match eval(panel, operand)? {
            Value::Scalar(v) => Value::Scalar(-v),
            Value::Series(values) => Value::Series(values.into_iter().map(|v| -v).collect()),
        }),
        Expr::Binary { op, left, right } => {
            let left = eval(panel, left)?;
            let right = eval(panel, right)?;
            combine(*op, left, right)
        }
        Expr::Call { operator, args } => apply_call(panel, *operator, args).map(Value::Series),
    }
}

fn combine(op: BinaryOp, left: Value, right: Value) -> Result<Value, FactorError> {
    if op == BinaryOp::Div {
        let has_zero = match &right {
            Value::Scalar(v) => *v == 0.0,
            Value::Series(values) => values.iter().any(|v| *v == 0.0),
        };
        if has_zero {
            return Err(FactorError::degenerate("/", "division by zero"));
        }
    }

    Ok(match (left, right) {
        (Value::Scalar(a), Value::Scalar(b)) => Value::Scalar(op.apply(a, b)),
        (Value::Scalar(a), Value::Series(bs)) => {
            Value::Series(bs.into_iter().map(|b| op.apply(a, b)).collect())
        }
        (Value::Series(as_), Value::Scalar(b)) => {
            Value::Series(as_.into_iter().map(|a| op.apply(a, b)).collect())
        }
        (Value::Series(as_), Value::Series(bs)) => Value::Series(
            as_.into_iter()
                .zip(bs)
                .map(|(a, b)| op.apply(a, b))
                .collect(),
        ),
    })
}

fn series_arg(panel: &Panel, args: &[Argument], idx: usize) -> Result<Vec<f64>, FactorError> {
    match args.get(idx) {
        Some(Argument::Series(expr)) => Ok(eval(panel, expr)?.into_series(panel.len())),
        _ => Err(malformed_call(idx, "series")),
    }
}

fn window_arg(args: &[Argument], idx: usize) -> Result<usize, FactorError> {
    match args.get(idx) {
        Some(Argument::Window(w)) => Ok(*w),
        _ => Err(malformed_call(idx, "window")),
    }
}

fn scalar_arg(args: &[Argument], idx: usize) -> Result<f64, FactorError> {
    match args.get(idx) {
        Some(Argument::Scalar(v)) => Ok(*v),
        _ => Err(malformed_call(idx, "scalar")),
    }
}

// Only reachable with a hand-built AST; the parser checks signatures.
fn malformed_call(idx: usize, expected: &str) -> FactorError {
    FactorError::configuration(format!("operator argument {idx} must be a {expected}"))
}

fn apply_call(panel: &Panel, operator: Operator, args: &[Argument]) -> Result<Vec<f64>, FactorError> {
    let x = series_arg(panel, args, 0)?;
    match operator {
        Operator::Rank => per_cross_section(panel, &x, |s| Ok(operators::rank(s))),
        Operator::Zscore => per_cross_section(panel, &x, operators::zscore),
        Operator::Scale => per_cross_section(panel, &x, operators::scale),
        Operator::Decile => per_cross_section(panel, &x, |s| Ok(operators::decile(s))),
        Operator::Quantile => {
            let q = scalar_arg(args, 1)?;
            per_cross_section(panel, &x, |s| Ok(operators::quantile(s, q)))
        }
        Operator::Residual => {
            let y = series_arg(panel, args, 1)?;
            per_cross_section_pair(panel, &x, &y, operators::residual)
        }
        Operator::TsRank => per_history(panel, &x, operators::ts_rank, window_arg(args, 1)?),
        Operator::TsZscore => per_history(panel, &x, operators::ts_zscore, window_arg(args, 1)?),
        Operator::TsMean => per_history(panel, &x, operators::ts_mean, window_arg(args, 1)?),
        Operator::TsStdDev => per_history(panel, &x, operators::ts_std_dev, window_arg(args, 1)?),
        Operator::TsMax => per_history(panel, &x, operators::ts_max, window_arg(args, 1)?),
        Operator::TsMin => per_history(panel, &x, operators::ts_min, window_arg(args, 1)?),
        Operator::TsSum => per_history(panel, &x, operators::ts_sum, window_arg(args, 1)?),
        Operator::TsDelta => per_history(panel, &x, operators::ts_delta, window_arg(args, 1)?),
        Operator::TsReturns => per_history(panel, &x, operators::ts_returns, window_arg(args, 1)?),
        Operator::Correlation => {
            let y = series_arg(panel, args, 1)?;
            per_history_pair(panel, &x, &y, operators::correlation, window_arg(args, 2)?)
        }
        Operator::Covariance => {
            let y = series_arg(panel, args, 1)?;
            per_history_pair(panel, &x, &y, operators::covariance, window_arg(args, 2)?)
        }
    }
}

fn gather(values: &[f64], rows: &[usize]) -> Vec<f64> {
    rows.iter().map(|&r| values[r]).collect()
}

fn scatter(out: &mut [f64], rows: &[usize], group: Vec<f64>) {
    for (&row, value) in rows.iter().zip(group) {
        out[row] = value;
    }
}

fn per_cross_section<F>(panel: &Panel, values: &[f64], f: F) -> Result<Vec<f64>, FactorError>
where
    F: Fn(&[f64]) -> Result<Vec<f64>, FactorError>,
{
    let mut out = vec![f64::NAN; panel.len()];
    for section in panel.cross_sections() {
        let group = f(&gather(values, &section.rows))?;
        scatter(&mut out, &section.rows, group);
    }
    Ok(out)
}

fn per_cross_section_pair<F>(
    panel: &Panel,
    x: &[f64],
    y: &[f64],
    f: F,
) -> Result<Vec<f64>, FactorError>
where
    F: Fn(&[f64], &[f64]) -> Result<Vec<f64>, FactorError>,
{
    let mut out = vec![f64::NAN; panel.len()];
    for section in panel.cross_sections() {
        let group = f(&gather(x, &section.rows), &gather(y, &section.rows))?;
        scatter(&mut out, &section.rows, group);
    }
    Ok(out)
}

fn per_history(
    panel: &Panel,
    values: &[f64],
    f: fn(&[f64], usize) -> Vec<f64>,
    window: usize,
) -> Result<Vec<f64>, FactorError> {
    let mut out = vec![f64::NAN; panel.len()];
    for rows in panel.histories()? {
        scatter(&mut out, rows, f(&gather(values, rows), window));
    }
    Ok(out)
}

fn per_history_pair(
    panel: &Panel,
    x: &[f64],
    y: &[f64],
    f: fn(&[f64], &[f64], usize) -> Vec<f64>,
    window: usize,
) -> Result<Vec<f64>, FactorError> {
    let mut out = vec![f64::NAN; panel.len()];
    for rows in panel.histories()? {
        scatter(&mut out, rows, f(&gather(x, rows), &gather(y, rows), window));
    }
    Ok(out)
}
