//! Factor expression AST.
//!
//! A closed set of node kinds:
//! - `Literal`: numeric constant
//! - `Column`: reference to a numeric panel column
//! - `Unary` / `Binary`: arithmetic
//! - `Call`: operator from the registry with typed arguments

use std::collections::BTreeSet;
use std::fmt;

use crate::domain::operator::{Operator, OperatorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
        }
    }

    pub fn apply(self, left: f64, right: f64) -> f64 {
        match self {
            BinaryOp::Add => left + right,
            BinaryOp::Sub => left - right,
            BinaryOp::Mul => left * right,
            BinaryOp::Div => left / right,
        }
    }
}

/// Operator argument, already checked against the operator's signature.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Series(Expr),
    Window(usize),
    Scalar(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(f64),
    Column {
        name: String,
        position: usize,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        operator: Operator,
        args: Vec<Argument>,
    },
}

impl Expr {
    /// Column references in first-appearance order, with their source positions.
    pub fn columns(&self) -> Vec<(&str, usize)> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<(&'a str, usize)>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Column { name, position } => out.push((name.as_str(), *position)),
            Expr::Unary { operand, .. } => operand.collect_columns(out),
            Expr::Binary { left, right, .. } => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    if let Argument::Series(expr) = arg {
                        expr.collect_columns(out);
                    }
                }
            }
        }
    }

    /// Distinct operators used anywhere in the expression.
    pub fn operators(&self) -> BTreeSet<&'static str> {
        let mut out = BTreeSet::new();
        self.collect_operators(&mut out);
        out
    }

    fn collect_operators(&self, out: &mut BTreeSet<&'static str>) {
        match self {
            Expr::Literal(_) | Expr::Column { .. } => {}
            Expr::Unary { operand, .. } => operand.collect_operators(out),
            Expr::Binary { left, right, .. } => {
                left.collect_operators(out);
                right.collect_operators(out);
            }
            Expr::Call { operator, args } => {
                out.insert(operator.name());
                for arg in args {
                    if let Argument::Series(expr) = arg {
                        expr.collect_operators(out);
                    }
                }
            }
        }
    }

    /// True if any time-series operator appears in the tree.
    pub fn needs_time_axis(&self) -> bool {
        match self {
            Expr::Literal(_) | Expr::Column { .. } => false,
            Expr::Unary { operand, .. } => operand.needs_time_axis(),
            Expr::Binary { left, right, .. } => left.needs_time_axis() || right.needs_time_axis(),
            Expr::Call { operator, args } => {
                operator.kind() == OperatorKind::TimeSeries
                    || args.iter().any(|arg| match arg {
                        Argument::Series(expr) => expr.needs_time_axis(),
                        _ => false,
                    })
            }
        }
    }
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Series(expr) => write!(f, "{}", expr),
            Argument::Window(w) => write!(f, "{}", w),
            Argument::Scalar(v) => write!(f, "{}", v),
        }
    }
}

/// Fully parenthesized rendering, so the tree shape is visible.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(v) => write!(f, "{}", v),
            Expr::Column { name, .. } => write!(f, "{}", name),
            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => write!(f, "(-{})", operand),
            Expr::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expr::Call { operator, args } => {
                let parts: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", operator, parts.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, position: usize) -> Expr {
        Expr::Column {
            name: name.into(),
            position,
        }
    }

    fn sample() -> Expr {
        // ts_rank(scale(close - open), 20)
        Expr::Call {
            operator: Operator::TsRank,
            args: vec![
                Argument::Series(Expr::Call {
                    operator: Operator::Scale,
                    args: vec![Argument::Series(Expr::Binary {
                        op: BinaryOp::Sub,
                        left: Box::new(col("close", 14)),
                        right: Box::new(col("open", 22)),
                    })],
                }),
                Argument::Window(20),
            ],
        }
    }

    #[test]
    fn display_is_parenthesized() {
        assert_eq!(sample().to_string(), "ts_rank(scale((close - open)), 20)");
        let neg = Expr::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(Expr::Literal(2.5)),
        };
        assert_eq!(neg.to_string(), "(-2.5)");
    }

    #[test]
    fn columns_in_order() {
        assert_eq!(sample().columns(), vec![("close", 14), ("open", 22)]);
    }

    #[test]
    fn operators_collected() {
        let ops: Vec<&str> = sample().operators().into_iter().collect();
        assert_eq!(ops, vec!["scale", "ts_rank"]);
    }

    #[test]
    fn time_axis_detection() {
        assert!(sample().needs_time_axis());
        let cross = Expr::Call {
            operator: Operator::Rank,
            args: vec![Argument::Series(col("close", 5))],
        };
        assert!(!cross.needs_time_axis());
        assert!(!Expr::Literal(1.0).needs_time_axis());
    }

    #[test]
    fn binary_apply() {
        assert_eq!(BinaryOp::Add.apply(2.0, 3.0), 5.0);
        assert_eq!(BinaryOp::Sub.apply(2.0, 3.0), -1.0);
        assert_eq!(BinaryOp::Mul.apply(2.0, 3.0), 6.0);
        assert_eq!(BinaryOp::Div.apply(3.0, 2.0), 1.5);
    }
}
