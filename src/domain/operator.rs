//! Operator registry.
//!
//! The closed set of operator names an expression may call, each with a typed
//! signature. The parser consults [`Operator::from_name`] and
//! [`Operator::signature`] while building the AST, so an unknown name or a
//! wrong argument shape never reaches evaluation.

use std::fmt;

/// Bumped whenever an operator is added or its semantics change.
pub const REGISTRY_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Rank,
    Zscore,
    Scale,
    Decile,
    Quantile,
    TsRank,
    TsZscore,
    TsMean,
    TsStdDev,
    TsMax,
    TsMin,
    TsSum,
    TsDelta,
    TsReturns,
    Correlation,
    Covariance,
    Residual,
}

/// Whether an operator works across instruments or along one instrument's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    CrossSectional,
    TimeSeries,
}

/// Shape of a single operator argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Any sub-expression.
    Series,
    /// Positive integer literal.
    Window,
    /// Numeric literal.
    Scalar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub kind: OperatorKind,
    pub params: &'static [ParamKind],
}

impl Signature {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

use ParamKind::{Scalar, Series, Window};

const UNARY: &[ParamKind] = &[Series];
const WINDOWED: &[ParamKind] = &[Series, Window];
const PAIR: &[ParamKind] = &[Series, Series];
const PAIR_WINDOWED: &[ParamKind] = &[Series, Series, Window];
const THRESHOLD: &[ParamKind] = &[Series, Scalar];

impl Operator {
    pub const ALL: [Operator; 17] = [
        Operator::Rank,
        Operator::Zscore,
        Operator::Scale,
        Operator::Decile,
        Operator::Quantile,
        Operator::TsRank,
        Operator::TsZscore,
        Operator::TsMean,
        Operator::TsStdDev,
        Operator::TsMax,
        Operator::TsMin,
        Operator::TsSum,
        Operator::TsDelta,
        Operator::TsReturns,
        Operator::Correlation,
        Operator::Covariance,
        Operator::Residual,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operator::Rank => "rank",
            Operator::Zscore => "zscore",
            Operator::Scale => "scale",
            Operator::Decile => "decile",
            Operator::Quantile => "quantile",
            Operator::TsRank => "ts_rank",
            Operator::TsZscore => "ts_zscore",
            Operator::TsMean => "ts_mean",
            Operator::TsStdDev => "ts_std_dev",
            Operator::TsMax => "ts_max",
            Operator::TsMin => "ts_min",
            Operator::TsSum => "ts_sum",
            Operator::TsDelta => "ts_delta",
            Operator::TsReturns => "ts_returns",
            Operator::Correlation => "correlation",
            Operator::Covariance => "covariance",
            Operator::Residual => "residual",
        }
    }

    /// Case-sensitive lookup.
    pub fn from_name(name: &str) -> Option<Operator> {
        Operator::ALL.into_iter().find(|op| op.name() == name)
    }

    pub fn is_reserved(name: &str) -> bool {
        Operator::from_name(name).is_some()
    }

    pub fn signature(self) -> Signature {
        let (kind, params) = match self {
            Operator::Rank | Operator::Zscore | Operator::Scale | Operator::Decile => {
                (OperatorKind::CrossSectional, UNARY)
            }
            Operator::Quantile => (OperatorKind::CrossSectional, THRESHOLD),
            Operator::Residual => (OperatorKind::CrossSectional, PAIR),
            Operator::TsRank
            | Operator::TsZscore
            | Operator::TsMean
            | Operator::TsStdDev
            | Operator::TsMax
            | Operator::TsMin
            | Operator::TsSum
            | Operator::TsDelta
            | Operator::TsReturns => (OperatorKind::TimeSeries, WINDOWED),
            Operator::Correlation | Operator::Covariance => {
                (OperatorKind::TimeSeries, PAIR_WINDOWED)
            }
        };
        Signature { kind, params }
    }

    pub fn kind(self) -> OperatorKind {
        self.signature().kind
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Series => write!(f, "series"),
            ParamKind::Window => write!(f, "window"),
            ParamKind::Scalar => write!(f, "scalar"),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.params.iter().map(|p| p.to_string()).collect();
        write!(f, "({})", params.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_round_trip() {
        for op in Operator::ALL {
            assert_eq!(Operator::from_name(op.name()), Some(op));
        }
    }

    #[test]
    fn names_are_unique() {
        let names: HashSet<&str> = Operator::ALL.iter().map(|op| op.name()).collect();
        assert_eq!(names.len(), Operator::ALL.len());
    }

    #[test]
    fn lookup_is_case_sensitive() {
        assert_eq!(Operator::from_name("rank"), Some(Operator::Rank));
        assert_eq!(Operator::from_name("RANK"), None);
        assert_eq!(Operator::from_name("Ts_Mean"), None);
    }

    #[test]
    fn unknown_names_are_not_reserved() {
        assert!(!Operator::is_reserved("close"));
        assert!(!Operator::is_reserved("eval"));
        assert!(Operator::is_reserved("ts_sum"));
    }

    #[test]
    fn signatures() {
        assert_eq!(Operator::Rank.signature().arity(), 1);
        assert_eq!(Operator::Quantile.signature().params, &[Series, Scalar]);
        assert_eq!(Operator::TsRank.signature().params, &[Series, Window]);
        assert_eq!(
            Operator::Correlation.signature().params,
            &[Series, Series, Window]
        );
        assert_eq!(Operator::Residual.signature().params, &[Series, Series]);
    }

    #[test]
    fn kinds() {
        assert_eq!(Operator::Zscore.kind(), OperatorKind::CrossSectional);
        assert_eq!(Operator::Residual.kind(), OperatorKind::CrossSectional);
        assert_eq!(Operator::TsDelta.kind(), OperatorKind::TimeSeries);
        assert_eq!(Operator::Covariance.kind(), OperatorKind::TimeSeries);
    }

    #[test]
    fn signature_display() {
        assert_eq!(
            Operator::Covariance.signature().to_string(),
            "(series, series, window)"
        );
    }
}
