//! Configuration validation.
//!
//! Validates run config fields before a backtest starts.

use crate::domain::error::FactorError;
use crate::ports::config_port::ConfigPort;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), FactorError> {
    validate_initial_capital(config)?;
    validate_count(config, "buy_count")?;
    validate_count(config, "sell_count")?;
    Ok(())
}

pub fn validate_factor_config(config: &dyn ConfigPort) -> Result<(), FactorError> {
    require_non_empty(config, "factor", "expression")
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), FactorError> {
    require_non_empty(config, "data", "panel_path")
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> FactorError {
    FactorError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, FactorError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(FactorError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn require_non_empty(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), FactorError> {
    required(config, section, key).map(|_| ())
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), FactorError> {
    let raw = required(config, "backtest", "initial_capital")?;
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| invalid("backtest", "initial_capital", format!("'{raw}' is not a number")))?;
    if !(value.is_finite() && value > 0.0) {
        return Err(invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_count(config: &dyn ConfigPort, key: &str) -> Result<(), FactorError> {
    let raw = required(config, "backtest", key)?;
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| invalid("backtest", key, format!("'{raw}' is not an integer")))?;
    if value < 0 {
        return Err(invalid(
            "backtest",
            key,
            format!("{key} must be non-negative"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn assert_invalid(result: Result<(), FactorError>, expected_key: &str) {
        match result {
            Err(FactorError::ConfigInvalid { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected ConfigInvalid for {expected_key}, got {other:?}"),
        }
    }

    fn assert_missing(result: Result<(), FactorError>, expected_key: &str) {
        match result {
            Err(FactorError::ConfigMissing { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected ConfigMissing for {expected_key}, got {other:?}"),
        }
    }

    #[test]
    fn valid_backtest_config_passes() {
        let config = make_config(
            r#"
[backtest]
initial_capital = 100000.0
buy_count = 3
sell_count = 0
"#,
        );
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn initial_capital_must_be_positive() {
        let config = make_config("[backtest]\ninitial_capital = -5\nbuy_count = 1\nsell_count = 1\n");
        assert_invalid(validate_backtest_config(&config), "initial_capital");
    }

    #[test]
    fn initial_capital_zero_fails() {
        let config = make_config("[backtest]\ninitial_capital = 0\nbuy_count = 1\nsell_count = 1\n");
        assert_invalid(validate_backtest_config(&config), "initial_capital");
    }

    #[test]
    fn initial_capital_non_numeric_fails() {
        let config = make_config("[backtest]\ninitial_capital = lots\nbuy_count = 1\nsell_count = 1\n");
        assert_invalid(validate_backtest_config(&config), "initial_capital");
    }

    #[test]
    fn missing_initial_capital_fails() {
        let config = make_config("[backtest]\nbuy_count = 1\nsell_count = 1\n");
        assert_missing(validate_backtest_config(&config), "initial_capital");
    }

    #[test]
    fn negative_count_fails() {
        let config = make_config("[backtest]\ninitial_capital = 1000\nbuy_count = -1\nsell_count = 1\n");
        assert_invalid(validate_backtest_config(&config), "buy_count");
    }

    #[test]
    fn fractional_count_fails() {
        let config = make_config("[backtest]\ninitial_capital = 1000\nbuy_count = 1\nsell_count = 1.5\n");
        assert_invalid(validate_backtest_config(&config), "sell_count");
    }

    #[test]
    fn missing_sell_count_fails() {
        let config = make_config("[backtest]\ninitial_capital = 1000\nbuy_count = 1\n");
        assert_missing(validate_backtest_config(&config), "sell_count");
    }

    #[test]
    fn factor_expression_required() {
        assert!(validate_factor_config(&make_config("[factor]\nexpression = roe\n")).is_ok());
        assert_missing(
            validate_factor_config(&make_config("[factor]\nexpression =\n")),
            "expression",
        );
        assert_missing(validate_factor_config(&make_config("[backtest]\n")), "expression");
    }

    #[test]
    fn panel_path_required() {
        assert!(validate_data_config(&make_config("[data]\npanel_path = p.csv\n")).is_ok());
        assert_missing(validate_data_config(&make_config("[data]\n")), "panel_path");
    }
}
