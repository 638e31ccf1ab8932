//! Configuration validation.
//!
//! Range checks on a parsed [`StrategyConfig`], run before any cycle starts.

use crate::domain::config::StrategyConfig;
use crate::domain::error::MispricerError;
use crate::domain::fund_holdings::STOCK_CATEGORY;
use crate::ports::config_port::ConfigPort;

/// Parse and validate in one step.
pub fn load_strategy_config(config: &dyn ConfigPort) -> Result<StrategyConfig, MispricerError> {
    let strategy = StrategyConfig::from_port(config)?;
    validate_strategy_config(&strategy)?;
    Ok(strategy)
}

pub fn validate_strategy_config(config: &StrategyConfig) -> Result<(), MispricerError> {
    validate_schedule(config)?;
    validate_risk(config)?;
    validate_selection(config)?;
    validate_weighting(config)?;
    validate_type_maps(config)?;
    Ok(())
}

/// The `[data]` section needed by file-backed runs.
pub fn validate_data_config(config: &dyn ConfigPort) -> Result<String, MispricerError> {
    match config.get_string("data", "path") {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(MispricerError::ConfigMissing {
            section: "data".to_string(),
            key: "path".to_string(),
        }),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> MispricerError {
    MispricerError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_schedule(config: &StrategyConfig) -> Result<(), MispricerError> {
    if config.schedule.rebalance_interval_days < 1 {
        return Err(invalid(
            "schedule",
            "rebalance_interval_days",
            "rebalance_interval_days must be at least 1",
        ));
    }
    if config.schedule.factor_update_interval_days < 1 {
        return Err(invalid(
            "schedule",
            "factor_update_interval_days",
            "factor_update_interval_days must be at least 1",
        ));
    }
    Ok(())
}

fn validate_risk(config: &StrategyConfig) -> Result<(), MispricerError> {
    let risk = &config.risk;
    if !(risk.max_drawdown_threshold > 0.0 && risk.max_drawdown_threshold < 1.0) {
        return Err(invalid(
            "risk",
            "max_drawdown_threshold",
            "max_drawdown_threshold must be between 0 and 1",
        ));
    }
    if !(risk.min_position_ratio > 0.0 && risk.min_position_ratio <= 1.0) {
        return Err(invalid(
            "risk",
            "min_position_ratio",
            "min_position_ratio must be in (0, 1]",
        ));
    }
    if !(risk.single_stock_stop_loss > 0.0 && risk.single_stock_stop_loss < 1.0) {
        return Err(invalid(
            "risk",
            "single_stock_stop_loss",
            "single_stock_stop_loss must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_selection(config: &StrategyConfig) -> Result<(), MispricerError> {
    let sel = &config.selection;
    if sel.num_first_stage < 1 {
        return Err(invalid(
            "selection",
            "num_first_stage",
            "num_first_stage must be at least 1",
        ));
    }
    if sel.num_second_stage < 1 {
        return Err(invalid(
            "selection",
            "num_second_stage",
            "num_second_stage must be at least 1",
        ));
    }
    if sel.num_second_stage > sel.num_first_stage {
        return Err(invalid(
            "selection",
            "num_second_stage",
            "num_second_stage must not exceed num_first_stage",
        ));
    }
    if sel.beta_window_days < 1 {
        return Err(invalid(
            "selection",
            "beta_window_days",
            "beta_window_days must be at least 1",
        ));
    }
    Ok(())
}

fn validate_weighting(config: &StrategyConfig) -> Result<(), MispricerError> {
    let w = &config.weighting;
    for (key, value) in [
        ("volatility_window_days", w.volatility_window_days),
        ("bars_per_day", w.bars_per_day),
        ("return_window_days", w.return_window_days),
    ] {
        if value < 1 {
            return Err(invalid("weighting", key, &format!("{key} must be at least 1")));
        }
    }
    Ok(())
}

fn validate_type_maps(config: &StrategyConfig) -> Result<(), MispricerError> {
    if config.fund_type_map.is_empty() {
        return Err(MispricerError::ConfigMissing {
            section: "fund_type_map".to_string(),
            key: "*".to_string(),
        });
    }
    if !config.asset_type_map.values().any(|v| v == STOCK_CATEGORY) {
        return Err(invalid(
            "asset_type_map",
            "*",
            "no holding type maps to the stock category",
        ));
    }
    Ok(())
}
