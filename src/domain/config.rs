//! Strategy configuration value object.
//!
//! Built once from a [`ConfigPort`] and passed by reference to every
//! component; there is no global configuration state.

use std::collections::BTreeMap;

use crate::domain::error::MispricerError;
use crate::domain::factor::ScoreLabel;
use crate::ports::config_port::ConfigPort;

/// Capacity of the rolling wealth window used for drawdown.
pub const WEALTH_WINDOW: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    pub rebalance_interval_days: u32,
    pub factor_update_interval_days: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    pub max_drawdown_threshold: f64,
    pub min_position_ratio: f64,
    pub single_stock_stop_loss: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionConfig {
    pub num_first_stage: usize,
    pub num_second_stage: usize,
    /// Daily return observations fed to each beta regression.
    pub beta_window_days: usize,
    pub high_score_label: ScoreLabel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightingConfig {
    pub volatility_window_days: usize,
    pub bars_per_day: usize,
    pub return_window_days: usize,
    /// Use 1/n weights when the volatility/return weighting degenerates.
    pub equal_weight_fallback: bool,
}

impl WeightingConfig {
    /// Intraday bars requested for realized volatility.
    pub fn volatility_bar_count(&self) -> usize {
        self.volatility_window_days * self.bars_per_day
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub schedule: ScheduleConfig,
    pub risk: RiskConfig,
    pub selection: SelectionConfig,
    pub weighting: WeightingConfig,
    pub excluded_industries: Vec<String>,
    /// Raw fund investment type -> English category.
    pub fund_type_map: BTreeMap<String, String>,
    /// Raw holding detail type -> English category.
    pub asset_type_map: BTreeMap<String, String>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            schedule: ScheduleConfig {
                rebalance_interval_days: 20,
                factor_update_interval_days: 20,
            },
            risk: RiskConfig {
                max_drawdown_threshold: 0.08,
                min_position_ratio: 0.65,
                single_stock_stop_loss: 0.12,
            },
            selection: SelectionConfig {
                num_first_stage: 60,
                num_second_stage: 30,
                beta_window_days: 60,
                high_score_label: ScoreLabel::High,
            },
            weighting: WeightingConfig {
                volatility_window_days: 5,
                bars_per_day: 48,
                return_window_days: 20,
                equal_weight_fallback: false,
            },
            excluded_industries: vec!["T27".to_string(), "T19".to_string()],
            fund_type_map: BTreeMap::from([
                ("股票型".to_string(), "equity".to_string()),
                ("混合型".to_string(), "balanced".to_string()),
            ]),
            asset_type_map: BTreeMap::from([("股票".to_string(), "stock".to_string())]),
        }
    }
}

fn get_count(
    port: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, MispricerError> {
    let value = port.get_int(section, key, default as i64);
    usize::try_from(value).map_err(|_| MispricerError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: format!("{key} must be non-negative"),
    })
}

fn get_interval(
    port: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: u32,
) -> Result<u32, MispricerError> {
    let value = port.get_int(section, key, i64::from(default));
    u32::try_from(value).map_err(|_| MispricerError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: format!("{key} must be between 0 and {}", u32::MAX),
    })
}

impl StrategyConfig {
    /// Read every recognized key, falling back to the defaults for absent ones.
    /// Range checks live in `config_validation`.
    pub fn from_port(port: &dyn ConfigPort) -> Result<Self, MispricerError> {
        let defaults = StrategyConfig::default();

        let high_score_label = match port.get_string("selection", "high_score_label") {
            Some(raw) => raw.trim().parse::<ScoreLabel>().map_err(|reason| {
                MispricerError::ConfigInvalid {
                    section: "selection".into(),
                    key: "high_score_label".into(),
                    reason,
                }
            })?,
            None => defaults.selection.high_score_label,
        };

        let excluded_industries = match port.get_string("universe", "excluded_industries") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.excluded_industries,
        };

        let fund_type_map = section_or(port, "fund_type_map", defaults.fund_type_map);
        let asset_type_map = section_or(port, "asset_type_map", defaults.asset_type_map);

        Ok(StrategyConfig {
            schedule: ScheduleConfig {
                rebalance_interval_days: get_interval(
                    port,
                    "schedule",
                    "rebalance_interval_days",
                    defaults.schedule.rebalance_interval_days,
                )?,
                factor_update_interval_days: get_interval(
                    port,
                    "schedule",
                    "factor_update_interval_days",
                    defaults.schedule.factor_update_interval_days,
                )?,
            },
            risk: RiskConfig {
                max_drawdown_threshold: port.get_double(
                    "risk",
                    "max_drawdown_threshold",
                    defaults.risk.max_drawdown_threshold,
                ),
                min_position_ratio: port.get_double(
                    "risk",
                    "min_position_ratio",
                    defaults.risk.min_position_ratio,
                ),
                single_stock_stop_loss: port.get_double(
                    "risk",
                    "single_stock_stop_loss",
                    defaults.risk.single_stock_stop_loss,
                ),
            },
            selection: SelectionConfig {
                num_first_stage: get_count(
                    port,
                    "selection",
                    "num_first_stage",
                    defaults.selection.num_first_stage,
                )?,
                num_second_stage: get_count(
                    port,
                    "selection",
                    "num_second_stage",
                    defaults.selection.num_second_stage,
                )?,
                beta_window_days: get_count(
                    port,
                    "selection",
                    "beta_window_days",
                    defaults.selection.beta_window_days,
                )?,
                high_score_label,
            },
            weighting: WeightingConfig {
                volatility_window_days: get_count(
                    port,
                    "weighting",
                    "volatility_window_days",
                    defaults.weighting.volatility_window_days,
                )?,
                bars_per_day: get_count(
                    port,
                    "weighting",
                    "bars_per_day",
                    defaults.weighting.bars_per_day,
                )?,
                return_window_days: get_count(
                    port,
                    "weighting",
                    "return_window_days",
                    defaults.weighting.return_window_days,
                )?,
                equal_weight_fallback: port.get_bool(
                    "weighting",
                    "equal_weight_fallback",
                    defaults.weighting.equal_weight_fallback,
                ),
            },
            excluded_industries,
            fund_type_map,
            asset_type_map,
        })
    }
}

fn section_or(
    port: &dyn ConfigPort,
    section: &str,
    default: BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let entries = port.get_section(section);
    if entries.is_empty() {
        default
    } else {
        entries.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    #[test]
    fn defaults_match_reference_constants() {
        let c = StrategyConfig::default();
        assert_eq!(c.schedule.rebalance_interval_days, 20);
        assert_eq!(c.schedule.factor_update_interval_days, 20);
        assert_eq!(c.risk.max_drawdown_threshold, 0.08);
        assert_eq!(c.risk.min_position_ratio, 0.65);
        assert_eq!(c.risk.single_stock_stop_loss, 0.12);
        assert_eq!(c.selection.num_first_stage, 60);
        assert_eq!(c.selection.num_second_stage, 30);
        assert_eq!(c.weighting.volatility_bar_count(), 240);
        assert_eq!(c.fund_type_map.get("股票型").map(String::as_str), Some("equity"));
    }

    #[test]
    fn empty_config_yields_defaults() {
        let adapter = FileConfigAdapter::from_string("[schedule]\n").unwrap();
        let c = StrategyConfig::from_port(&adapter).unwrap();
        assert_eq!(c, StrategyConfig::default());
    }

    #[test]
    fn overrides_are_read() {
        let ini = r#"
[schedule]
rebalance_interval_days = 10

[risk]
max_drawdown_threshold = 0.1
single_stock_stop_loss = 0.05

[selection]
num_first_stage = 40
num_second_stage = 10
high_score_label = mid_high

[weighting]
equal_weight_fallback = yes

[universe]
excluded_industries = t27, J66

[fund_type_map]
股票型 = equity
"#;
        let adapter = FileConfigAdapter::from_string(ini).unwrap();
        let c = StrategyConfig::from_port(&adapter).unwrap();
        assert_eq!(c.schedule.rebalance_interval_days, 10);
        assert_eq!(c.risk.max_drawdown_threshold, 0.1);
        assert_eq!(c.risk.single_stock_stop_loss, 0.05);
        assert_eq!(c.risk.min_position_ratio, 0.65);
        assert_eq!(c.selection.num_first_stage, 40);
        assert_eq!(c.selection.high_score_label, ScoreLabel::MidHigh);
        assert!(c.weighting.equal_weight_fallback);
        assert_eq!(c.excluded_industries, vec!["T27", "J66"]);
        assert_eq!(c.fund_type_map.len(), 1);
    }

    #[test]
    fn unknown_label_is_rejected() {
        let adapter =
            FileConfigAdapter::from_string("[selection]\nhigh_score_label = top\n").unwrap();
        let err = StrategyConfig::from_port(&adapter).unwrap_err();
        assert!(matches!(err, MispricerError::ConfigInvalid { ref key, .. } if key == "high_score_label"));
    }

    #[test]
    fn oversized_interval_is_rejected() {
        let adapter = FileConfigAdapter::from_string(
            "[schedule]\nrebalance_interval_days = 4294967297\n",
        )
        .unwrap();
        let err = StrategyConfig::from_port(&adapter).unwrap_err();
        assert!(
            matches!(err, MispricerError::ConfigInvalid { ref key, .. } if key == "rebalance_interval_days")
        );

        let adapter =
            FileConfigAdapter::from_string("[schedule]\nfactor_update_interval_days = -1\n").unwrap();
        assert!(StrategyConfig::from_port(&adapter).is_err());
    }

    #[test]
    fn negative_count_is_rejected() {
        let adapter =
            FileConfigAdapter::from_string("[selection]\nnum_first_stage = -3\n").unwrap();
        assert!(StrategyConfig::from_port(&adapter).is_err());
    }
}
