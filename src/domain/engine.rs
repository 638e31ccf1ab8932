//! Day-by-day strategy driver.
//!
//! The caller owns the clock: `before_trading`, `handle_bar` and
//! `after_trading` are invoked once per trading day in that order.

use chrono::NaiveDate;

use crate::domain::config::StrategyConfig;
use crate::domain::pipeline::{
    run_rebalance_with, score_universe_at, DegeneratePolicy, RebalanceOutcome,
};
use crate::domain::position::Position;
use crate::domain::risk::{RiskController, WealthHistory};
use crate::domain::weighting::WeightVector;
use crate::ports::data_port::{DataPort, FundPort};

/// What the engine decided for one bar.
#[derive(Debug, Clone, PartialEq)]
pub struct BarDecision {
    pub date: NaiveDate,
    /// Set when a rebalance ran successfully on this bar.
    pub rebalance: Option<RebalanceOutcome>,
    pub position_ratio: f64,
    /// Current target weights scaled by `position_ratio`.
    pub targets: WeightVector,
    /// Positions to close fully.
    pub liquidations: Vec<String>,
}

pub struct StrategyEngine<'a> {
    data_port: &'a dyn DataPort,
    fund_port: &'a dyn FundPort,
    config: StrategyConfig,
    risk: RiskController,
    wealth: WealthHistory,
    day_count: u32,
    high_score: Vec<String>,
    target_weights: WeightVector,
}

impl<'a> StrategyEngine<'a> {
    pub fn new(
        data_port: &'a dyn DataPort,
        fund_port: &'a dyn FundPort,
        config: StrategyConfig,
    ) -> Self {
        tracing::info!("initializing strategy engine");
        Self {
            data_port,
            fund_port,
            risk: RiskController::new(config.risk.clone()),
            config,
            wealth: WealthHistory::default(),
            day_count: 0,
            high_score: Vec::new(),
            target_weights: WeightVector::default(),
        }
    }

    pub fn day_count(&self) -> u32 {
        self.day_count
    }

    pub fn high_score(&self) -> &[String] {
        &self.high_score
    }

    pub fn target_weights(&self) -> &WeightVector {
        &self.target_weights
    }

    pub fn wealth(&self) -> &WealthHistory {
        &self.wealth
    }

    /// Advance the day counter and refresh the high-score group on the first
    /// day of each factor-update cycle. Returns true when the group was
    /// refreshed. A failed refresh keeps the previous group.
    pub fn before_trading(&mut self, date: NaiveDate) -> bool {
        self.day_count += 1;
        let interval = self.config.schedule.factor_update_interval_days.max(1);
        if self.day_count % interval != 1 % interval {
            return false;
        }

        match score_universe_at(self.data_port, &self.config, date) {
            Ok(outcome) => {
                self.high_score = outcome.high_score;
                true
            }
            Err(err) => {
                tracing::error!(%date, %err, "factor update failed, keeping previous group");
                false
            }
        }
    }

    /// Rebalance when due, then apply the drawdown rule and the stop-loss.
    pub fn handle_bar(&mut self, date: NaiveDate, positions: &[Position]) -> BarDecision {
        let interval = self.config.schedule.rebalance_interval_days.max(1);
        let mut rebalance = None;
        if self.day_count % interval == 0 {
            match run_rebalance_with(
                self.data_port,
                self.fund_port,
                &self.config,
                date,
                &self.high_score,
                DegeneratePolicy::EqualWeight,
            ) {
                Ok(outcome) => {
                    self.target_weights = outcome.weights.clone();
                    rebalance = Some(outcome);
                }
                Err(err) => {
                    tracing::error!(%date, %err, "rebalance skipped");
                }
            }
        }

        let position_ratio = self.risk.current_position_ratio(&self.wealth);
        let liquidations = self.risk.liquidations(positions);

        BarDecision {
            date,
            rebalance,
            position_ratio,
            targets: self.target_weights.scaled(position_ratio),
            liquidations,
        }
    }

    /// Record the end-of-day portfolio valuation.
    pub fn after_trading(&mut self, total_value: f64) {
        self.wealth.record(total_value);
        tracing::debug!(day = self.day_count, total_value, "valuation recorded");
    }
}
