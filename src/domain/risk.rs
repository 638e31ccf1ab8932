//! Drawdown-based exposure scaling and per-position stop-loss.

use std::collections::VecDeque;

use crate::domain::config::{RiskConfig, WEALTH_WINDOW};
use crate::domain::position::Position;

/// Bounded FIFO of portfolio valuations; the oldest entry is evicted once
/// `capacity` is exceeded.
#[derive(Debug, Clone, PartialEq)]
pub struct WealthHistory {
    values: VecDeque<f64>,
    capacity: usize,
}

impl Default for WealthHistory {
    fn default() -> Self {
        Self::with_capacity(WEALTH_WINDOW)
    }
}

impl WealthHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity + 1),
            capacity: capacity.max(1),
        }
    }

    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let mut history = Self::default();
        for v in values {
            history.record(v);
        }
        history
    }

    /// Append a valuation. Non-finite valuations are skipped so they never
    /// reach the drawdown rule.
    pub fn record(&mut self, valuation: f64) {
        if !valuation.is_finite() {
            tracing::warn!(valuation, "non-finite valuation ignored");
            return;
        }
        self.values.push_back(valuation);
        while self.values.len() > self.capacity {
            self.values.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    pub fn peak(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::max)
    }

    /// Fewer than two observations: no drawdown is defined yet.
    pub fn has_sufficient_history(&self) -> bool {
        self.values.len() >= 2
    }

    /// 1 - current / peak over the window. `None` while history is
    /// insufficient, the peak is not positive or the result is not finite.
    pub fn drawdown(&self) -> Option<f64> {
        if !self.has_sufficient_history() {
            return None;
        }
        let peak = self.peak()?;
        let current = self.latest()?;
        if !(peak > 0.0 && peak.is_finite() && current.is_finite()) {
            return None;
        }
        Some(1.0 - current / peak).filter(|dd| dd.is_finite())
    }
}

#[derive(Debug, Clone)]
pub struct RiskController {
    config: RiskConfig,
}

impl RiskController {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// 1.0 below the drawdown threshold, otherwise 1 - drawdown floored at
    /// the minimum position ratio.
    pub fn position_ratio(&self, drawdown: f64) -> f64 {
        if drawdown < self.config.max_drawdown_threshold {
            1.0
        } else {
            self.config.min_position_ratio.max(1.0 - drawdown)
        }
    }

    /// Position ratio for the current wealth window; full exposure while the
    /// history is insufficient.
    pub fn current_position_ratio(&self, history: &WealthHistory) -> f64 {
        match history.drawdown() {
            Some(dd) => {
                let ratio = self.position_ratio(dd);
                if ratio < 1.0 {
                    tracing::info!(drawdown = dd, ratio, "exposure reduced by drawdown rule");
                }
                ratio
            }
            None => 1.0,
        }
    }

    /// True when the loss on cost reaches the stop-loss percentage.
    pub fn stop_loss(&self, avg_cost: f64, current_price: f64) -> bool {
        if avg_cost <= 0.0 {
            return false;
        }
        (current_price - avg_cost) / avg_cost <= -self.config.single_stock_stop_loss
    }

    /// Codes of positions to liquidate fully this bar.
    pub fn liquidations(&self, positions: &[Position]) -> Vec<String> {
        positions
            .iter()
            .filter(|p| self.stop_loss(p.avg_cost, p.current_price))
            .inspect(|p| {
                tracing::info!(code = %p.code, cost = p.avg_cost, price = p.current_price, "stop loss triggered")
            })
            .map(|p| p.code.clone())
            .collect()
    }
}
