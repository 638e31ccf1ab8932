//! One scoring cycle and one rebalance cycle, end to end.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::beta::{
    equal_weight_benchmark, first_stage, second_stage, ReturnSeries, SelectionResult,
};
use crate::domain::calendar::TradingCalendar;
use crate::domain::config::StrategyConfig;
use crate::domain::error::{DroppedInstrument, MispricerError};
use crate::domain::factor::{self, ScoredUniverse};
use crate::domain::fund_holdings::fund_benchmark_members;
use crate::domain::prices::BarFrequency;
use crate::domain::universe::{build_universe, Universe};
use crate::domain::weighting::{
    collect_stats, equal_weights, weights_from_stats, InstrumentStats, WeightVector,
};
use crate::ports::data_port::{DataPort, FundPort};

pub const FUND_BENCHMARK: &str = "fund_holdings";
pub const HIGH_SCORE_BENCHMARK: &str = "high_score";

#[derive(Debug, Clone)]
pub struct ScoringOutcome {
    pub date: NaiveDate,
    pub universe: Universe,
    pub scored: ScoredUniverse,
    /// Codes carrying the configured high-score label, ascending.
    pub high_score: Vec<String>,
}

/// What to do when the volatility/return weighting degenerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DegeneratePolicy {
    #[default]
    Fail,
    EqualWeight,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceOutcome {
    pub date: NaiveDate,
    pub stage1: SelectionResult,
    pub stage2: SelectionResult,
    pub weights: WeightVector,
    pub stats: Vec<InstrumentStats>,
    /// Every instrument removed anywhere in the cycle.
    pub dropped: Vec<DroppedInstrument>,
    /// Weights came from the 1/n fallback.
    pub equal_weighted: bool,
}

/// Build the universe at `date` and score its fundamentals.
pub fn score_universe_at(
    data_port: &dyn DataPort,
    config: &StrategyConfig,
    date: NaiveDate,
) -> Result<ScoringOutcome, MispricerError> {
    let universe = build_universe(data_port, date, &config.excluded_industries)?;
    let scored = factor::score(data_port, &universe.codes, date)?;
    let high_score = scored.codes_with_label(config.selection.high_score_label);
    tracing::info!(
        %date,
        label = %config.selection.high_score_label,
        members = high_score.len(),
        "high-score group selected"
    );
    Ok(ScoringOutcome {
        date,
        universe,
        scored,
        high_score,
    })
}

/// Daily return series of `codes` over the trading days in `dates`.
///
/// `dates` holds `window + 1` consecutive trading days; each series has one
/// point per day after the first. Instruments whose prices cannot be loaded
/// are dropped.
pub fn load_returns(
    data_port: &dyn DataPort,
    codes: &BTreeSet<&String>,
    dates: &[NaiveDate],
) -> (BTreeMap<String, ReturnSeries>, Vec<DroppedInstrument>) {
    let mut returns = BTreeMap::new();
    let mut dropped = Vec::new();
    let Some(&end) = dates.last() else {
        return (returns, dropped);
    };

    for &code in codes {
        let loaded = data_port
            .fetch_prices(code, BarFrequency::Daily, end, dates.len())
            .and_then(|bars| ReturnSeries::from_closes(code, &bars));
        match loaded {
            Ok(series) => {
                returns.insert(code.clone(), series);
            }
            Err(reason) => {
                tracing::warn!(code = %code, %reason, "no return series");
                dropped.push(DroppedInstrument {
                    code: code.clone(),
                    reason,
                });
            }
        }
    }
    (returns, dropped)
}

/// Rebalance at `date`, failing when the weighting degenerates.
pub fn run_rebalance(
    data_port: &dyn DataPort,
    fund_port: &dyn FundPort,
    config: &StrategyConfig,
    date: NaiveDate,
    high_score: &[String],
) -> Result<RebalanceOutcome, MispricerError> {
    run_rebalance_with(
        data_port,
        fund_port,
        config,
        date,
        high_score,
        DegeneratePolicy::Fail,
    )
}

pub fn run_rebalance_with(
    data_port: &dyn DataPort,
    fund_port: &dyn FundPort,
    config: &StrategyConfig,
    date: NaiveDate,
    high_score: &[String],
    policy: DegeneratePolicy,
) -> Result<RebalanceOutcome, MispricerError> {
    let selection = &config.selection;

    let calendar = TradingCalendar::new(data_port.trading_days(date)?);
    let needed_days = selection.beta_window_days + 1;
    let window = calendar.recent_days(date, needed_days);
    if window.len() < needed_days.max(2) {
        return Err(MispricerError::InsufficientData {
            code: "trading calendar".into(),
            observations: window.len(),
            minimum: needed_days.max(2),
        });
    }
    let return_dates = &window[1..];

    let universe = build_universe(data_port, date, &config.excluded_industries)?;
    let members = fund_benchmark_members(
        fund_port,
        &config.fund_type_map,
        &config.asset_type_map,
        date,
    )?;

    let wanted: BTreeSet<&String> = universe
        .codes
        .iter()
        .chain(&members)
        .chain(high_score)
        .collect();
    let (returns, load_failures) = load_returns(data_port, &wanted, window);

    let fund_benchmark = equal_weight_benchmark(FUND_BENCHMARK, return_dates, &returns, &members)?;
    let stage1 = first_stage(&returns, &fund_benchmark, &universe.codes, selection.num_first_stage)?;
    if stage1.is_empty() {
        return Err(MispricerError::EmptySelection {
            stage: "first stage".into(),
        });
    }

    let high_benchmark =
        equal_weight_benchmark(HIGH_SCORE_BENCHMARK, return_dates, &returns, high_score)?;
    let stage2 = second_stage(&returns, &high_benchmark, &stage1, selection.num_second_stage)?;
    if stage2.is_empty() {
        return Err(MispricerError::EmptySelection {
            stage: "second stage".into(),
        });
    }

    let (stats, weighting_dropped) = collect_stats(data_port, &stage2.codes, date, &config.weighting);
    let (weights, equal_weighted) = match weights_from_stats(&stats) {
        Ok(w) => (w, false),
        Err(MispricerError::DegenerateWeights { reason })
            if policy == DegeneratePolicy::EqualWeight && !stats.is_empty() =>
        {
            tracing::warn!(%reason, "weighting degenerate, falling back to equal weights");
            let codes: Vec<String> = stats.iter().map(|s| s.code.clone()).collect();
            (equal_weights(&codes)?, true)
        }
        Err(err) => return Err(err),
    };

    // A stage-1 drop caused by a failed price load keeps the load error.
    let load_failures: BTreeMap<String, MispricerError> = load_failures
        .into_iter()
        .map(|d| (d.code, d.reason))
        .collect();
    let mut dropped: Vec<DroppedInstrument> = stage1
        .dropped
        .iter()
        .map(|d| DroppedInstrument {
            code: d.code.clone(),
            reason: load_failures
                .get(&d.code)
                .cloned()
                .unwrap_or_else(|| d.reason.clone()),
        })
        .collect();
    dropped.extend(stage2.dropped.iter().cloned());
    dropped.extend(weighting_dropped);

    tracing::info!(
        %date,
        stage1 = stage1.len(),
        stage2 = stage2.len(),
        weighted = weights.len(),
        dropped = dropped.len(),
        equal_weighted,
        "rebalance complete"
    );
    Ok(RebalanceOutcome {
        date,
        stage1,
        stage2,
        weights,
        stats,
        dropped,
        equal_weighted,
    })
}
