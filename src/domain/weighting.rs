//! Capital weights from realized volatility and trailing return.
//!
//! raw_i = vol_i * corr_rank * pct_rank(cum_return)_i, normalized to sum to 1.
//! `corr_rank` is the percentile rank of the volatility/return correlation
//! within the first column of their 2x2 correlation matrix, so one scalar is
//! shared by every instrument of the cross-section.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::domain::config::WeightingConfig;
use crate::domain::error::{DroppedInstrument, MispricerError};
use crate::domain::prices::BarFrequency;
use crate::domain::rank::{pearson_correlation, percentile_rank};
use crate::ports::data_port::DataPort;

/// Target weight per instrument.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeightVector {
    pub weights: BTreeMap<String, f64>,
}

impl WeightVector {
    pub fn get(&self, code: &str) -> Option<f64> {
        self.weights.get(code).copied()
    }

    pub fn sum(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Every weight multiplied by `ratio`, e.g. a drawdown position ratio.
    pub fn scaled(&self, ratio: f64) -> WeightVector {
        WeightVector {
            weights: self
                .weights
                .iter()
                .map(|(c, w)| (c.clone(), w * ratio))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentStats {
    pub code: String,
    pub volatility: f64,
    pub cumulative_return: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeightingOutcome {
    pub weights: WeightVector,
    pub stats: Vec<InstrumentStats>,
    pub dropped: Vec<DroppedInstrument>,
}

/// Square root of the summed squared log returns of `closes`.
pub fn realized_volatility(code: &str, closes: &[f64]) -> Result<f64, MispricerError> {
    if closes.len() < 2 {
        return Err(MispricerError::InsufficientData {
            code: code.to_string(),
            observations: closes.len(),
            minimum: 2,
        });
    }
    if closes.iter().any(|&c| !(c > 0.0 && c.is_finite())) {
        return Err(MispricerError::NonFinite {
            code: code.to_string(),
            field: "close",
        });
    }
    let sum_sq: f64 = closes
        .windows(2)
        .map(|w| {
            let r = (w[1] / w[0]).ln();
            r * r
        })
        .sum();
    Ok(sum_sq.sqrt())
}

/// last / first - 1 over `closes`.
pub fn cumulative_return(code: &str, closes: &[f64]) -> Result<f64, MispricerError> {
    let (first, last) = match (closes.first(), closes.last()) {
        (Some(&f), Some(&l)) => (f, l),
        _ => {
            return Err(MispricerError::InsufficientData {
                code: code.to_string(),
                observations: 0,
                minimum: 1,
            });
        }
    };
    if first == 0.0 {
        return Err(MispricerError::ZeroDenominator {
            code: code.to_string(),
            field: "close",
        });
    }
    let r = last / first - 1.0;
    if !r.is_finite() {
        return Err(MispricerError::NonFinite {
            code: code.to_string(),
            field: "close",
        });
    }
    Ok(r)
}

/// Percentile rank of the volatility/return correlation within the first
/// column `[1, rho]` of the correlation matrix.
pub fn correlation_rank(stats: &[InstrumentStats]) -> Result<f64, MispricerError> {
    let vols: Vec<f64> = stats.iter().map(|s| s.volatility).collect();
    let rets: Vec<f64> = stats.iter().map(|s| s.cumulative_return).collect();
    let rho = pearson_correlation(&vols, &rets).ok_or_else(|| MispricerError::DegenerateWeights {
        reason: format!(
            "volatility/return correlation undefined over {} instruments",
            stats.len()
        ),
    })?;
    Ok(percentile_rank(&[1.0, rho])[1])
}

/// Combine per-instrument statistics into a normalized weight vector.
pub fn weights_from_stats(stats: &[InstrumentStats]) -> Result<WeightVector, MispricerError> {
    if stats.is_empty() {
        return Err(MispricerError::EmptySelection {
            stage: "weighting".into(),
        });
    }

    let corr_rank = correlation_rank(stats)?;
    let rets: Vec<f64> = stats.iter().map(|s| s.cumulative_return).collect();
    let ret_ranks = percentile_rank(&rets);

    let raw: Vec<f64> = stats
        .iter()
        .zip(&ret_ranks)
        .map(|(s, r)| s.volatility * corr_rank * r)
        .collect();
    if let Some(i) = raw.iter().position(|w| !w.is_finite() || *w < 0.0) {
        return Err(MispricerError::DegenerateWeights {
            reason: format!("raw weight of {} is {}", stats[i].code, raw[i]),
        });
    }

    let total: f64 = raw.iter().sum();
    if total == 0.0 {
        return Err(MispricerError::DegenerateWeights {
            reason: "raw weights sum to zero".into(),
        });
    }

    Ok(WeightVector {
        weights: stats
            .iter()
            .zip(raw)
            .map(|(s, w)| (s.code.clone(), w / total))
            .collect(),
    })
}

/// 1/n over `codes`; the fallback a caller applies when weighting degenerates.
pub fn equal_weights(codes: &[String]) -> Result<WeightVector, MispricerError> {
    if codes.is_empty() {
        return Err(MispricerError::EmptySelection {
            stage: "weighting".into(),
        });
    }
    let w = 1.0 / codes.len() as f64;
    Ok(WeightVector {
        weights: codes.iter().map(|c| (c.clone(), w)).collect(),
    })
}

/// Per-instrument statistics for `selection`. Instruments whose prices cannot
/// be fetched or summarized are dropped and reported.
pub fn collect_stats(
    data_port: &dyn DataPort,
    selection: &[String],
    date: NaiveDate,
    config: &WeightingConfig,
) -> (Vec<InstrumentStats>, Vec<DroppedInstrument>) {
    let mut stats = Vec::with_capacity(selection.len());
    let mut dropped = Vec::new();

    for code in selection {
        match instrument_stats(data_port, code, date, config) {
            Ok(s) => stats.push(s),
            Err(reason) => {
                tracing::warn!(code = %code, %reason, "dropped from weighting");
                dropped.push(DroppedInstrument {
                    code: code.clone(),
                    reason,
                });
            }
        }
    }
    (stats, dropped)
}

/// Fetch prices for `selection` and weight it. Instruments without usable
/// prices are dropped; the remaining weights still sum to 1.
pub fn compute_weights(
    data_port: &dyn DataPort,
    selection: &[String],
    date: NaiveDate,
    config: &WeightingConfig,
) -> Result<WeightingOutcome, MispricerError> {
    let (stats, dropped) = collect_stats(data_port, selection, date, config);
    let weights = weights_from_stats(&stats)?;
    tracing::info!(%date, instruments = weights.len(), dropped = dropped.len(), "weights computed");
    Ok(WeightingOutcome {
        weights,
        stats,
        dropped,
    })
}

fn instrument_stats(
    data_port: &dyn DataPort,
    code: &str,
    date: NaiveDate,
    config: &WeightingConfig,
) -> Result<InstrumentStats, MispricerError> {
    let intraday: Vec<f64> = data_port
        .fetch_prices(code, BarFrequency::Minute5, date, config.volatility_bar_count())?
        .into_iter()
        .map(|b| b.close)
        .collect();
    let daily: Vec<f64> = data_port
        .fetch_prices(code, BarFrequency::Daily, date, config.return_window_days)?
        .into_iter()
        .map(|b| b.close)
        .collect();

    Ok(InstrumentStats {
        code: code.to_string(),
        volatility: realized_volatility(code, &intraday)?,
        cumulative_return: cumulative_return(code, &daily)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn stats(code: &str, volatility: f64, cumulative_return: f64) -> InstrumentStats {
        InstrumentStats {
            code: code.into(),
            volatility,
            cumulative_return,
        }
    }

    #[test]
    fn volatility_is_root_sum_of_squares() {
        let closes = [100.0, 110.0, 99.0];
        let r1 = (110.0f64 / 100.0).ln();
        let r2 = (99.0f64 / 110.0).ln();
        let expected = (r1 * r1 + r2 * r2).sqrt();
        assert_relative_eq!(realized_volatility("A", &closes).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn volatility_needs_two_bars() {
        assert!(matches!(
            realized_volatility("A", &[100.0]),
            Err(MispricerError::InsufficientData { minimum: 2, .. })
        ));
        assert!(realized_volatility("A", &[100.0, 0.0]).is_err());
    }

    #[test]
    fn cumulative_return_last_over_first() {
        assert_relative_eq!(
            cumulative_return("A", &[50.0, 40.0, 60.0]).unwrap(),
            0.2,
            epsilon = 1e-12
        );
        assert!(cumulative_return("A", &[]).is_err());
        assert!(cumulative_return("A", &[0.0, 1.0]).is_err());
    }

    #[test]
    fn correlation_rank_is_half_below_perfect() {
        let s = vec![stats("A", 0.1, 0.05), stats("B", 0.2, -0.01), stats("C", 0.3, 0.02)];
        assert_relative_eq!(correlation_rank(&s).unwrap(), 0.5);
    }

    #[test]
    fn correlation_rank_perfect_positive_ties() {
        let s = vec![stats("A", 1.0, 2.0), stats("B", 3.0, 6.0)];
        assert_relative_eq!(correlation_rank(&s).unwrap(), 0.75);
    }

    #[test]
    fn weights_sum_to_one() {
        let s = vec![
            stats("A", 0.10, 0.05),
            stats("B", 0.20, -0.01),
            stats("C", 0.30, 0.02),
            stats("D", 0.15, 0.10),
        ];
        let w = weights_from_stats(&s).unwrap();
        assert_eq!(w.len(), 4);
        assert_relative_eq!(w.sum(), 1.0, epsilon = 1e-12);
        // raw: A 0.10*0.75, B 0.20*0.25, C 0.30*0.5, D 0.15*1.0 (times 0.5)
        let total = 0.075 + 0.05 + 0.15 + 0.15;
        assert_relative_eq!(w.get("A").unwrap(), 0.075 / total, epsilon = 1e-12);
        assert_relative_eq!(w.get("D").unwrap(), 0.15 / total, epsilon = 1e-12);
        assert!(w.weights.values().all(|&x| x >= 0.0));
    }

    #[test]
    fn zero_volatility_everywhere_is_degenerate() {
        let s = vec![stats("A", 0.0, 0.05), stats("B", 0.0, -0.01)];
        let err = weights_from_stats(&s).unwrap_err();
        assert!(matches!(err, MispricerError::DegenerateWeights { .. }));
    }

    #[test]
    fn single_instrument_is_degenerate() {
        let err = weights_from_stats(&[stats("A", 0.2, 0.05)]).unwrap_err();
        assert!(matches!(err, MispricerError::DegenerateWeights { .. }));
    }

    #[test]
    fn empty_selection_is_reported() {
        assert!(matches!(
            weights_from_stats(&[]),
            Err(MispricerError::EmptySelection { .. })
        ));
        assert!(equal_weights(&[]).is_err());
    }

    #[test]
    fn equal_weight_fallback() {
        let codes = vec!["A".to_string(), "B".to_string(), "C".to_string(), "D".to_string()];
        let w = equal_weights(&codes).unwrap();
        assert_relative_eq!(w.get("C").unwrap(), 0.25);
        assert_relative_eq!(w.sum(), 1.0);
    }

    #[test]
    fn scaled_weights() {
        let codes = vec!["A".to_string(), "B".to_string()];
        let w = equal_weights(&codes).unwrap().scaled(0.8);
        assert_relative_eq!(w.sum(), 0.8);
    }
}
