//! Beta estimation and the two-stage beta-ranked selection.
//!
//! Beta is the no-intercept, single-regressor least-squares slope of an
//! instrument's returns on a benchmark's returns:
//! beta = sum(x * y) / sum(x * x), x = benchmark, y = instrument.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::error::{DroppedInstrument, MispricerError};
use crate::domain::prices::PriceBar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Time-ordered returns of one instrument or one aggregate benchmark.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReturnSeries {
    pub points: Vec<ReturnPoint>,
}

impl ReturnSeries {
    pub fn new(points: Vec<ReturnPoint>) -> Self {
        Self { points }
    }

    /// Simple returns between consecutive closes, dated at the later bar.
    pub fn from_closes(code: &str, bars: &[PriceBar]) -> Result<Self, MispricerError> {
        let mut points = Vec::with_capacity(bars.len().saturating_sub(1));
        for w in bars.windows(2) {
            let (prev, curr) = (&w[0], &w[1]);
            if prev.close <= 0.0 {
                return Err(MispricerError::ZeroDenominator {
                    code: code.to_string(),
                    field: "close",
                });
            }
            let value = curr.close / prev.close - 1.0;
            if !value.is_finite() {
                return Err(MispricerError::NonFinite {
                    code: code.to_string(),
                    field: "close",
                });
            }
            points.push(ReturnPoint {
                date: curr.date(),
                value,
            });
        }
        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    fn aligned_with(&self, other: &ReturnSeries) -> bool {
        self.len() == other.len()
            && self
                .points
                .iter()
                .zip(&other.points)
                .all(|(a, b)| a.date == b.date)
    }
}

/// A named benchmark return stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Benchmark {
    pub name: String,
    pub series: ReturnSeries,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BetaEstimate {
    pub code: String,
    pub benchmark: String,
    pub beta: f64,
}

/// Outcome of one rank-and-truncate pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionResult {
    /// Selected codes, descending beta, at most `top_n`.
    pub codes: Vec<String>,
    /// Every successful fit in rank order, including those cut by `top_n`.
    pub estimates: Vec<BetaEstimate>,
    pub dropped: Vec<DroppedInstrument>,
}

impl SelectionResult {
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.iter().any(|c| c == code)
    }
}

/// Closed-form no-intercept slope of `y` on `x`.
///
/// `None` for empty or unequal inputs and when `x` is identically zero.
pub fn ols_beta(y: &[f64], x: &[f64]) -> Option<f64> {
    if x.is_empty() || x.len() != y.len() {
        return None;
    }
    let sxx: f64 = x.iter().map(|v| v * v).sum();
    if sxx == 0.0 {
        return None;
    }
    let sxy: f64 = x.iter().zip(y).map(|(a, b)| a * b).sum();
    Some(sxy / sxx)
}

fn check_benchmark(benchmark: &Benchmark) -> Result<(), MispricerError> {
    if benchmark.series.is_empty() {
        return Err(MispricerError::InsufficientData {
            code: benchmark.name.clone(),
            observations: 0,
            minimum: 1,
        });
    }
    if benchmark.series.points.iter().any(|p| !p.value.is_finite()) {
        return Err(MispricerError::NonFinite {
            code: benchmark.name.clone(),
            field: "return",
        });
    }
    if benchmark.series.points.iter().all(|p| p.value == 0.0) {
        return Err(MispricerError::DegenerateBenchmark {
            name: benchmark.name.clone(),
        });
    }
    Ok(())
}

/// Beta of one instrument against a benchmark already known to be usable.
pub fn estimate_beta(
    code: &str,
    series: &ReturnSeries,
    benchmark: &Benchmark,
) -> Result<BetaEstimate, MispricerError> {
    if series.is_empty() {
        return Err(MispricerError::InsufficientData {
            code: code.to_string(),
            observations: 0,
            minimum: 1,
        });
    }
    if !series.aligned_with(&benchmark.series) {
        return Err(MispricerError::MisalignedSeries {
            code: code.to_string(),
            expected: benchmark.series.len(),
            actual: series.len(),
        });
    }
    if series.points.iter().any(|p| !p.value.is_finite()) {
        return Err(MispricerError::NonFinite {
            code: code.to_string(),
            field: "return",
        });
    }

    let beta = ols_beta(&series.values(), &benchmark.series.values()).ok_or_else(|| {
        MispricerError::DegenerateBenchmark {
            name: benchmark.name.clone(),
        }
    })?;
    Ok(BetaEstimate {
        code: code.to_string(),
        benchmark: benchmark.name.clone(),
        beta,
    })
}

/// Fit every candidate against `benchmark`, rank by descending beta (ties by
/// ascending code), and keep the first `top_n`.
///
/// Candidates default to every key of `returns`. A candidate with no series,
/// an empty series, or a series misaligned with the benchmark is dropped and
/// reported rather than ranked.
pub fn select(
    returns: &BTreeMap<String, ReturnSeries>,
    benchmark: &Benchmark,
    top_n: usize,
    candidates: Option<&[String]>,
) -> Result<SelectionResult, MispricerError> {
    check_benchmark(benchmark)?;

    // Each code is fitted once however often it is listed.
    let pool: BTreeSet<&String> = match candidates {
        Some(codes) => codes.iter().collect(),
        None => returns.keys().collect(),
    };

    let mut estimates = Vec::with_capacity(pool.len());
    let mut dropped = Vec::new();
    let empty = ReturnSeries::default();

    for code in pool {
        let series = returns.get(code).unwrap_or(&empty);
        match estimate_beta(code, series, benchmark) {
            Ok(est) => estimates.push(est),
            Err(reason) => {
                tracing::warn!(code = %code, benchmark = %benchmark.name, %reason, "excluded from beta ranking");
                dropped.push(DroppedInstrument {
                    code: code.clone(),
                    reason,
                });
            }
        }
    }

    estimates.sort_by(|a, b| b.beta.total_cmp(&a.beta).then_with(|| a.code.cmp(&b.code)));

    let codes = estimates
        .iter()
        .take(top_n)
        .map(|e| e.code.clone())
        .collect();

    Ok(SelectionResult {
        codes,
        estimates,
        dropped,
    })
}

/// Stage 1: the whole universe against the fund-holdings benchmark.
pub fn first_stage(
    returns: &BTreeMap<String, ReturnSeries>,
    fund_benchmark: &Benchmark,
    universe: &[String],
    top_n: usize,
) -> Result<SelectionResult, MispricerError> {
    let result = select(returns, fund_benchmark, top_n, Some(universe))?;
    tracing::info!(selected = result.len(), fitted = result.estimates.len(), "first stage complete");
    Ok(result)
}

/// Stage 2: the stage-1 pool against the high-score benchmark.
pub fn second_stage(
    returns: &BTreeMap<String, ReturnSeries>,
    high_score_benchmark: &Benchmark,
    stage1: &SelectionResult,
    top_n: usize,
) -> Result<SelectionResult, MispricerError> {
    let result = select(returns, high_score_benchmark, top_n, Some(&stage1.codes))?;
    tracing::info!(selected = result.len(), pool = stage1.len(), "second stage complete");
    Ok(result)
}

/// Equal-weighted aggregate of `members` over `dates`.
///
/// Members without a series matching `dates` exactly are skipped.
pub fn equal_weight_benchmark(
    name: &str,
    dates: &[NaiveDate],
    returns: &BTreeMap<String, ReturnSeries>,
    members: &[String],
) -> Result<Benchmark, MispricerError> {
    let reference = ReturnSeries::new(
        dates
            .iter()
            .map(|&date| ReturnPoint { date, value: 0.0 })
            .collect(),
    );

    let mut sums = vec![0.0; dates.len()];
    let mut used = 0usize;
    for code in members {
        match returns.get(code) {
            Some(series) if !series.is_empty() && series.aligned_with(&reference) => {
                for (sum, p) in sums.iter_mut().zip(&series.points) {
                    *sum += p.value;
                }
                used += 1;
            }
            _ => tracing::debug!(benchmark = name, code = %code, "member skipped"),
        }
    }

    if used == 0 || dates.is_empty() {
        return Err(MispricerError::InsufficientData {
            code: name.to_string(),
            observations: 0,
            minimum: 1,
        });
    }

    let points = dates
        .iter()
        .zip(sums)
        .map(|(&date, sum)| ReturnPoint {
            date,
            value: sum / used as f64,
        })
        .collect();
    tracing::debug!(benchmark = name, members = used, "benchmark built");
    Ok(Benchmark {
        name: name.to_string(),
        series: ReturnSeries::new(points),
    })
}
