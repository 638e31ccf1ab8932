//! Composite mispricing score.
//!
//! Each of the eight fundamental factors is percentile-ranked across the
//! scored universe, the ranks are averaged into a composite score, and the
//! composite is cut into five equal-frequency label groups. Everything is
//! recomputed from the snapshot on every call.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::{DroppedInstrument, MispricerError};
use crate::domain::fundamentals::{FundamentalRecord, RawFactors};
use crate::domain::rank::{percentile_rank, quantile_bins};
use crate::ports::data_port::DataPort;

/// Ordered score groups, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScoreLabel {
    Low,
    MidLow,
    Mid,
    MidHigh,
    High,
}

impl ScoreLabel {
    pub const ALL: [ScoreLabel; 5] = [
        ScoreLabel::Low,
        ScoreLabel::MidLow,
        ScoreLabel::Mid,
        ScoreLabel::MidHigh,
        ScoreLabel::High,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreLabel::Low => "low",
            ScoreLabel::MidLow => "mid_low",
            ScoreLabel::Mid => "mid",
            ScoreLabel::MidHigh => "mid_high",
            ScoreLabel::High => "high",
        }
    }
}

impl fmt::Display for ScoreLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoreLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScoreLabel::ALL
            .into_iter()
            .find(|l| l.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("unknown score label '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactorRecord {
    pub code: String,
    pub raw: RawFactors,
    /// Percentile rank per factor, in `RawFactors::NAMES` order.
    pub ranks: [f64; RawFactors::COUNT],
    pub composite: f64,
    pub label: ScoreLabel,
}

/// Result of one scoring cycle.
#[derive(Debug, Clone, Default)]
pub struct ScoredUniverse {
    pub records: BTreeMap<String, FactorRecord>,
    pub dropped: Vec<DroppedInstrument>,
}

impl ScoredUniverse {
    /// Codes carrying `label`, ascending.
    pub fn codes_with_label(&self, label: ScoreLabel) -> Vec<String> {
        self.records
            .values()
            .filter(|r| r.label == label)
            .map(|r| r.code.clone())
            .collect()
    }
}

/// Score a fundamentals snapshot. Instruments whose factors cannot be derived
/// are dropped before ranking so they never influence the cross-section.
pub fn score_records(records: &[FundamentalRecord]) -> ScoredUniverse {
    let mut derived: BTreeMap<String, RawFactors> = BTreeMap::new();
    let mut dropped = Vec::new();

    for record in records {
        match record.derive_factors() {
            Ok(factors) => {
                derived.insert(record.code.clone(), factors);
            }
            Err(reason) => {
                tracing::warn!(code = %record.code, %reason, "dropping instrument from scoring");
                dropped.push(DroppedInstrument {
                    code: record.code.clone(),
                    reason,
                });
            }
        }
    }

    let codes: Vec<&String> = derived.keys().collect();
    let rows: Vec<[f64; RawFactors::COUNT]> = derived.values().map(RawFactors::as_array).collect();

    let mut ranks = vec![[0.0; RawFactors::COUNT]; rows.len()];
    for factor in 0..RawFactors::COUNT {
        let column: Vec<f64> = rows.iter().map(|r| r[factor]).collect();
        for (i, rank) in percentile_rank(&column).into_iter().enumerate() {
            ranks[i][factor] = rank;
        }
    }

    let composites: Vec<f64> = ranks
        .iter()
        .map(|r| r.iter().sum::<f64>() / RawFactors::COUNT as f64)
        .collect();
    let bins = quantile_bins(&composites, ScoreLabel::ALL.len());

    let records = codes
        .into_iter()
        .enumerate()
        .map(|(i, code)| {
            let record = FactorRecord {
                code: code.clone(),
                raw: derived[code],
                ranks: ranks[i],
                composite: composites[i],
                label: ScoreLabel::ALL[bins[i]],
            };
            (code.clone(), record)
        })
        .collect();

    ScoredUniverse { records, dropped }
}

/// Fetch fundamentals for `universe` at `date` and score them.
pub fn score(
    data_port: &dyn DataPort,
    universe: &[String],
    date: NaiveDate,
) -> Result<ScoredUniverse, MispricerError> {
    let records = data_port.fetch_fundamentals(universe, date)?;
    let scored = score_records(&records);
    tracing::info!(
        %date,
        scored = scored.records.len(),
        dropped = scored.dropped.len(),
        "fundamental scores updated"
    );
    Ok(scored)
}
