//! Instrument universe construction.
//!
//! Removes special-treatment (ST / *ST) names and instruments in excluded
//! industries from the listed securities.

use chrono::NaiveDate;
use std::collections::HashSet;

use crate::domain::error::MispricerError;
use crate::ports::data_port::DataPort;

#[derive(Debug, Clone, PartialEq)]
pub struct SecurityInfo {
    pub code: String,
    pub display_name: String,
    pub industry_codes: Vec<String>,
}

impl SecurityInfo {
    pub fn is_special_treatment(&self) -> bool {
        let name = self.display_name.trim_start();
        name.starts_with("ST") || name.starts_with("*ST")
    }

    pub fn in_industries(&self, excluded: &HashSet<&str>) -> bool {
        self.industry_codes
            .iter()
            .any(|c| excluded.contains(c.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    SpecialTreatment,
    ExcludedIndustry,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedCode {
    pub code: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Universe {
    /// Eligible codes, ascending and unique.
    pub codes: Vec<String>,
    pub skipped: Vec<SkippedCode>,
}

impl Universe {
    pub fn count(&self) -> usize {
        self.codes.len()
    }
}

pub fn filter_universe(securities: &[SecurityInfo], excluded_industries: &[String]) -> Universe {
    let excluded: HashSet<&str> = excluded_industries.iter().map(String::as_str).collect();
    let mut codes = Vec::with_capacity(securities.len());
    let mut skipped = Vec::new();

    for sec in securities {
        let reason = if sec.is_special_treatment() {
            Some(SkipReason::SpecialTreatment)
        } else if sec.in_industries(&excluded) {
            Some(SkipReason::ExcludedIndustry)
        } else {
            None
        };
        match reason {
            Some(reason) => skipped.push(SkippedCode {
                code: sec.code.clone(),
                reason,
            }),
            None => codes.push(sec.code.clone()),
        }
    }

    codes.sort();
    codes.dedup();
    Universe { codes, skipped }
}

/// Listed securities on `date`, filtered.
pub fn build_universe(
    data_port: &dyn DataPort,
    date: NaiveDate,
    excluded_industries: &[String],
) -> Result<Universe, MispricerError> {
    let securities = data_port.list_securities(date)?;
    let universe = filter_universe(&securities, excluded_industries);
    tracing::info!(
        %date,
        eligible = universe.count(),
        skipped = universe.skipped.len(),
        "universe built"
    );
    Ok(universe)
}
