//! CSV report adapter.

use crate::domain::error::MispricerError;
use crate::domain::fundamentals::RawFactors;
use crate::domain::pipeline::{RebalanceOutcome, ScoringOutcome};
use crate::ports::report_port::ReportPort;
use serde::Serialize;

pub struct CsvReportAdapter;

/// One stage-1 member of a rebalance.
#[derive(Debug, Serialize)]
struct RebalanceRow<'a> {
    code: &'a str,
    stage1_rank: usize,
    stage1_beta: f64,
    stage2_rank: Option<usize>,
    stage2_beta: Option<f64>,
    volatility: Option<f64>,
    cumulative_return: Option<f64>,
    weight: Option<f64>,
}

fn csv_error(path: &str, e: impl std::fmt::Display) -> MispricerError {
    MispricerError::Io(format!("failed to write {}: {}", path, e))
}

impl ReportPort for CsvReportAdapter {
    fn write_rebalance(
        &self,
        outcome: &RebalanceOutcome,
        output_path: &str,
    ) -> Result<(), MispricerError> {
        let mut wtr = csv::Writer::from_path(output_path).map_err(|e| csv_error(output_path, e))?;

        for (i, code) in outcome.stage1.codes.iter().enumerate() {
            let stage1_beta = outcome
                .stage1
                .estimates
                .iter()
                .find(|e| &e.code == code)
                .map_or(f64::NAN, |e| e.beta);
            let stage2_rank = outcome.stage2.codes.iter().position(|c| c == code);
            let stage2_beta = stage2_rank
                .and_then(|_| outcome.stage2.estimates.iter().find(|e| &e.code == code))
                .map(|e| e.beta);
            let stats = outcome.stats.iter().find(|s| &s.code == code);

            wtr.serialize(RebalanceRow {
                code,
                stage1_rank: i + 1,
                stage1_beta,
                stage2_rank: stage2_rank.map(|r| r + 1),
                stage2_beta,
                volatility: stats.map(|s| s.volatility),
                cumulative_return: stats.map(|s| s.cumulative_return),
                weight: outcome.weights.get(code),
            })
            .map_err(|e| csv_error(output_path, e))?;
        }

        wtr.flush()?;
        tracing::info!(path = output_path, rows = outcome.stage1.len(), "rebalance report written");
        Ok(())
    }

    fn write_scores(
        &self,
        outcome: &ScoringOutcome,
        output_path: &str,
    ) -> Result<(), MispricerError> {
        let mut wtr = csv::Writer::from_path(output_path).map_err(|e| csv_error(output_path, e))?;

        let mut header = vec!["code".to_string()];
        header.extend(RawFactors::NAMES.iter().map(|n| format!("{n}_rank")));
        header.push("composite".to_string());
        header.push("label".to_string());
        wtr.write_record(&header)
            .map_err(|e| csv_error(output_path, e))?;

        for record in outcome.scored.records.values() {
            let mut row = vec![record.code.clone()];
            row.extend(record.ranks.iter().map(|r| r.to_string()));
            row.push(record.composite.to_string());
            row.push(record.label.to_string());
            wtr.write_record(&row)
                .map_err(|e| csv_error(output_path, e))?;
        }

        wtr.flush()?;
        tracing::info!(
            path = output_path,
            rows = outcome.scored.records.len(),
            "score report written"
        );
        Ok(())
    }
}
