//! Report generation port trait.

use crate::domain::error::MispricerError;
use crate::domain::pipeline::{RebalanceOutcome, ScoringOutcome};

/// Port for writing cycle results.
pub trait ReportPort {
    fn write_rebalance(
        &self,
        outcome: &RebalanceOutcome,
        output_path: &str,
    ) -> Result<(), MispricerError>;

    fn write_scores(&self, outcome: &ScoringOutcome, output_path: &str)
    -> Result<(), MispricerError>;
}
