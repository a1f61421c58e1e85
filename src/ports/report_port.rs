//! Report output port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::error::GhbError;
use crate::domain::metrics::Metrics;
use std::path::Path;

/// Port for persisting a finished run.
pub trait ReportPort {
    fn write(
        &self,
        result: &BacktestResult,
        metrics: &Metrics,
        output_dir: &Path,
    ) -> Result<(), GhbError>;
}
