//! Flat-file report adapter.
//!
//! Writes `trades.csv`, `equity.csv`, `fills.csv` and `metrics.json` into an
//! output directory, creating it if needed.

use crate::domain::backtest::{BacktestResult, HaltReason, SkippedOrder};
use crate::domain::error::GhbError;
use crate::domain::metrics::{Metrics, TickerResult};
use crate::domain::position::Position;
use crate::ports::report_port::ReportPort;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

pub const TRADES_FILE: &str = "trades.csv";
pub const EQUITY_FILE: &str = "equity.csv";
pub const FILLS_FILE: &str = "fills.csv";
pub const METRICS_FILE: &str = "metrics.json";

#[derive(Debug, Default)]
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        CsvReportAdapter
    }
}

#[derive(Serialize)]
struct Summary<'a> {
    starting_cash: f64,
    final_cash: f64,
    ticks_processed: usize,
    halt: HaltReason,
    transitions: usize,
    metrics: &'a Metrics,
    per_ticker: Vec<TickerResult>,
    open_positions: &'a [Position],
    skipped: &'a [SkippedOrder],
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), GhbError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        metrics: &Metrics,
        output_dir: &Path,
    ) -> Result<(), GhbError> {
        fs::create_dir_all(output_dir).map_err(|e| GhbError::Report {
            reason: format!("cannot create {}: {}", output_dir.display(), e),
        })?;

        write_rows(&output_dir.join(TRADES_FILE), &result.trades)?;
        write_rows(&output_dir.join(EQUITY_FILE), &result.equity_curve)?;
        write_rows(&output_dir.join(FILLS_FILE), &result.fills)?;

        let summary = Summary {
            starting_cash: result.starting_cash,
            final_cash: result.final_cash,
            ticks_processed: result.ticks_processed,
            halt: result.halt,
            transitions: result.transitions.len(),
            metrics,
            per_ticker: TickerResult::compute_per_ticker(&result.trades),
            open_positions: &result.open_positions,
            skipped: &result.skipped,
        };
        let json = serde_json::to_string_pretty(&summary)?;
        fs::write(output_dir.join(METRICS_FILE), json)?;

        info!(dir = %output_dir.display(), "report written");
        Ok(())
    }
}
