//! CSV file data adapter.
//!
//! One file per ticker, `<data_dir>/<TICKER>.csv`, with header
//! `date,open,high,low,close,volume`. Rows may be daily or weekly and in any
//! order; they are returned sorted by date.

use crate::domain::error::GhbError;
use crate::domain::ohlcv::PriceBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{ticker}.csv"))
    }

    fn read_all(&self, ticker: &str) -> Result<Vec<PriceBar>, GhbError> {
        let path = self.csv_path(ticker);
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&path)
            .map_err(|e| GhbError::DataSource {
                reason: format!("failed to read {}: {}", path.display(), e),
            })?;

        let mut bars = Vec::new();
        for (line, result) in rdr.deserialize::<CsvRow>().enumerate() {
            let row = result.map_err(|e| GhbError::DataSource {
                reason: format!("{} row {}: {}", path.display(), line + 1, e),
            })?;
            bars.push(PriceBar {
                ticker: ticker.to_string(),
                date: row.date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume as i64,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, GhbError> {
        let mut bars = self.read_all(ticker)?;
        bars.retain(|b| b.date >= start_date && b.date <= end_date);
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, GhbError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| GhbError::DataSource {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_csv = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
            if !is_csv {
                continue;
            }
            if let Some(stem) = path.file_stem() {
                symbols.push(stem.to_string_lossy().into_owned());
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, GhbError> {
        let bars = self.read_all(ticker)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, bars.len())),
            _ => None,
        })
    }
}
