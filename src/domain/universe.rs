//! Ticker universe: parsing the configured list and loading what is usable.

use crate::domain::error::GhbError;
use crate::domain::ticker_data::{load_ticker_data, TickerData};
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::HashSet;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    pub tickers: Vec<String>,
}

impl Universe {
    pub fn count(&self) -> usize {
        self.tickers.len()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in ticker list")]
    EmptyToken,

    #[error("duplicate ticker: {0}")]
    DuplicateTicker(String),
}

/// Split a comma-separated ticker list, trimming and upper-casing each entry.
pub fn parse_tickers(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut tickers = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let ticker = trimmed.to_uppercase();
        if !seen.insert(ticker.clone()) {
            return Err(UniverseError::DuplicateTicker(ticker));
        }
        tickers.push(ticker);
    }

    Ok(tickers)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    FetchFailed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedTicker {
    pub ticker: String,
    pub reason: SkipReason,
}

#[derive(Debug)]
pub struct UniverseValidationResult {
    pub universe: Universe,
    pub data: Vec<TickerData>,
    pub skipped: Vec<SkippedTicker>,
}

/// Load every ticker, dropping the ones with no usable data.
///
/// Fails only when nothing is left to simulate.
pub fn validate_universe(
    data_port: &dyn DataPort,
    tickers: &[String],
    start_date: NaiveDate,
    end_date: NaiveDate,
    lookback: usize,
) -> Result<UniverseValidationResult, GhbError> {
    let mut data = Vec::with_capacity(tickers.len());
    let mut skipped = Vec::new();

    for ticker in tickers {
        match load_ticker_data(data_port, ticker, start_date, end_date, lookback) {
            Ok(td) => {
                info!(%ticker, weeks = td.bar_count(), "ticker ok");
                data.push(td);
            }
            Err(GhbError::NoData { .. }) => {
                warn!(%ticker, "skipping ticker: no data found");
                skipped.push(SkippedTicker {
                    ticker: ticker.clone(),
                    reason: SkipReason::NoData,
                });
            }
            Err(e) => {
                warn!(%ticker, error = %e, "skipping ticker");
                skipped.push(SkippedTicker {
                    ticker: ticker.clone(),
                    reason: SkipReason::FetchFailed {
                        reason: e.to_string(),
                    },
                });
            }
        }
    }

    if data.is_empty() {
        return Err(GhbError::InsufficientData {
            ticker: "all".to_string(),
            bars: 0,
            minimum: lookback,
        });
    }

    if !skipped.is_empty() {
        info!(
            kept = data.len(),
            requested = tickers.len(),
            "backtesting a partial universe"
        );
    }

    Ok(UniverseValidationResult {
        universe: Universe {
            tickers: data.iter().map(|td| td.ticker.clone()).collect(),
        },
        data,
        skipped,
    })
}
