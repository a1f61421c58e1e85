#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use ghbtrader::domain::backtest::BacktestConfig;
use ghbtrader::domain::classifier::ClassifierConfig;
use ghbtrader::domain::error::GhbError;
pub use ghbtrader::domain::ohlcv::PriceBar;
use ghbtrader::domain::ticker_data::TickerData;
use ghbtrader::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, GhbError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(GhbError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(ticker)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, GhbError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, GhbError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(GhbError::DataSource {
                reason: reason.clone(),
            });
        }
        match self.data.get(ticker) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.date).min().unwrap();
                let max = bars.iter().map(|b| b.date).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(ticker: &str, date: NaiveDate, close: f64) -> PriceBar {
    PriceBar {
        ticker: ticker.to_string(),
        date,
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 1000,
    }
}

/// First bar date used by the weekly helpers: Friday 5 January 2024.
pub fn first_friday() -> NaiveDate {
    date(2024, 1, 5)
}

/// One bar per week on consecutive Fridays from `first_friday()`.
pub fn weekly_bars(ticker: &str, closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| make_bar(ticker, first_friday() + Duration::weeks(i as i64), close))
        .collect()
}

/// Friday of week `index` counted from `first_friday()`.
pub fn friday(index: usize) -> NaiveDate {
    first_friday() + Duration::weeks(index as i64)
}

pub fn ticker_data(ticker: &str, closes: &[f64]) -> TickerData {
    TickerData::new(ticker.to_string(), weekly_bars(ticker, closes))
}

/// `flat` weeks at 100, then a 10% step that keeps rising 1% a week.
pub fn breakout_closes(flat: usize, rising: usize) -> Vec<f64> {
    let mut closes = vec![100.0; flat];
    let mut price = 110.0;
    for _ in 0..rising {
        closes.push(price);
        price *= 1.01;
    }
    closes
}

/// Short windows so a handful of weekly bars is enough history.
pub fn short_classifier() -> ClassifierConfig {
    ClassifierConfig {
        moving_average_window: 4,
        momentum_window: 1,
        entry_momentum_pct: 0.0,
        exit_momentum_pct: -5.0,
    }
}

/// Config covering the first `weeks` helper weeks.
pub fn sample_config(universe: &[&str], weeks: usize) -> BacktestConfig {
    let mut config = BacktestConfig::new(
        date(2024, 1, 1),
        friday(weeks.saturating_sub(1)),
        universe.iter().map(|t| t.to_string()).collect(),
    );
    config.classifier = short_classifier();
    config
}
