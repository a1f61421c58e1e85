//! Per-ticker weekly history and the simulation calendar.

use crate::domain::error::GhbError;
use crate::domain::ohlcv::{resample_weekly, week_start, PriceBar};
use crate::ports::data_port::DataPort;
use chrono::{Days, NaiveDate};
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct TickerData {
    pub ticker: String,
    pub bars: Vec<PriceBar>,
    pub week_index: HashMap<NaiveDate, usize>,
}

impl TickerData {
    /// Build from bars of any frequency; they are resampled to weekly.
    pub fn new(ticker: String, bars: Vec<PriceBar>) -> Self {
        let bars = resample_weekly(&bars);
        let week_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (week_start(bar.date), i))
            .collect();
        Self {
            ticker,
            bars,
            week_index,
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    /// Index of the bar for the week starting on `week`.
    pub fn bar_index(&self, week: NaiveDate) -> Option<usize> {
        self.week_index.get(&week).copied()
    }

    pub fn bar_in_week(&self, week: NaiveDate) -> Option<&PriceBar> {
        self.bar_index(week).map(|i| &self.bars[i])
    }

    /// Bars up to and including `index`.
    pub fn history_through(&self, index: usize) -> &[PriceBar] {
        let end = (index + 1).min(self.bars.len());
        &self.bars[..end]
    }

    /// Bars from weeks strictly before `week`.
    pub fn history_before(&self, week: NaiveDate) -> &[PriceBar] {
        let end = self.bars.partition_point(|b| week_start(b.date) < week);
        &self.bars[..end]
    }
}

/// Monday of every week from the week containing `start` to the week
/// containing `end`, inclusive.
pub fn weekly_calendar(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let last = week_start(end);
    let mut weeks = Vec::new();
    let mut week = week_start(start);
    while week <= last {
        weeks.push(week);
        match week.checked_add_days(Days::new(7)) {
            Some(next) => week = next,
            None => break,
        }
    }
    weeks
}

/// First date to request so that `lookback` weekly bars exist before `start`.
pub fn warmup_start(start: NaiveDate, lookback: usize) -> NaiveDate {
    let days = (lookback as u64 + 2) * 7;
    start.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN)
}

/// Fetch `ticker` with enough warm-up for `lookback` weekly bars before
/// `start_date`, then resample and index it.
///
/// An empty fetch is `NoData`. A short warm-up is only a warning: the ticker
/// stays neutral until enough bars accrue.
pub fn load_ticker_data(
    data_port: &dyn DataPort,
    ticker: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
    lookback: usize,
) -> Result<TickerData, GhbError> {
    let fetch_from = warmup_start(start_date, lookback);
    let bars = data_port.fetch_bars(ticker, fetch_from, end_date)?;
    if bars.is_empty() {
        return Err(GhbError::NoData {
            ticker: ticker.to_string(),
        });
    }

    let data = TickerData::new(ticker.to_string(), bars);
    let warmup = data.history_before(week_start(start_date)).len();
    if warmup < lookback {
        warn!(%ticker, warmup, lookback, "short warm-up history");
    }
    debug!(%ticker, weeks = data.bar_count(), warmup, "loaded");
    Ok(data)
}
