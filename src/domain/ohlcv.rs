//! Price bar representation and weekly resampling.

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub ticker: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl PriceBar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    /// A bar can be traded and marked only if its close is a positive number.
    pub fn is_tradable(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }
}

/// Monday of the calendar week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_monday() as u64;
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

/// Collapse bars into one bar per Monday-anchored week.
///
/// open = first open, high = max, low = min, close = last close,
/// volume = sum, date = last trading date of the week. Input order does not
/// matter; output is sorted by date. Already-weekly data passes through
/// unchanged.
pub fn resample_weekly(bars: &[PriceBar]) -> Vec<PriceBar> {
    let mut sorted: Vec<&PriceBar> = bars.iter().collect();
    sorted.sort_by_key(|b| b.date);

    let mut weekly: Vec<PriceBar> = Vec::new();
    let mut current_week: Option<NaiveDate> = None;

    for bar in sorted {
        let week = week_start(bar.date);
        match weekly.last_mut() {
            Some(last) if current_week == Some(week) => {
                last.high = last.high.max(bar.high);
                last.low = last.low.min(bar.low);
                last.close = bar.close;
                last.volume = last.volume.saturating_add(bar.volume);
                last.date = bar.date;
            }
            _ => {
                weekly.push(bar.clone());
                current_week = Some(week);
            }
        }
    }

    weekly
}
