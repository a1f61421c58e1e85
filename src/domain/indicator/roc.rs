//! ROC (Rate of Change) indicator.
//!
//! ROC(n)[i] = ((C[i] - C[i-n]) / C[i-n]) * 100
//! If C[i-n] == 0: ROC = 0
//! Warmup: first n bars invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::PriceBar;

fn rate_of_change(prev_close: f64, curr_close: f64) -> f64 {
    if prev_close == 0.0 {
        0.0
    } else {
        ((curr_close - prev_close) / prev_close) * 100.0
    }
}

pub fn calculate_roc(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());

    for i in 0..bars.len() {
        let date = bars[i].date;
        let valid = i >= period;

        let value = if valid {
            rate_of_change(bars[i - period].close, bars[i].close)
        } else {
            0.0
        };

        values.push(IndicatorPoint { date, valid, value });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Roc(period),
        values,
    }
}

/// ROC evaluated at the last bar only.
pub fn latest_roc(bars: &[PriceBar], period: usize) -> Option<f64> {
    let last = bars.len().checked_sub(1)?;
    let base = last.checked_sub(period)?;
    Some(rate_of_change(bars[base].close, bars[last].close))
}
