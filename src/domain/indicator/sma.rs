//! Simple Moving Average of closes.
//!
//! SMA(n)[i] = mean(C[i-n+1..=i])
//! Warmup: first n-1 bars invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::PriceBar;

fn window_mean(window: &[PriceBar]) -> f64 {
    window.iter().map(|b| b.close).sum::<f64>() / window.len() as f64
}

pub fn calculate_sma(bars: &[PriceBar], period: usize) -> IndicatorSeries {
    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let valid = period > 0 && i + 1 >= period;
            let value = if valid {
                window_mean(&bars[i + 1 - period..=i])
            } else {
                0.0
            };
            IndicatorPoint {
                date: bar.date,
                valid,
                value,
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values,
    }
}

/// SMA evaluated at the last bar only.
pub fn latest_sma(bars: &[PriceBar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period {
        return None;
    }
    Some(window_mean(&bars[bars.len() - period..]))
}
