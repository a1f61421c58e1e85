//! Signal classifier: weekly bars to GHB trend states.
//!
//! A reading compares the latest close with its long moving average and a
//! short rate of change. `transition` maps the previous state and the reading
//! to the next state; `classify` replays that transition over a history, so
//! the state at tick T is a function of bars up to and including T only.

use serde::{Deserialize, Serialize};

use crate::domain::indicator::roc::{calculate_roc, latest_roc};
use crate::domain::indicator::sma::{calculate_sma, latest_sma};
use crate::domain::ohlcv::PriceBar;
use crate::domain::trend_state::TrendState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub moving_average_window: usize,
    pub momentum_window: usize,
    /// ROC (percent) above which momentum counts as positive.
    pub entry_momentum_pct: f64,
    /// ROC (percent) at or below which momentum has collapsed.
    pub exit_momentum_pct: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            moving_average_window: 200,
            momentum_window: 4,
            entry_momentum_pct: 0.0,
            exit_momentum_pct: -5.0,
        }
    }
}

impl ClassifierConfig {
    /// Bars needed before a reading exists.
    pub fn lookback(&self) -> usize {
        self.moving_average_window.max(self.momentum_window + 1)
    }
}

/// Indicator values for one ticker at one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalReading {
    pub close: f64,
    pub average: f64,
    pub momentum_pct: f64,
    /// (close / average - 1) * 100
    pub distance_pct: f64,
}

impl SignalReading {
    pub fn new(close: f64, average: f64, momentum_pct: f64) -> Self {
        let distance_pct = if average > 0.0 {
            (close / average - 1.0) * 100.0
        } else {
            0.0
        };
        SignalReading {
            close,
            average,
            momentum_pct,
            distance_pct,
        }
    }

    pub fn is_above_average(&self) -> bool {
        self.close > self.average
    }
}

/// Next state given the previous one and this tick's reading.
pub fn transition(prev: TrendState, reading: &SignalReading, config: &ClassifierConfig) -> TrendState {
    let collapsing = reading.momentum_pct <= config.exit_momentum_pct;
    if !reading.is_above_average() || collapsing {
        return TrendState::Exit;
    }

    let strong = reading.momentum_pct > config.entry_momentum_pct;
    if prev.is_uptrend() {
        return if strong { TrendState::HoldLong } else { TrendState::HoldCaution };
    }
    match (prev, strong) {
        (TrendState::Exit, true) => TrendState::Accumulate,
        (TrendState::Exit, false) => TrendState::Exit,
        // First classifiable tick already inside a trend: no cross was seen.
        (_, true) => TrendState::HoldLong,
        (_, false) => TrendState::HoldCaution,
    }
}

#[derive(Debug, Clone, Default)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Classifier { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Reading at the last bar of `history`, or `None` when there is not
    /// enough history or the last close cannot be used.
    pub fn reading(&self, history: &[PriceBar]) -> Option<SignalReading> {
        if history.len() < self.config.lookback() {
            return None;
        }
        let last = history.last()?;
        if !last.is_tradable() {
            return None;
        }
        let average = latest_sma(history, self.config.moving_average_window)?;
        let momentum = latest_roc(history, self.config.momentum_window)?;
        Some(SignalReading::new(last.close, average, momentum))
    }

    /// Advance one tick from `prev` using the history up to this tick.
    ///
    /// Too little history gives `Neutral`; an unusable last close leaves the
    /// state where it was.
    pub fn step(&self, prev: TrendState, history: &[PriceBar]) -> TrendState {
        if history.len() < self.config.lookback() {
            return TrendState::Neutral;
        }
        match self.reading(history) {
            Some(reading) => transition(prev, &reading, &self.config),
            None => prev,
        }
    }

    /// State at the last bar of `history`, replayed from the first bar.
    pub fn classify(&self, history: &[PriceBar]) -> TrendState {
        let lookback = self.config.lookback();
        if history.len() < lookback {
            return TrendState::Neutral;
        }

        let sma = calculate_sma(history, self.config.moving_average_window);
        let roc = calculate_roc(history, self.config.momentum_window);

        let mut state = TrendState::Neutral;
        for (i, bar) in history.iter().enumerate().skip(lookback - 1) {
            state = match (bar.is_tradable(), sma.value_at(i), roc.value_at(i)) {
                (true, Some(average), Some(momentum)) => {
                    transition(state, &SignalReading::new(bar.close, average, momentum), &self.config)
                }
                _ => state,
            };
        }
        state
    }
}
