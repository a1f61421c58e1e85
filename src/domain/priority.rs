//! Ordering of competing entries within one tick.
//!
//! When several tickers signal on the same week and cash or slots run out,
//! entries are admitted in this order. Ties always fall back to the ticker
//! symbol so the result never depends on input order.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::domain::classifier::SignalReading;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryPriority {
    /// Lexical ticker order.
    #[default]
    TickerOrder,
    /// Strongest rate of change first.
    Momentum,
    /// Closest to the moving average first.
    Proximity,
}

/// An entry signal waiting for admission.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryCandidate {
    pub ticker: String,
    pub reading: SignalReading,
}

impl EntryPriority {
    fn compare(&self, a: &EntryCandidate, b: &EntryCandidate) -> Ordering {
        let primary = match self {
            EntryPriority::TickerOrder => Ordering::Equal,
            EntryPriority::Momentum => b.reading.momentum_pct.total_cmp(&a.reading.momentum_pct),
            EntryPriority::Proximity => a.reading.distance_pct.total_cmp(&b.reading.distance_pct),
        };
        primary.then_with(|| a.ticker.cmp(&b.ticker))
    }

    pub fn rank(&self, candidates: &mut [EntryCandidate]) {
        candidates.sort_by(|a, b| self.compare(a, b));
    }
}

impl fmt::Display for EntryPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryPriority::TickerOrder => "ticker",
            EntryPriority::Momentum => "momentum",
            EntryPriority::Proximity => "proximity",
        };
        f.write_str(name)
    }
}

impl FromStr for EntryPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ticker" | "ticker_order" => Ok(EntryPriority::TickerOrder),
            "momentum" => Ok(EntryPriority::Momentum),
            "proximity" => Ok(EntryPriority::Proximity),
            other => Err(format!(
                "unknown entry priority '{other}', expected ticker, momentum or proximity"
            )),
        }
    }
}
