//! Position sizing.
//!
//! Nominal size is `portfolio value * position_size_pct`. A `SizingStrategy`
//! scales that nominal size from the entry signal; the ledger never sees the
//! strategy, only the resulting dollar amount.

use serde::{Deserialize, Serialize};

use crate::domain::classifier::SignalReading;

pub trait SizingStrategy: std::fmt::Debug {
    /// Multiplier in (0, 1] applied to the nominal size.
    fn scale(&self, reading: &SignalReading) -> f64;
}

/// Every entry gets the full nominal size.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedFraction;

impl SizingStrategy for FixedFraction {
    fn scale(&self, _reading: &SignalReading) -> f64 {
        1.0
    }
}

/// Scales size down the further price has already run above its average.
///
/// distance <= near_pct → 100%, <= far_pct → 75%, beyond → 50%.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityTiers {
    pub near_pct: f64,
    pub far_pct: f64,
}

impl Default for ProximityTiers {
    fn default() -> Self {
        ProximityTiers {
            near_pct: 5.0,
            far_pct: 10.0,
        }
    }
}

impl SizingStrategy for ProximityTiers {
    fn scale(&self, reading: &SignalReading) -> f64 {
        let distance = reading.distance_pct;
        if distance <= self.near_pct {
            1.0
        } else if distance <= self.far_pct {
            0.75
        } else {
            0.5
        }
    }
}

/// Configured sizing mode.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sizing {
    #[default]
    Fixed,
    Tiered { near_pct: f64, far_pct: f64 },
}

impl Sizing {
    pub fn strategy(&self) -> Box<dyn SizingStrategy> {
        match *self {
            Sizing::Fixed => Box::new(FixedFraction),
            Sizing::Tiered { near_pct, far_pct } => Box::new(ProximityTiers { near_pct, far_pct }),
        }
    }
}

/// Dollar amount to propose for one entry.
pub fn proposed_size(
    portfolio_value: f64,
    position_size_pct: f64,
    strategy: &dyn SizingStrategy,
    reading: &SignalReading,
) -> f64 {
    portfolio_value * position_size_pct * strategy.scale(reading)
}
