//! GHB trend states and their labels.
//!
//! The strategy paints each instrument Gold (P1/P2), Gray (N1) or Blue (N2).
//! `Neutral` marks an instrument without enough history to classify.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendState {
    /// P1: fresh cross above the long average with positive momentum.
    Accumulate,
    /// P2: above the average, momentum still positive.
    HoldLong,
    /// N1: above the average, momentum fading.
    HoldCaution,
    /// N2: below the average or momentum collapsed.
    Exit,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colour {
    Gold,
    Gray,
    Blue,
}

impl TrendState {
    pub const ALL: [TrendState; 5] = [
        TrendState::Accumulate,
        TrendState::HoldLong,
        TrendState::HoldCaution,
        TrendState::Exit,
        TrendState::Neutral,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            TrendState::Accumulate => "P1",
            TrendState::HoldLong => "P2",
            TrendState::HoldCaution => "N1",
            TrendState::Exit => "N2",
            TrendState::Neutral => "NEUTRAL",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TrendState::Accumulate => "accumulate",
            TrendState::HoldLong => "hold_long",
            TrendState::HoldCaution => "hold_caution",
            TrendState::Exit => "exit",
            TrendState::Neutral => "neutral",
        }
    }

    pub fn colour(&self) -> Option<Colour> {
        match self {
            TrendState::Accumulate | TrendState::HoldLong => Some(Colour::Gold),
            TrendState::HoldCaution => Some(Colour::Gray),
            TrendState::Exit => Some(Colour::Blue),
            TrendState::Neutral => None,
        }
    }

    /// True for the states that sit above the long average.
    pub fn is_uptrend(&self) -> bool {
        matches!(
            self,
            TrendState::Accumulate | TrendState::HoldLong | TrendState::HoldCaution
        )
    }
}

impl fmt::Display for TrendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown trend state: {0}")]
pub struct UnknownTrendState(pub String);

impl FromStr for TrendState {
    type Err = UnknownTrendState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        TrendState::ALL
            .into_iter()
            .find(|state| {
                state.code().eq_ignore_ascii_case(needle) || state.name().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| UnknownTrendState(needle.to_string()))
    }
}
