//! Open positions, closed trades and the execution log.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::trend_state::TrendState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub ticker: String,
    pub shares: u64,
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    pub state_at_entry: TrendState,
}

impl Position {
    pub fn cost_basis(&self) -> f64 {
        self.shares as f64 * self.entry_price
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.shares as f64 * price
    }
}

/// A closed round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub ticker: String,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    pub shares: u64,
    pub pnl_pct: f64,
    pub pnl_dollars: f64,
    pub hold_days: i64,
    pub entry_state: TrendState,
    pub exit_state: TrendState,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.pnl_pct > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.pnl_pct < 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

/// One executed buy or sell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub ticker: String,
    pub date: NaiveDate,
    pub side: Side,
    pub shares: u64,
    pub reference_price: f64,
    pub execution_price: f64,
    pub value: f64,
    pub state: TrendState,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_position() -> Position {
        Position {
            ticker: "AAPL".into(),
            shares: 100,
            entry_price: 50.0,
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            state_at_entry: TrendState::Accumulate,
        }
    }

    #[test]
    fn market_value() {
        let pos = sample_position();
        assert!((pos.market_value(55.0) - 5500.0).abs() < f64::EPSILON);
        assert!((pos.cost_basis() - 5000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn trade_outcome() {
        let mut trade = Trade {
            ticker: "AAPL".into(),
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            exit_date: NaiveDate::from_ymd_opt(2024, 2, 15).unwrap(),
            entry_price: 50.0,
            exit_price: 55.0,
            shares: 100,
            pnl_pct: 0.1,
            pnl_dollars: 500.0,
            hold_days: 31,
            entry_state: TrendState::Accumulate,
            exit_state: TrendState::Exit,
        };
        assert!(trade.is_winner());
        assert!(!trade.is_loser());
        trade.pnl_pct = 0.0;
        assert!(!trade.is_winner());
        assert!(!trade.is_loser());
    }

    #[test]
    fn side_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Side::Buy).unwrap(), "\"BUY\"");
        assert_eq!(serde_json::to_string(&Side::Sell).unwrap(), "\"SELL\"");
    }
}
