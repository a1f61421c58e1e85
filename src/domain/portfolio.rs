//! Portfolio ledger: cash, open positions, trades and the equity curve.
//!
//! The ledger is the only owner of position state. Every mutation goes
//! through `execute_buy`, `execute_sell` or `snapshot`; refusals leave the
//! ledger untouched.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::execution::{apply_buy_slippage, apply_sell_slippage, shares_for, LedgerRefusal};
use super::position::{Fill, Position, Side, Trade};
use super::trend_state::TrendState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquitySnapshot {
    pub date: NaiveDate,
    pub cash: f64,
    pub positions_value: f64,
    pub total_value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioLedger {
    cash: f64,
    starting_cash: f64,
    max_positions: usize,
    positions: BTreeMap<String, Position>,
    trades: Vec<Trade>,
    fills: Vec<Fill>,
    equity_curve: Vec<EquitySnapshot>,
}

/// Everything the ledger recorded, detached from the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerParts {
    pub cash: f64,
    pub open_positions: Vec<Position>,
    pub trades: Vec<Trade>,
    pub fills: Vec<Fill>,
    pub equity_curve: Vec<EquitySnapshot>,
}

impl PortfolioLedger {
    pub fn new(starting_cash: f64, max_positions: usize) -> Self {
        PortfolioLedger {
            cash: starting_cash,
            starting_cash,
            max_positions,
            positions: BTreeMap::new(),
            trades: Vec::new(),
            fills: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn starting_cash(&self) -> f64 {
        self.starting_cash
    }

    pub fn max_positions(&self) -> usize {
        self.max_positions
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn has_position(&self, ticker: &str) -> bool {
        self.positions.contains_key(ticker)
    }

    pub fn position(&self, ticker: &str) -> Option<&Position> {
        self.positions.get(ticker)
    }

    /// Open positions in ticker order.
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn equity_curve(&self) -> &[EquitySnapshot] {
        &self.equity_curve
    }

    /// Reason a buy of `proposed_dollar_size` would be refused, if any.
    pub fn check_buy(&self, ticker: &str, proposed_dollar_size: f64) -> Result<(), LedgerRefusal> {
        if self.positions.len() >= self.max_positions {
            return Err(LedgerRefusal::MaxPositionsReached {
                max: self.max_positions,
            });
        }
        if self.positions.contains_key(ticker) {
            return Err(LedgerRefusal::TickerAlreadyOpen {
                ticker: ticker.to_string(),
            });
        }
        if self.cash < proposed_dollar_size {
            return Err(LedgerRefusal::InsufficientCash {
                needed: proposed_dollar_size,
                available: self.cash,
            });
        }
        Ok(())
    }

    pub fn can_buy(&self, ticker: &str, proposed_dollar_size: f64) -> bool {
        self.check_buy(ticker, proposed_dollar_size).is_ok()
    }

    /// Open a position of `floor(size / (close * factor))` shares.
    pub fn execute_buy(
        &mut self,
        ticker: &str,
        date: NaiveDate,
        reference_close: f64,
        proposed_dollar_size: f64,
        buy_slippage_factor: f64,
        state: TrendState,
    ) -> Result<Fill, LedgerRefusal> {
        if !reference_close.is_finite() || reference_close <= 0.0 {
            return Err(LedgerRefusal::InvalidPrice {
                price: reference_close,
            });
        }
        self.check_buy(ticker, proposed_dollar_size)?;

        let execution_price = apply_buy_slippage(reference_close, buy_slippage_factor);
        let shares = shares_for(proposed_dollar_size, execution_price);
        if shares == 0 {
            return Err(LedgerRefusal::ZeroShares {
                dollars: proposed_dollar_size,
                price: execution_price,
            });
        }

        let cost = shares as f64 * execution_price;
        if cost > self.cash {
            return Err(LedgerRefusal::InsufficientCash {
                needed: cost,
                available: self.cash,
            });
        }

        self.cash -= cost;
        self.positions.insert(
            ticker.to_string(),
            Position {
                ticker: ticker.to_string(),
                shares,
                entry_price: execution_price,
                entry_date: date,
                state_at_entry: state,
            },
        );

        let fill = Fill {
            ticker: ticker.to_string(),
            date,
            side: Side::Buy,
            shares,
            reference_price: reference_close,
            execution_price,
            value: cost,
            state,
        };
        self.fills.push(fill.clone());
        Ok(fill)
    }

    /// Close the whole position in `ticker` at `close * factor`.
    pub fn execute_sell(
        &mut self,
        ticker: &str,
        date: NaiveDate,
        reference_close: f64,
        sell_slippage_factor: f64,
        state: TrendState,
    ) -> Result<Trade, LedgerRefusal> {
        if !self.positions.contains_key(ticker) {
            return Err(LedgerRefusal::NoOpenPosition {
                ticker: ticker.to_string(),
            });
        }
        if !reference_close.is_finite() || reference_close <= 0.0 {
            return Err(LedgerRefusal::InvalidPrice {
                price: reference_close,
            });
        }
        let position = self
            .positions
            .remove(ticker)
            .ok_or_else(|| LedgerRefusal::NoOpenPosition {
                ticker: ticker.to_string(),
            })?;

        let exit_price = apply_sell_slippage(reference_close, sell_slippage_factor);
        let proceeds = position.shares as f64 * exit_price;
        self.cash += proceeds;

        let trade = Trade {
            ticker: position.ticker.clone(),
            entry_date: position.entry_date,
            exit_date: date,
            entry_price: position.entry_price,
            exit_price,
            shares: position.shares,
            pnl_pct: exit_price / position.entry_price - 1.0,
            pnl_dollars: position.shares as f64 * (exit_price - position.entry_price),
            hold_days: (date - position.entry_date).num_days(),
            entry_state: position.state_at_entry,
            exit_state: state,
        };

        self.fills.push(Fill {
            ticker: position.ticker,
            date,
            side: Side::Sell,
            shares: trade.shares,
            reference_price: reference_close,
            execution_price: exit_price,
            value: proceeds,
            state,
        });
        self.trades.push(trade.clone());
        Ok(trade)
    }

    /// Mark-to-market value of open positions. Missing or unusable marks fall
    /// back to the entry price.
    pub fn positions_value(&self, marks: &HashMap<String, f64>) -> f64 {
        self.positions
            .values()
            .map(|pos| {
                let price = marks
                    .get(&pos.ticker)
                    .copied()
                    .filter(|p| p.is_finite() && *p > 0.0)
                    .unwrap_or(pos.entry_price);
                pos.market_value(price)
            })
            .sum()
    }

    pub fn total_value(&self, marks: &HashMap<String, f64>) -> f64 {
        self.cash + self.positions_value(marks)
    }

    /// Value the book at `marks` and append the result to the equity curve.
    pub fn snapshot(&mut self, date: NaiveDate, marks: &HashMap<String, f64>) -> EquitySnapshot {
        let positions_value = self.positions_value(marks);
        let snapshot = EquitySnapshot {
            date,
            cash: self.cash,
            positions_value,
            total_value: self.cash + positions_value,
        };
        self.equity_curve.push(snapshot.clone());
        snapshot
    }

    pub fn into_parts(self) -> LedgerParts {
        LedgerParts {
            cash: self.cash,
            open_positions: self.positions.into_values().collect(),
            trades: self.trades,
            fills: self.fills,
            equity_curve: self.equity_curve,
        }
    }
}
