//! Fill pricing and ledger refusals.
//!
//! Slippage is a multiplicative factor on the reference close: a buy factor
//! above 1 models paying a gap up into the next period, a sell factor below 1
//! models giving some of the close back on the way out.

use serde::{Deserialize, Serialize};

/// Buy: execution_price = reference_close * factor
pub fn apply_buy_slippage(reference_close: f64, buy_slippage_factor: f64) -> f64 {
    reference_close * buy_slippage_factor
}

/// Sell: execution_price = reference_close * factor
pub fn apply_sell_slippage(reference_close: f64, sell_slippage_factor: f64) -> f64 {
    reference_close * sell_slippage_factor
}

/// Whole shares purchasable with `dollars` at `price`.
pub fn shares_for(dollars: f64, price: f64) -> u64 {
    if !price.is_finite() || price <= 0.0 || !dollars.is_finite() || dollars <= 0.0 {
        return 0;
    }
    (dollars / price).floor() as u64
}

/// Why the ledger refused an instruction. None of these are fatal.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerRefusal {
    #[error("insufficient cash: need {needed:.2}, have {available:.2}")]
    InsufficientCash { needed: f64, available: f64 },

    #[error("no open position in {ticker}")]
    NoOpenPosition { ticker: String },

    #[error("position already open in {ticker}")]
    TickerAlreadyOpen { ticker: String },

    #[error("all {max} position slots in use")]
    MaxPositionsReached { max: usize },

    #[error("{dollars:.2} buys no whole shares at {price:.4}")]
    ZeroShares { dollars: f64, price: f64 },

    #[error("unusable price {price}")]
    InvalidPrice { price: f64 },
}
