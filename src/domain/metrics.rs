//! Performance metrics over a completed run.
//!
//! Everything here is a pure function of the trade log and equity curve, so
//! the same inputs always produce bit-identical output.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::portfolio::EquitySnapshot;
use super::position::Trade;

const WEEKS_PER_YEAR: f64 = 52.0;
const DAYS_PER_YEAR: f64 = 365.25;
/// `initial_value` is the balance one tick before the first snapshot.
const DAYS_PER_TICK: i64 = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub initial_value: f64,
    pub final_value: f64,
    pub total_return_pct: f64,
    pub cagr: f64,
    /// Deepest peak-to-trough decline as a fraction, never positive.
    pub max_drawdown: f64,
    /// Longest run of ticks spent below a prior peak.
    pub max_drawdown_duration: usize,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    /// Gross dollar profit over gross dollar loss. Infinite when nothing lost.
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_hold_days: f64,
}

impl Metrics {
    pub fn compute(
        trades: &[Trade],
        equity_curve: &[EquitySnapshot],
        initial_value: f64,
        risk_free_rate: f64,
    ) -> Self {
        let final_value = equity_curve
            .last()
            .map(|s| s.total_value)
            .unwrap_or(initial_value);

        let total_return_pct = if initial_value > 0.0 {
            final_value / initial_value - 1.0
        } else {
            0.0
        };

        let cagr = compute_cagr(equity_curve, initial_value, final_value);
        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);
        let (sharpe_ratio, sortino_ratio) =
            compute_risk_adjusted(equity_curve, risk_free_rate / WEEKS_PER_YEAR);

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut sum_win_pct = 0.0_f64;
        let mut sum_loss_pct = 0.0_f64;
        let mut gross_profit = 0.0_f64;
        let mut gross_loss = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_hold_days = 0i64;

        for trade in trades {
            if trade.is_winner() {
                trades_won += 1;
                sum_win_pct += trade.pnl_pct;
                largest_win = largest_win.max(trade.pnl_pct);
            } else if trade.is_loser() {
                trades_lost += 1;
                sum_loss_pct += trade.pnl_pct;
                largest_loss = largest_loss.min(trade.pnl_pct);
            } else {
                trades_breakeven += 1;
            }

            if trade.pnl_dollars > 0.0 {
                gross_profit += trade.pnl_dollars;
            } else {
                gross_loss -= trade.pnl_dollars;
            }
            total_hold_days += trade.hold_days;
        }

        let total_trades = trades.len();
        let win_rate = ratio(trades_won as f64, total_trades);

        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else {
            f64::INFINITY
        };

        Metrics {
            initial_value,
            final_value,
            total_return_pct,
            cagr,
            max_drawdown,
            max_drawdown_duration,
            sharpe_ratio,
            sortino_ratio,
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate,
            profit_factor,
            avg_win: ratio(sum_win_pct, trades_won),
            avg_loss: ratio(sum_loss_pct, trades_lost),
            largest_win,
            largest_loss,
            avg_hold_days: ratio(total_hold_days as f64, total_trades),
        }
    }
}

fn ratio(sum: f64, count: usize) -> f64 {
    if count > 0 { sum / count as f64 } else { 0.0 }
}

fn compute_cagr(equity_curve: &[EquitySnapshot], initial_value: f64, final_value: f64) -> f64 {
    let (Some(first), Some(last)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };
    let elapsed_days = (last.date - first.date).num_days() + DAYS_PER_TICK;
    if elapsed_days <= 0 || initial_value <= 0.0 || final_value <= 0.0 {
        return 0.0;
    }
    let years = elapsed_days as f64 / DAYS_PER_YEAR;
    (final_value / initial_value).powf(1.0 / years) - 1.0
}

fn compute_drawdown(equity_curve: &[EquitySnapshot]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.total_value;
    let mut max_dd = 0.0_f64;
    let mut run = 0usize;
    let mut longest = 0usize;

    for snapshot in equity_curve {
        let value = snapshot.total_value;
        if value >= peak {
            peak = value;
            run = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.min((value - peak) / peak);
            run += 1;
            longest = longest.max(run);
        }
    }

    (max_dd, longest)
}

fn compute_risk_adjusted(equity_curve: &[EquitySnapshot], period_rf: f64) -> (f64, f64) {
    if equity_curve.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].total_value;
            if prev > 0.0 {
                w[1].total_value / prev - 1.0
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    let excess = mean - period_rf;
    let annualise = WEEKS_PER_YEAR.sqrt();

    let sharpe = if stddev > 0.0 {
        excess / stddev * annualise
    } else {
        0.0
    };

    let downside_sq: f64 = returns
        .iter()
        .map(|r| r - period_rf)
        .filter(|e| *e < 0.0)
        .map(|e| e * e)
        .sum();
    let downside_dev = (downside_sq / n).sqrt();

    let sortino = if downside_dev > 0.0 {
        excess / downside_dev * annualise
    } else {
        0.0
    };

    (sharpe, sortino)
}

/// Trade statistics for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerResult {
    pub ticker: String,
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
}

impl TickerResult {
    /// One entry per ticker that traded, sorted by ticker.
    pub fn compute_per_ticker(trades: &[Trade]) -> Vec<TickerResult> {
        let mut by_ticker: BTreeMap<&str, TickerResult> = BTreeMap::new();
        for trade in trades {
            let entry = by_ticker
                .entry(trade.ticker.as_str())
                .or_insert_with(|| TickerResult {
                    ticker: trade.ticker.clone(),
                    trades: 0,
                    wins: 0,
                    losses: 0,
                    win_rate: 0.0,
                    total_pnl: 0.0,
                });
            entry.trades += 1;
            if trade.is_winner() {
                entry.wins += 1;
            } else if trade.is_loser() {
                entry.losses += 1;
            }
            entry.total_pnl += trade.pnl_dollars;
        }

        by_ticker
            .into_values()
            .map(|mut r| {
                r.win_rate = ratio(r.wins as f64, r.trades);
                r
            })
            .collect()
    }
}
