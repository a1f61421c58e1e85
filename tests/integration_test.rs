//! Integration tests for the simulation loop and metrics.
//!
//! Tests cover:
//! - Single breakout entry at the slippage-adjusted signal close
//! - Contention for one slot or for cash between tickers signalling together
//! - Open positions marked at the last close and kept out of the trade log
//! - Zero-trade runs and the analyzer's sentinel values
//! - Ledger conservation, the concurrency cap and one position per ticker
//! - Data exhaustion, missing weeks and partial universes

mod common;

use approx::assert_relative_eq;
use common::*;
use ghbtrader::domain::backtest::{run_backtest, BacktestConfig, HaltReason, Simulation, SimulationState};
use ghbtrader::domain::error::GhbError;
use ghbtrader::domain::execution::LedgerRefusal;
use ghbtrader::domain::metrics::Metrics;
use ghbtrader::domain::ohlcv::week_start;
use ghbtrader::domain::position::Side;
use ghbtrader::domain::priority::EntryPriority;
use ghbtrader::domain::sizing::Sizing;
use ghbtrader::domain::ticker_data::TickerData;
use ghbtrader::domain::trend_state::TrendState;
use ghbtrader::domain::universe::{validate_universe, SkipReason};
use std::collections::BTreeSet;

fn accumulate_count(result: &ghbtrader::domain::backtest::BacktestResult, ticker: &str) -> usize {
    result
        .transitions
        .iter()
        .filter(|t| t.ticker == ticker && t.to == TrendState::Accumulate)
        .count()
}

mod single_breakout {
    use super::*;

    #[test]
    fn one_accumulate_and_one_buy_at_slippage_price() {
        let data = vec![ticker_data("AAA", &breakout_closes(6, 6))];
        let mut config = sample_config(&["AAA"], 12);
        config.buy_slippage_factor = 1.02;

        let result = run_backtest(&data, &config).unwrap();

        assert_eq!(accumulate_count(&result, "AAA"), 1);
        assert_eq!(result.fills.len(), 1);
        let fill = &result.fills[0];
        assert_eq!(fill.side, Side::Buy);
        assert_eq!(fill.ticker, "AAA");
        assert_eq!(fill.date, friday(6));
        assert_relative_eq!(fill.reference_price, 110.0);
        assert_relative_eq!(fill.execution_price, 112.2, epsilon = 1e-9);
        assert_eq!(fill.shares, 89);
        assert_eq!(fill.state, TrendState::Accumulate);
    }

    #[test]
    fn flat_history_classifies_exit_before_breakout() {
        let data = vec![ticker_data("AAA", &breakout_closes(6, 6))];
        let config = sample_config(&["AAA"], 12);
        let result = run_backtest(&data, &config).unwrap();

        let path: Vec<(TrendState, TrendState)> =
            result.transitions.iter().map(|t| (t.from, t.to)).collect();
        assert_eq!(
            path,
            vec![
                (TrendState::Neutral, TrendState::Exit),
                (TrendState::Exit, TrendState::Accumulate),
                (TrendState::Accumulate, TrendState::HoldLong),
            ]
        );
        assert_eq!(result.transitions[0].date, friday(3));
        assert_eq!(result.transitions[1].date, friday(6));
    }

    #[test]
    fn warm_up_bars_seed_state_without_trading() {
        // Breakout happens before start_date; only the holding period is simulated.
        let data = vec![ticker_data("AAA", &breakout_closes(6, 10))];
        let mut config = sample_config(&["AAA"], 16);
        config.start_date = friday(8);

        let mut sim = Simulation::new(&config, &data).unwrap();
        assert_eq!(sim.trend_state("AAA"), Some(TrendState::HoldLong));
        while sim.step().is_some() {}
        let result = sim.into_result();

        assert!(result.fills.is_empty());
        assert_eq!(result.ticks_processed, 8);
        assert_eq!(result.equity_curve[0].date, friday(8));
    }
}

mod contention {
    use super::*;

    #[test]
    fn one_slot_goes_to_first_ticker() {
        let closes = breakout_closes(6, 6);
        let data = vec![ticker_data("BBB", &closes), ticker_data("AAA", &closes)];
        let mut config = sample_config(&["AAA", "BBB"], 12);
        config.max_positions = 1;

        let result = run_backtest(&data, &config).unwrap();

        assert_eq!(result.fills.len(), 1);
        assert_eq!(result.fills[0].ticker, "AAA");
        assert_eq!(result.skipped.len(), 1);
        let skipped = &result.skipped[0];
        assert_eq!(skipped.ticker, "BBB");
        assert_eq!(skipped.side, Side::Buy);
        assert_eq!(skipped.reason, LedgerRefusal::MaxPositionsReached { max: 1 });
    }

    #[test]
    fn momentum_priority_prefers_stronger_breakout() {
        let mut strong = vec![100.0; 6];
        strong.extend([120.0, 121.0, 122.0, 123.0, 124.0, 125.0]);
        let data = vec![
            ticker_data("AAA", &breakout_closes(6, 6)),
            ticker_data("BBB", &strong),
        ];
        let mut config = sample_config(&["AAA", "BBB"], 12);
        config.max_positions = 1;
        config.entry_priority = EntryPriority::Momentum;

        let result = run_backtest(&data, &config).unwrap();

        assert_eq!(result.fills.len(), 1);
        assert_eq!(result.fills[0].ticker, "BBB");
        assert_eq!(result.skipped[0].ticker, "AAA");
    }

    #[test]
    fn cash_runs_out_before_slots() {
        let closes = breakout_closes(6, 6);
        let data = vec![ticker_data("AAA", &closes), ticker_data("BBB", &closes)];
        let mut config = sample_config(&["AAA", "BBB"], 12);
        config.position_size_pct = 1.0;
        config.max_positions = 2;

        let result = run_backtest(&data, &config).unwrap();

        assert_eq!(result.fills.len(), 1);
        assert_eq!(result.fills[0].shares, 909);
        assert!(matches!(
            result.skipped[0].reason,
            LedgerRefusal::InsufficientCash { .. }
        ));
    }

    #[test]
    fn sizing_uses_value_after_exits() {
        // AAA rides up then collapses in the same week BBB breaks out.
        let mut aaa = breakout_closes(6, 4);
        aaa.extend([80.0, 80.0]);
        let mut bbb = vec![100.0; 10];
        bbb.extend([110.0, 112.0]);
        let data = vec![ticker_data("AAA", &aaa), ticker_data("BBB", &bbb)];
        let mut config = sample_config(&["AAA", "BBB"], 12);
        config.max_positions = 1;

        let result = run_backtest(&data, &config).unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].ticker, "AAA");
        assert_eq!(result.trades[0].exit_date, friday(10));

        let bbb_buy = result
            .fills
            .iter()
            .find(|f| f.ticker == "BBB")
            .expect("BBB bought once the slot freed up");
        assert_eq!(bbb_buy.date, friday(10));
        let value_after_exit = config.starting_cash + result.trades[0].pnl_dollars;
        assert_eq!(bbb_buy.shares, (value_after_exit * 0.10 / 110.0).floor() as u64);
    }

    #[test]
    fn tiered_sizing_scales_extended_entries() {
        // A 30% gap leaves close far above the 4-week average.
        let mut closes = vec![100.0; 6];
        closes.extend([130.0, 131.0, 132.0]);
        let data = vec![ticker_data("AAA", &closes)];
        let mut config = sample_config(&["AAA"], 9);
        config.sizing = Sizing::Tiered {
            near_pct: 5.0,
            far_pct: 10.0,
        };

        let result = run_backtest(&data, &config).unwrap();
        // average 107.5, distance ~20.9% → half size
        assert_eq!(result.fills[0].shares, (5_000.0_f64 / 130.0).floor() as u64);
    }
}

mod open_positions {
    use super::*;

    #[test]
    fn open_position_marked_at_last_close_and_not_traded() {
        let closes = breakout_closes(6, 6);
        let data = vec![ticker_data("AAA", &closes)];
        let config = sample_config(&["AAA"], 12);

        let result = run_backtest(&data, &config).unwrap();

        assert!(result.trades.is_empty());
        assert_eq!(result.open_positions.len(), 1);
        let pos = &result.open_positions[0];
        let last = result.equity_curve.last().unwrap();
        assert_eq!(last.date, friday(11));
        assert_relative_eq!(last.positions_value, pos.shares as f64 * closes[11], epsilon = 1e-9);
        assert_relative_eq!(last.total_value, result.final_cash + last.positions_value, epsilon = 1e-9);

        let metrics = Metrics::compute(&result.trades, &result.equity_curve, result.starting_cash, 0.0);
        assert_eq!(metrics.total_trades, 0);
        assert_relative_eq!(metrics.final_value, last.total_value);
        assert!(metrics.total_return_pct > 0.0);
    }

    #[test]
    fn collapse_closes_position_with_sell_slippage() {
        let mut closes = breakout_closes(6, 3);
        closes.extend([90.0, 90.0, 90.0]);
        let data = vec![ticker_data("AAA", &closes)];
        let mut config = sample_config(&["AAA"], 12);
        config.sell_slippage_factor = 0.99;

        let result = run_backtest(&data, &config).unwrap();

        assert_eq!(result.trades.len(), 1);
        let trade = &result.trades[0];
        assert_eq!(trade.entry_date, friday(6));
        assert_eq!(trade.exit_date, friday(9));
        assert_eq!(trade.hold_days, 21);
        assert_relative_eq!(trade.exit_price, 89.1, epsilon = 1e-9);
        assert_relative_eq!(trade.pnl_pct, 89.1 / 110.0 - 1.0, epsilon = 1e-12);
        assert_eq!(trade.exit_state, TrendState::Exit);
        assert!(result.open_positions.is_empty());
    }

    #[test]
    fn caution_only_exits_when_configured() {
        // Stalls after the breakout: momentum 0 → HoldCaution, price still above average.
        let mut closes = vec![100.0; 6];
        closes.extend([110.0, 110.0, 110.0]);
        let data = vec![ticker_data("AAA", &closes)];

        let default_run = run_backtest(&data, &sample_config(&["AAA"], 9)).unwrap();
        assert!(default_run.trades.is_empty());

        let mut config = sample_config(&["AAA"], 9);
        config.exit_states = BTreeSet::from([TrendState::HoldCaution, TrendState::Exit]);
        let result = run_backtest(&data, &config).unwrap();
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_state, TrendState::HoldCaution);
        assert_eq!(result.trades[0].exit_date, friday(7));
    }

    #[test]
    fn crash_through_caution_set_still_sells() {
        let mut closes = breakout_closes(6, 3);
        closes.push(60.0);
        let data = vec![ticker_data("AAA", &closes)];

        let mut config = sample_config(&["AAA"], 10);
        config.exit_states = BTreeSet::from([TrendState::HoldCaution, TrendState::Exit]);
        let result = run_backtest(&data, &config).unwrap();
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_state, TrendState::Exit);
        assert_eq!(result.trades[0].exit_date, friday(9));
        assert!(result.open_positions.is_empty());
    }

    #[test]
    fn exit_set_without_exit_state_is_rejected() {
        let data = vec![ticker_data("AAA", &breakout_closes(6, 3))];
        let mut config = sample_config(&["AAA"], 9);
        config.exit_states = BTreeSet::from([TrendState::HoldCaution]);
        let err = run_backtest(&data, &config).unwrap_err();
        assert!(err.is_config_error());
    }
}

mod zero_trades {
    use super::*;

    #[test]
    fn flat_run_has_sentinel_metrics() {
        let data = vec![ticker_data("AAA", &[100.0; 12])];
        let config = sample_config(&["AAA"], 12);

        let result = run_backtest(&data, &config).unwrap();
        assert!(result.fills.is_empty());
        assert_eq!(result.equity_curve.len(), 12);

        let metrics = Metrics::compute(&result.trades, &result.equity_curve, result.starting_cash, 0.0);
        assert_eq!(metrics.win_rate, 0.0);
        assert!(metrics.profit_factor.is_infinite());
        assert_eq!(metrics.cagr, 0.0);
        assert_eq!(metrics.total_return_pct, 0.0);
        assert_eq!(metrics.max_drawdown, 0.0);
    }
}

mod invariants {
    use super::*;

    fn busy_data() -> Vec<TickerData> {
        let wave = |phase: usize| -> Vec<f64> {
            (0..40)
                .map(|i| 100.0 + 20.0 * (((i + phase) as f64) * 0.45).sin())
                .collect()
        };
        vec![
            ticker_data("AAA", &wave(0)),
            ticker_data("BBB", &wave(3)),
            ticker_data("CCC", &wave(5)),
            ticker_data("DDD", &wave(9)),
        ]
    }

    fn busy_config() -> BacktestConfig {
        let mut config = sample_config(&["AAA", "BBB", "CCC", "DDD"], 40);
        config.max_positions = 2;
        config.position_size_pct = 0.4;
        config.buy_slippage_factor = 1.01;
        config.sell_slippage_factor = 0.995;
        config
    }

    #[test]
    fn ledger_conserves_value() {
        let data = busy_data();
        let config = busy_config();
        let result = run_backtest(&data, &config).unwrap();
        assert!(!result.trades.is_empty());

        let realised: f64 = result.trades.iter().map(|t| t.pnl_dollars).sum();
        let open_cost: f64 = result.open_positions.iter().map(|p| p.cost_basis()).sum();
        assert_relative_eq!(
            result.final_cash + open_cost,
            config.starting_cash + realised,
            epsilon = 1e-6
        );

        for snap in &result.equity_curve {
            assert_relative_eq!(snap.total_value, snap.cash + snap.positions_value, epsilon = 1e-9);
            assert!(snap.cash >= 0.0);
        }
    }

    #[test]
    fn concurrency_cap_holds_every_tick() {
        let data = busy_data();
        let config = busy_config();
        let mut sim = Simulation::new(&config, &data).unwrap();
        while sim.step().is_some() {
            assert!(sim.ledger().open_position_count() <= config.max_positions);
        }
        assert_eq!(sim.state(), SimulationState::Completed);
    }

    #[test]
    fn at_most_one_position_per_ticker() {
        let result = run_backtest(&busy_data(), &busy_config()).unwrap();
        for ticker in ["AAA", "BBB", "CCC", "DDD"] {
            let mut open = false;
            for fill in result.fills.iter().filter(|f| f.ticker == ticker) {
                match fill.side {
                    Side::Buy => {
                        assert!(!open, "{ticker} bought twice without a sell");
                        open = true;
                    }
                    Side::Sell => {
                        assert!(open, "{ticker} sold without a position");
                        open = false;
                    }
                }
            }
        }
    }

    #[test]
    fn runs_are_deterministic() {
        let data = busy_data();
        let config = busy_config();
        let a = run_backtest(&data, &config).unwrap();
        let b = run_backtest(&data, &config).unwrap();
        assert_eq!(a, b);
    }
}

mod data_edges {
    use super::*;

    #[test]
    fn halts_when_data_runs_out() {
        let data = vec![ticker_data("AAA", &[100.0; 5])];
        let config = sample_config(&["AAA"], 10);

        let result = run_backtest(&data, &config).unwrap();

        assert_eq!(result.ticks_processed, 5);
        assert_eq!(result.equity_curve.len(), 5);
        assert_eq!(
            result.halt,
            HaltReason::DataExhausted {
                at: week_start(friday(5))
            }
        );
    }

    #[test]
    fn completes_at_end_of_range() {
        let data = vec![ticker_data("AAA", &[100.0; 10])];
        let config = sample_config(&["AAA"], 10);
        let result = run_backtest(&data, &config).unwrap();
        assert_eq!(result.halt, HaltReason::EndOfRange);
        assert_eq!(result.ticks_processed, 10);
    }

    #[test]
    fn missing_week_leaves_state_unchanged() {
        let mut bars = weekly_bars("BBB", &breakout_closes(6, 6));
        bars.remove(8);
        let data = vec![
            ticker_data("AAA", &[100.0; 12]),
            TickerData::new("BBB".into(), bars),
        ];
        let config = sample_config(&["AAA", "BBB"], 12);

        let mut sim = Simulation::new(&config, &data).unwrap();
        for _ in 0..8 {
            sim.step();
        }
        let before = sim.trend_state("BBB");
        sim.step();
        assert_eq!(sim.trend_state("BBB"), before);
    }

    #[test]
    fn bad_close_is_skipped_for_that_ticker() {
        let mut closes = breakout_closes(6, 6);
        closes[8] = 0.0;
        let data = vec![ticker_data("AAA", &[100.0; 12]), ticker_data("BBB", &closes)];
        let config = sample_config(&["AAA", "BBB"], 12);

        let result = run_backtest(&data, &config).unwrap();
        assert_eq!(result.halt, HaltReason::EndOfRange);
        assert_eq!(result.ticks_processed, 12);
        assert!(!result.transitions.iter().any(|t| t.date == friday(8)));
    }

    #[test]
    fn bad_config_fails_before_simulating() {
        let data = vec![ticker_data("AAA", &[100.0; 12])];
        let mut config = sample_config(&["AAA"], 12);
        config.position_size_pct = 0.0;
        assert!(matches!(
            run_backtest(&data, &config),
            Err(GhbError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn data_outside_universe_is_ignored() {
        let data = vec![
            ticker_data("AAA", &[100.0; 12]),
            ticker_data("ZZZ", &breakout_closes(6, 6)),
        ];
        let config = sample_config(&["AAA"], 12);
        let result = run_backtest(&data, &config).unwrap();
        assert!(result.fills.is_empty());
        assert!(result.transitions.iter().all(|t| t.ticker == "AAA"));
    }
}

mod universe {
    use super::*;

    #[test]
    fn partial_universe_proceeds() {
        let port = MockDataPort::new()
            .with_bars("AAA", weekly_bars("AAA", &breakout_closes(6, 6)))
            .with_bars("EMPTY", vec![])
            .with_error("BROKEN", "connection refused");
        let config = sample_config(&["AAA", "BROKEN", "EMPTY"], 12);

        let validation = validate_universe(
            &port,
            &config.universe,
            config.start_date,
            config.end_date,
            config.classifier.lookback(),
        )
        .unwrap();

        assert_eq!(validation.universe.tickers, vec!["AAA"]);
        assert_eq!(validation.skipped.len(), 2);
        assert!(validation
            .skipped
            .iter()
            .any(|s| s.ticker == "EMPTY" && s.reason == SkipReason::NoData));

        let result = run_backtest(&validation.data, &config).unwrap();
        assert_eq!(result.fills.len(), 1);
    }

    #[test]
    fn nothing_usable_is_an_error() {
        let port = MockDataPort::new().with_error("AAA", "gone");
        let config = sample_config(&["AAA"], 12);
        let err = validate_universe(&port, &config.universe, config.start_date, config.end_date, 4)
            .unwrap_err();
        assert!(matches!(err, GhbError::InsufficientData { .. }));
    }
}
