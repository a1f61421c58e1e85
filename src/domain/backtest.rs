//! Backtest configuration and the weekly simulation loop.
//!
//! One global clock walks the calendar week by week. Each tick runs in
//! phases: classify every ticker with a bar this week (read-only), close
//! positions whose state moved into an exit state, admit new entries in
//! priority order, then snapshot the ledger. Only the last three phases touch
//! the ledger and they always run in that order on the one thread that owns it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

use crate::domain::classifier::{Classifier, ClassifierConfig, SignalReading};
use crate::domain::error::GhbError;
use crate::domain::execution::LedgerRefusal;
use crate::domain::portfolio::{EquitySnapshot, PortfolioLedger};
use crate::domain::position::{Fill, Position, Side, Trade};
use crate::domain::priority::{EntryCandidate, EntryPriority};
use crate::domain::sizing::{proposed_size, Sizing, SizingStrategy};
use crate::domain::ticker_data::{weekly_calendar, TickerData};
use crate::domain::trend_state::TrendState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub universe: Vec<String>,
    pub starting_cash: f64,
    pub position_size_pct: f64,
    pub max_positions: usize,
    pub exit_states: BTreeSet<TrendState>,
    pub buy_slippage_factor: f64,
    pub sell_slippage_factor: f64,
    pub classifier: ClassifierConfig,
    pub entry_priority: EntryPriority,
    pub sizing: Sizing,
    pub risk_free_rate: f64,
}

impl BacktestConfig {
    /// Config with default strategy parameters for the given range and universe.
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, universe: Vec<String>) -> Self {
        BacktestConfig {
            start_date,
            end_date,
            universe,
            starting_cash: 100_000.0,
            position_size_pct: 0.10,
            max_positions: 10,
            exit_states: BTreeSet::from([TrendState::Exit]),
            buy_slippage_factor: 1.0,
            sell_slippage_factor: 1.0,
            classifier: ClassifierConfig::default(),
            entry_priority: EntryPriority::default(),
            sizing: Sizing::default(),
            risk_free_rate: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), GhbError> {
        if self.start_date >= self.end_date {
            return Err(GhbError::invalid(
                "backtest",
                "start_date",
                "start_date must be before end_date",
            ));
        }
        if self.universe.is_empty() {
            return Err(GhbError::missing("backtest", "tickers"));
        }
        if !self.starting_cash.is_finite() || self.starting_cash <= 0.0 {
            return Err(GhbError::invalid(
                "backtest",
                "starting_cash",
                "starting_cash must be positive",
            ));
        }
        if !(0.0..1.0).contains(&self.risk_free_rate) {
            return Err(GhbError::invalid(
                "backtest",
                "risk_free_rate",
                "risk_free_rate must be between 0 and 1",
            ));
        }
        if !(self.position_size_pct > 0.0 && self.position_size_pct <= 1.0) {
            return Err(GhbError::invalid(
                "strategy",
                "position_size_pct",
                "position_size_pct must be in (0, 1]",
            ));
        }
        if self.max_positions < 1 {
            return Err(GhbError::invalid(
                "strategy",
                "max_positions",
                "max_positions must be at least 1",
            ));
        }
        if !self.exit_states.contains(&TrendState::Exit) {
            return Err(GhbError::invalid(
                "strategy",
                "exit_states",
                "exit (N2) must always be an exit state",
            ));
        }
        if let Some(state) = self
            .exit_states
            .iter()
            .find(|s| !matches!(s, TrendState::Exit | TrendState::HoldCaution))
        {
            return Err(GhbError::invalid(
                "strategy",
                "exit_states",
                format!("{state} cannot be an exit state; only N1 and N2 are allowed"),
            ));
        }
        if !self.buy_slippage_factor.is_finite() || self.buy_slippage_factor < 1.0 {
            return Err(GhbError::invalid(
                "strategy",
                "buy_slippage_factor",
                "buy_slippage_factor must be at least 1",
            ));
        }
        if !(self.sell_slippage_factor > 0.0 && self.sell_slippage_factor <= 1.0) {
            return Err(GhbError::invalid(
                "strategy",
                "sell_slippage_factor",
                "sell_slippage_factor must be in (0, 1]",
            ));
        }
        if self.classifier.moving_average_window < 1 {
            return Err(GhbError::invalid(
                "strategy",
                "moving_average_window",
                "moving_average_window must be at least 1",
            ));
        }
        if self.classifier.momentum_window < 1 {
            return Err(GhbError::invalid(
                "strategy",
                "momentum_window",
                "momentum_window must be at least 1",
            ));
        }
        if self.classifier.entry_momentum_pct <= self.classifier.exit_momentum_pct {
            return Err(GhbError::invalid(
                "strategy",
                "entry_momentum",
                "entry_momentum must be greater than exit_momentum",
            ));
        }
        if let Sizing::Tiered { near_pct, far_pct } = self.sizing {
            if !(near_pct >= 0.0 && near_pct < far_pct) {
                return Err(GhbError::invalid(
                    "strategy",
                    "risk_tiers",
                    "risk tiers must satisfy 0 <= near < far",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationState {
    Initialized,
    Running,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum HaltReason {
    /// Every week through `end_date` was processed.
    EndOfRange,
    /// No ticker had a usable bar in the week starting `at`.
    DataExhausted { at: NaiveDate },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub ticker: String,
    pub date: NaiveDate,
    pub from: TrendState,
    pub to: TrendState,
}

/// A buy or sell the ledger refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedOrder {
    pub ticker: String,
    pub date: NaiveDate,
    pub side: Side,
    pub reason: LedgerRefusal,
}

/// What happened on one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub week: NaiveDate,
    pub date: NaiveDate,
    pub transitions: usize,
    pub buys: usize,
    pub sells: usize,
    pub snapshot: EquitySnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub starting_cash: f64,
    pub final_cash: f64,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquitySnapshot>,
    pub fills: Vec<Fill>,
    pub open_positions: Vec<Position>,
    pub transitions: Vec<StateTransition>,
    pub skipped: Vec<SkippedOrder>,
    pub halt: HaltReason,
    pub ticks_processed: usize,
}

struct Signal<'d> {
    ticker: &'d str,
    date: NaiveDate,
    close: f64,
    prev: TrendState,
    next: TrendState,
    reading: Option<SignalReading>,
}

impl Signal<'_> {
    fn changed(&self) -> bool {
        self.prev != self.next
    }
}

pub struct Simulation<'a> {
    config: &'a BacktestConfig,
    data: Vec<&'a TickerData>,
    classifier: Classifier,
    sizing: Box<dyn SizingStrategy>,
    ledger: PortfolioLedger,
    calendar: Vec<NaiveDate>,
    cursor: usize,
    state: SimulationState,
    halt: Option<HaltReason>,
    trend: BTreeMap<String, TrendState>,
    last_close: HashMap<String, f64>,
    transitions: Vec<StateTransition>,
    skipped: Vec<SkippedOrder>,
}

impl<'a> Simulation<'a> {
    /// Validate `config` and seed every ticker's state from its warm-up bars.
    pub fn new(config: &'a BacktestConfig, data: &'a [TickerData]) -> Result<Self, GhbError> {
        config.validate()?;

        let mut data: Vec<&TickerData> = data
            .iter()
            .filter(|td| {
                let listed = config.universe.contains(&td.ticker);
                if !listed {
                    warn!(ticker = %td.ticker, "not in the configured universe, ignoring");
                }
                listed
            })
            .collect();
        data.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        data.dedup_by(|a, b| a.ticker == b.ticker);

        let classifier = Classifier::new(config.classifier.clone());
        let calendar = weekly_calendar(config.start_date, config.end_date);

        let mut trend = BTreeMap::new();
        if let Some(&first_week) = calendar.first() {
            for td in &data {
                let warmup = td.history_before(first_week);
                let seeded = classifier.classify(warmup);
                debug!(ticker = %td.ticker, state = %seeded, bars = warmup.len(), "seeded");
                trend.insert(td.ticker.clone(), seeded);
            }
        }

        Ok(Simulation {
            config,
            data,
            classifier,
            sizing: config.sizing.strategy(),
            ledger: PortfolioLedger::new(config.starting_cash, config.max_positions),
            calendar,
            cursor: 0,
            state: SimulationState::Initialized,
            halt: None,
            trend,
            last_close: HashMap::new(),
            transitions: Vec::new(),
            skipped: Vec::new(),
        })
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn halt_reason(&self) -> Option<HaltReason> {
        self.halt
    }

    pub fn ledger(&self) -> &PortfolioLedger {
        &self.ledger
    }

    pub fn trend_state(&self, ticker: &str) -> Option<TrendState> {
        self.trend.get(ticker).copied()
    }

    pub fn ticks_processed(&self) -> usize {
        self.ledger.equity_curve().len()
    }

    fn complete(&mut self, reason: HaltReason) {
        self.state = SimulationState::Completed;
        self.halt = Some(reason);
    }

    /// Process the next week. Returns `None` once the run has completed.
    pub fn step(&mut self) -> Option<TickOutcome> {
        if self.state == SimulationState::Completed {
            return None;
        }
        let Some(&week) = self.calendar.get(self.cursor) else {
            self.complete(HaltReason::EndOfRange);
            return None;
        };
        self.cursor += 1;
        self.state = SimulationState::Running;

        let signals = self.classify_week(week);
        let Some(tick_date) = signals.iter().map(|s| s.date).max() else {
            warn!(%week, "no price data for any ticker; halting");
            self.complete(HaltReason::DataExhausted { at: week });
            return None;
        };

        let transitions = signals.iter().filter(|s| s.changed()).count();
        let sells = self.process_exits(&signals);
        let buys = self.process_entries(&signals);
        let snapshot = self.ledger.snapshot(tick_date, &self.last_close);

        if self.cursor >= self.calendar.len() {
            self.complete(HaltReason::EndOfRange);
        }

        Some(TickOutcome {
            week,
            date: tick_date,
            transitions,
            buys,
            sells,
            snapshot,
        })
    }

    /// Read-only phase: new state for every ticker with a usable bar this week.
    fn classify_week(&mut self, week: NaiveDate) -> Vec<Signal<'a>> {
        let mut signals = Vec::new();
        for &td in &self.data {
            let Some(index) = td.bar_index(week) else {
                continue;
            };
            let bar = &td.bars[index];
            if !bar.is_tradable() {
                warn!(ticker = %td.ticker, date = %bar.date, close = bar.close, "unusable bar; skipping ticker this week");
                continue;
            }

            let history = td.history_through(index);
            let prev = self.trend.get(&td.ticker).copied().unwrap_or(TrendState::Neutral);
            let next = self.classifier.step(prev, history);
            let reading = self.classifier.reading(history);

            self.last_close.insert(td.ticker.clone(), bar.close);
            self.trend.insert(td.ticker.clone(), next);
            if prev != next {
                debug!(ticker = %td.ticker, date = %bar.date, from = %prev, to = %next, "transition");
                self.transitions.push(StateTransition {
                    ticker: td.ticker.clone(),
                    date: bar.date,
                    from: prev,
                    to: next,
                });
            }

            signals.push(Signal {
                ticker: &td.ticker,
                date: bar.date,
                close: bar.close,
                prev,
                next,
                reading,
            });
        }
        signals
    }

    fn skip(&mut self, ticker: &str, date: NaiveDate, side: Side, reason: LedgerRefusal) {
        warn!(%ticker, %date, ?side, %reason, "order skipped");
        self.skipped.push(SkippedOrder {
            ticker: ticker.to_string(),
            date,
            side,
            reason,
        });
    }

    fn process_exits(&mut self, signals: &[Signal<'_>]) -> usize {
        let mut sells = 0;
        for signal in signals {
            if !signal.changed()
                || !self.config.exit_states.contains(&signal.next)
                || !self.ledger.has_position(signal.ticker)
            {
                continue;
            }
            match self.ledger.execute_sell(
                signal.ticker,
                signal.date,
                signal.close,
                self.config.sell_slippage_factor,
                signal.next,
            ) {
                Ok(trade) => {
                    info!(
                        ticker = %trade.ticker,
                        date = %trade.exit_date,
                        price = trade.exit_price,
                        pnl_pct = trade.pnl_pct * 100.0,
                        "SELL"
                    );
                    sells += 1;
                }
                Err(reason) => self.skip(signal.ticker, signal.date, Side::Sell, reason),
            }
        }
        sells
    }

    fn process_entries(&mut self, signals: &[Signal<'_>]) -> usize {
        let mut candidates: Vec<EntryCandidate> = signals
            .iter()
            .filter(|s| s.changed() && s.next == TrendState::Accumulate)
            .filter(|s| !self.ledger.has_position(s.ticker))
            .filter_map(|s| {
                s.reading.map(|reading| EntryCandidate {
                    ticker: s.ticker.to_string(),
                    reading,
                })
            })
            .collect();
        if candidates.is_empty() {
            return 0;
        }
        self.config.entry_priority.rank(&mut candidates);

        let portfolio_value = self.ledger.total_value(&self.last_close);
        let mut buys = 0;

        for candidate in candidates {
            let Some(signal) = signals.iter().find(|s| s.ticker == candidate.ticker) else {
                continue;
            };
            let size = proposed_size(
                portfolio_value,
                self.config.position_size_pct,
                self.sizing.as_ref(),
                &candidate.reading,
            );
            if let Err(reason) = self.ledger.check_buy(signal.ticker, size) {
                self.skip(signal.ticker, signal.date, Side::Buy, reason);
                continue;
            }
            match self.ledger.execute_buy(
                signal.ticker,
                signal.date,
                signal.close,
                size,
                self.config.buy_slippage_factor,
                signal.next,
            ) {
                Ok(fill) => {
                    info!(
                        ticker = %fill.ticker,
                        date = %fill.date,
                        shares = fill.shares,
                        price = fill.execution_price,
                        "BUY"
                    );
                    buys += 1;
                }
                Err(reason) => self.skip(signal.ticker, signal.date, Side::Buy, reason),
            }
        }
        buys
    }

    /// Run every remaining tick and assemble the result.
    pub fn run(mut self) -> BacktestResult {
        while self.step().is_some() {}
        self.into_result()
    }

    pub fn into_result(self) -> BacktestResult {
        let halt = self.halt.unwrap_or(HaltReason::EndOfRange);
        let ticks_processed = self.ticks_processed();
        let starting_cash = self.ledger.starting_cash();
        let parts = self.ledger.into_parts();
        BacktestResult {
            starting_cash,
            final_cash: parts.cash,
            trades: parts.trades,
            equity_curve: parts.equity_curve,
            fills: parts.fills,
            open_positions: parts.open_positions,
            transitions: self.transitions,
            skipped: self.skipped,
            halt,
            ticks_processed,
        }
    }
}

/// Validate `config` and simulate it over `data`.
pub fn run_backtest(data: &[TickerData], config: &BacktestConfig) -> Result<BacktestResult, GhbError> {
    let simulation = Simulation::new(config, data)?;
    info!(
        tickers = data.len(),
        start = %config.start_date,
        end = %config.end_date,
        "running backtest"
    );
    let result = simulation.run();
    if let HaltReason::DataExhausted { at } = result.halt {
        warn!(week = %at, ticks = result.ticks_processed, "data exhausted before end_date; results are partial");
    }
    Ok(result)
}
