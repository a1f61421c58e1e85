//! Build a validated `BacktestConfig` from a `ConfigPort`.
//!
//! Keys live in two sections: `[backtest]` for the run (dates, tickers, cash,
//! data source) and `[strategy]` for the trading rules. Absent keys take
//! their defaults; present keys that do not parse are `ConfigInvalid`.

use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::GhbError;
use crate::domain::priority::EntryPriority;
use crate::domain::sizing::{ProximityTiers, Sizing};
use crate::domain::trend_state::TrendState;
use crate::domain::universe::parse_tickers;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_DATA_DIR: &str = "data";

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, GhbError> {
    let start_date = required_date(config, "start_date")?;
    let end_date = required_date(config, "end_date")?;
    let tickers = config
        .get_string("backtest", "tickers")
        .ok_or_else(|| GhbError::missing("backtest", "tickers"))?;
    let universe = parse_tickers(&tickers)
        .map_err(|e| GhbError::invalid("backtest", "tickers", e.to_string()))?;

    let mut built = BacktestConfig::new(start_date, end_date, universe);

    if let Some(v) = double(config, "backtest", "starting_cash")? {
        built.starting_cash = v;
    }
    if let Some(v) = double(config, "backtest", "risk_free_rate")? {
        built.risk_free_rate = v;
    }
    if let Some(v) = double(config, "strategy", "position_size_pct")? {
        built.position_size_pct = v;
    }
    if let Some(v) = count(config, "strategy", "max_positions")? {
        built.max_positions = v;
    }
    if let Some(v) = double(config, "strategy", "buy_slippage_factor")? {
        built.buy_slippage_factor = v;
    }
    if let Some(v) = double(config, "strategy", "sell_slippage_factor")? {
        built.sell_slippage_factor = v;
    }
    if let Some(v) = count(config, "strategy", "moving_average_window")? {
        built.classifier.moving_average_window = v;
    }
    if let Some(v) = count(config, "strategy", "momentum_window")? {
        built.classifier.momentum_window = v;
    }
    if let Some(v) = double(config, "strategy", "entry_momentum")? {
        built.classifier.entry_momentum_pct = v;
    }
    if let Some(v) = double(config, "strategy", "exit_momentum")? {
        built.classifier.exit_momentum_pct = v;
    }
    if let Some(raw) = config.get_string("strategy", "exit_states") {
        built.exit_states = parse_exit_states(&raw)?;
    }
    if let Some(raw) = config.get_string("strategy", "entry_priority") {
        built.entry_priority = EntryPriority::from_str(&raw)
            .map_err(|reason| GhbError::invalid("strategy", "entry_priority", reason))?;
    }
    built.sizing = parse_sizing(config)?;

    built.validate()?;
    Ok(built)
}

/// Directory holding `<TICKER>.csv` files.
pub fn data_dir(config: &dyn ConfigPort) -> PathBuf {
    config
        .get_string("backtest", "data_dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

fn required_date(config: &dyn ConfigPort, key: &str) -> Result<NaiveDate, GhbError> {
    let raw = config
        .get_string("backtest", key)
        .ok_or_else(|| GhbError::missing("backtest", key))?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|_| GhbError::invalid("backtest", key, "invalid date format (expected YYYY-MM-DD)"))
}

fn double(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, GhbError> {
    config
        .get_double(section, key)
        .map_err(|reason| GhbError::invalid(section, key, reason))
}

fn count(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<usize>, GhbError> {
    match config
        .get_int(section, key)
        .map_err(|reason| GhbError::invalid(section, key, reason))?
    {
        None => Ok(None),
        Some(v) => usize::try_from(v)
            .map(Some)
            .map_err(|_| GhbError::invalid(section, key, format!("{v} must not be negative"))),
    }
}

fn parse_exit_states(raw: &str) -> Result<BTreeSet<TrendState>, GhbError> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<TrendState>()
                .map_err(|e| GhbError::invalid("strategy", "exit_states", e.to_string()))
        })
        .collect()
}

fn parse_sizing(config: &dyn ConfigPort) -> Result<Sizing, GhbError> {
    let mode = config
        .get_string("strategy", "sizing")
        .map(|s| s.to_lowercase());
    match mode.as_deref() {
        None | Some("fixed") => Ok(Sizing::Fixed),
        Some("tiered") => {
            let tiers = match config.get_string("strategy", "risk_tiers") {
                None => ProximityTiers::default(),
                Some(raw) => parse_risk_tiers(&raw)?,
            };
            Ok(Sizing::Tiered {
                near_pct: tiers.near_pct,
                far_pct: tiers.far_pct,
            })
        }
        Some(other) => Err(GhbError::invalid(
            "strategy",
            "sizing",
            format!("unknown sizing '{other}', expected fixed or tiered"),
        )),
    }
}

fn parse_risk_tiers(raw: &str) -> Result<ProximityTiers, GhbError> {
    let values: Vec<f64> = raw
        .split(',')
        .map(|t| t.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| GhbError::invalid("strategy", "risk_tiers", format!("'{raw}' is not a number list")))?;
    match values.as_slice() {
        [near_pct, far_pct] => Ok(ProximityTiers {
            near_pct: *near_pct,
            far_pct: *far_pct,
        }),
        _ => Err(GhbError::invalid(
            "strategy",
            "risk_tiers",
            "expected two percentages, e.g. 5,10",
        )),
    }
}
