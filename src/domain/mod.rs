//! Core domain types and logic.

pub mod backtest;
pub mod classifier;
pub mod config_validation;
pub mod error;
pub mod execution;
pub mod indicator;
pub mod metrics;
pub mod ohlcv;
pub mod portfolio;
pub mod position;
pub mod priority;
pub mod sizing;
pub mod ticker_data;
pub mod trend_state;
pub mod universe;
