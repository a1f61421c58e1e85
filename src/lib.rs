//! ghbtrader: weekly trend-state momentum backtester.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], command line in [`cli`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
