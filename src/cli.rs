//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, HaltReason};
use crate::domain::config_validation::{build_backtest_config, data_dir};
use crate::domain::error::GhbError;
use crate::domain::indicator::IndicatorType;
use crate::domain::metrics::{Metrics, TickerResult};
use crate::domain::universe::validate_universe;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_OUTPUT_DIR: &str = "report";

#[derive(Parser, Debug)]
#[command(name = "ghbtrader", about = "Weekly trend-state momentum backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory for trades.csv, equity.csv, fills.csv and metrics.json
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Comma-separated tickers, replacing [backtest] tickers
        #[arg(long)]
        tickers: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List tickers available in the data directory
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show data range for one or all configured tickers
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        ticker: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            tickers,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, tickers.as_deref())
            } else {
                run_backtest(&config, output.as_deref(), tickers.as_deref())
            }
        }
        Command::Validate { config } => run_dry_run(&config, None),
        Command::ListSymbols { config } => run_list_symbols(&config),
        Command::Info { config, ticker } => run_info(&config, ticker.as_deref()),
    }
}

fn fail(err: GhbError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(&err)
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(fail)
}

/// A `ConfigPort` with command-line values layered over a file.
pub struct ConfigOverrides<'a> {
    base: &'a dyn ConfigPort,
    tickers: Option<&'a str>,
}

impl<'a> ConfigOverrides<'a> {
    pub fn new(base: &'a dyn ConfigPort, tickers: Option<&'a str>) -> Self {
        ConfigOverrides { base, tickers }
    }
}

impl ConfigPort for ConfigOverrides<'_> {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        match (section, key, self.tickers) {
            ("backtest", "tickers", Some(tickers)) => Some(tickers.to_string()),
            _ => self.base.get_string(section, key),
        }
    }

    fn get_int(&self, section: &str, key: &str) -> Result<Option<i64>, String> {
        self.base.get_int(section, key)
    }

    fn get_double(&self, section: &str, key: &str) -> Result<Option<f64>, String> {
        self.base.get_double(section, key)
    }
}

fn run_backtest(config_path: &Path, output: Option<&Path>, tickers: Option<&str>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let layered = ConfigOverrides::new(&adapter, tickers);
    let config = match build_backtest_config(&layered) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    let data_port = CsvAdapter::new(data_dir(&layered));
    let output_dir = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    run_backtest_pipeline(&data_port, &config, &CsvReportAdapter::new(), &output_dir)
}

/// Universe validation, simulation, metrics, console summary and report.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    config: &BacktestConfig,
    report: &dyn ReportPort,
    output_dir: &Path,
) -> ExitCode {
    eprintln!("Validating {} tickers...", config.universe.len());
    let lookback = config.classifier.lookback();
    let validation = match validate_universe(
        data_port,
        &config.universe,
        config.start_date,
        config.end_date,
        lookback,
    ) {
        Ok(v) => v,
        Err(e) => return fail(e),
    };

    eprintln!(
        "Running backtest: {} tickers, {} to {}",
        validation.universe.count(),
        config.start_date,
        config.end_date,
    );
    let result = match backtest_engine::run_backtest(&validation.data, config) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    let metrics = Metrics::compute(
        &result.trades,
        &result.equity_curve,
        result.starting_cash,
        config.risk_free_rate,
    );
    let ticker_results = TickerResult::compute_per_ticker(&result.trades);

    eprintln!("\n=== Results ===");
    eprintln!("Weeks Processed:  {}", result.ticks_processed);
    if let HaltReason::DataExhausted { at } = result.halt {
        eprintln!("Halted Early:     no data from week of {at}");
    }
    eprintln!("Final Value:      {:.2}", metrics.final_value);
    eprintln!("Total Return:     {:.2}%", metrics.total_return_pct * 100.0);
    eprintln!("CAGR:             {:.2}%", metrics.cagr * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", metrics.sortino_ratio);
    eprintln!("Max Drawdown:     {:.1}%", metrics.max_drawdown * 100.0);
    eprintln!("Total Trades:     {}", metrics.total_trades);
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", metrics.profit_factor);
    eprintln!("Open Positions:   {}", result.open_positions.len());
    eprintln!("Skipped Orders:   {}", result.skipped.len());

    if !ticker_results.is_empty() {
        eprintln!("\n=== Per-Ticker Summary ===");
        for tr in &ticker_results {
            let pnl_sign = if tr.total_pnl >= 0.0 { "+" } else { "" };
            eprintln!(
                "  {}:  {} trades, {:.1}% win rate, {}${:.0}",
                tr.ticker,
                tr.trades,
                tr.win_rate * 100.0,
                pnl_sign,
                tr.total_pnl,
            );
        }
    }

    match report.write(&result, &metrics, output_dir) {
        Ok(()) => {
            eprintln!("\nReport written to: {}", output_dir.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

pub fn run_dry_run(config_path: &Path, tickers: Option<&str>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let layered = ConfigOverrides::new(&adapter, tickers);
    let config = match build_backtest_config(&layered) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    eprintln!("Config validated successfully");
    eprintln!("\nRange:      {} to {}", config.start_date, config.end_date);
    eprintln!("Universe:   {}", config.universe.join(", "));
    eprintln!("Data dir:   {}", data_dir(&layered).display());
    eprintln!("\nIndicators:");
    eprintln!("  {}", IndicatorType::Sma(config.classifier.moving_average_window));
    eprintln!("  {}", IndicatorType::Roc(config.classifier.momentum_window));
    eprintln!(
        "\nMomentum:   enter above {}%, collapse at or below {}%",
        config.classifier.entry_momentum_pct, config.classifier.exit_momentum_pct
    );
    let exits: Vec<String> = config
        .exit_states
        .iter()
        .map(|s| match s.colour() {
            Some(colour) => format!("{s} [{colour:?}]"),
            None => s.to_string(),
        })
        .collect();
    eprintln!("Exit on:    {}", exits.join(", "));
    eprintln!(
        "Sizing:     {:.1}% of equity ({:?}), max {} positions, {} priority",
        config.position_size_pct * 100.0,
        config.sizing,
        config.max_positions,
        config.entry_priority
    );
    eprintln!(
        "Slippage:   buy x{}, sell x{}",
        config.buy_slippage_factor, config.sell_slippage_factor
    );

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_list_symbols(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let data_port = CsvAdapter::new(data_dir(&adapter));
    match data_port.list_symbols() {
        Ok(symbols) => {
            for s in &symbols {
                println!("{s}");
            }
            eprintln!("{} symbols", symbols.len());
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_info(config_path: &Path, ticker: Option<&str>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let data_port = CsvAdapter::new(data_dir(&adapter));

    let tickers = match ticker {
        Some(t) => vec![t.trim().to_uppercase()],
        None => match data_port.list_symbols() {
            Ok(s) => s,
            Err(e) => return fail(e),
        },
    };

    for t in &tickers {
        match data_port.get_data_range(t) {
            Ok(Some((first, last, bars))) => println!("{t}: {first} to {last} ({bars} bars)"),
            Ok(None) => println!("{t}: no data"),
            Err(e) => return fail(e),
        }
    }
    ExitCode::SUCCESS
}
