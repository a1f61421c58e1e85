//! Price data access port trait.

use crate::domain::error::GhbError;
use crate::domain::ohlcv::PriceBar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `ticker` dated within `[start_date, end_date]`, sorted by date.
    fn fetch_bars(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, GhbError>;

    fn list_symbols(&self) -> Result<Vec<String>, GhbError>;

    /// First date, last date and bar count available for `ticker`.
    fn get_data_range(&self, ticker: &str)
        -> Result<Option<(NaiveDate, NaiveDate, usize)>, GhbError>;
}
