//! Market data access port traits.

use crate::domain::error::MispricerError;
use crate::domain::fund_holdings::{FundInfo, RawHolding};
use crate::domain::fundamentals::FundamentalRecord;
use crate::domain::prices::{BarFrequency, PriceBar};
use crate::domain::universe::SecurityInfo;
use chrono::NaiveDate;

pub trait DataPort {
    /// Every trading day up to and including `end_date`, ascending.
    fn trading_days(&self, end_date: NaiveDate) -> Result<Vec<NaiveDate>, MispricerError>;

    /// Listed securities on `date`, before any filtering.
    fn list_securities(&self, date: NaiveDate) -> Result<Vec<SecurityInfo>, MispricerError>;

    fn fetch_fundamentals(
        &self,
        codes: &[String],
        date: NaiveDate,
    ) -> Result<Vec<FundamentalRecord>, MispricerError>;

    /// The last `count` bars of `code` ending at `end_date`, ascending.
    fn fetch_prices(
        &self,
        code: &str,
        frequency: BarFrequency,
        end_date: NaiveDate,
        count: usize,
    ) -> Result<Vec<PriceBar>, MispricerError>;
}

pub trait FundPort {
    fn list_funds(&self) -> Result<Vec<FundInfo>, MispricerError>;

    fn fetch_holdings(&self, fund_codes: &[String]) -> Result<Vec<RawHolding>, MispricerError>;
}
