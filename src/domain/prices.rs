//! Price bars and the return statistics derived from them.

use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarFrequency {
    /// Five-minute intraday bars.
    Minute5,
    Daily,
}

impl BarFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            BarFrequency::Minute5 => "5m",
            BarFrequency::Daily => "1d",
        }
    }
}

impl fmt::Display for BarFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub code: String,
    pub timestamp: NaiveDateTime,
    pub close: f64,
}

impl PriceBar {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}
