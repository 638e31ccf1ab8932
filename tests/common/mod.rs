#![allow(dead_code)]

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use mispricer::domain::config::StrategyConfig;
use mispricer::domain::error::MispricerError;
use mispricer::domain::fund_holdings::{FundInfo, RawHolding};
use mispricer::domain::fundamentals::FundamentalRecord;
use mispricer::domain::prices::{BarFrequency, PriceBar};
use mispricer::domain::universe::SecurityInfo;
use mispricer::ports::data_port::{DataPort, FundPort};
use std::collections::HashMap;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(d: NaiveDate, h: u32, min: u32) -> NaiveDateTime {
    d.and_hms_opt(h, min, 0).unwrap()
}

/// Weekdays between two dates, inclusive.
pub fn weekdays(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    from.iter_days()
        .take_while(|d| *d <= to)
        .filter(|d| d.weekday().number_from_monday() <= 5)
        .collect()
}

pub struct MockDataPort {
    pub calendar: Vec<NaiveDate>,
    pub securities: Vec<SecurityInfo>,
    pub fundamentals: Vec<FundamentalRecord>,
    pub prices: HashMap<(String, BarFrequency), Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new(calendar: Vec<NaiveDate>) -> Self {
        Self {
            calendar,
            securities: Vec::new(),
            fundamentals: Vec::new(),
            prices: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_security(mut self, code: &str, name: &str, industries: &[&str]) -> Self {
        self.securities.push(SecurityInfo {
            code: code.to_string(),
            display_name: name.to_string(),
            industry_codes: industries.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn with_fundamentals(mut self, record: FundamentalRecord) -> Self {
        self.fundamentals.push(record);
        self
    }

    pub fn with_bars(mut self, code: &str, frequency: BarFrequency, bars: Vec<PriceBar>) -> Self {
        self.prices.insert((code.to_string(), frequency), bars);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn trading_days(&self, end_date: NaiveDate) -> Result<Vec<NaiveDate>, MispricerError> {
        Ok(self
            .calendar
            .iter()
            .copied()
            .filter(|d| *d <= end_date)
            .collect())
    }

    fn list_securities(&self, _date: NaiveDate) -> Result<Vec<SecurityInfo>, MispricerError> {
        Ok(self.securities.clone())
    }

    fn fetch_fundamentals(
        &self,
        codes: &[String],
        _date: NaiveDate,
    ) -> Result<Vec<FundamentalRecord>, MispricerError> {
        Ok(self
            .fundamentals
            .iter()
            .filter(|r| codes.contains(&r.code))
            .cloned()
            .collect())
    }

    fn fetch_prices(
        &self,
        code: &str,
        frequency: BarFrequency,
        end_date: NaiveDate,
        count: usize,
    ) -> Result<Vec<PriceBar>, MispricerError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(MispricerError::Data {
                reason: reason.clone(),
            });
        }
        let bars: Vec<PriceBar> = self
            .prices
            .get(&(code.to_string(), frequency))
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date() <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let skip = bars.len().saturating_sub(count);
        Ok(bars[skip..].to_vec())
    }
}

#[derive(Default)]
pub struct MockFundPort {
    pub funds: Vec<FundInfo>,
    pub holdings: Vec<(String, String, String, NaiveDate)>,
}

impl MockFundPort {
    pub fn with_fund(mut self, code: &str, investment_type: &str) -> Self {
        self.funds.push(FundInfo {
            code: code.to_string(),
            investment_type: investment_type.to_string(),
        });
        self
    }

    pub fn with_holding(mut self, fund: &str, stock: &str, detail: &str, report: NaiveDate) -> Self {
        self.holdings
            .push((fund.to_string(), stock.to_string(), detail.to_string(), report));
        self
    }
}

impl FundPort for MockFundPort {
    fn list_funds(&self) -> Result<Vec<FundInfo>, MispricerError> {
        Ok(self.funds.clone())
    }

    fn fetch_holdings(&self, fund_codes: &[String]) -> Result<Vec<RawHolding>, MispricerError> {
        Ok(self
            .holdings
            .iter()
            .filter(|(fund, ..)| fund_codes.contains(fund))
            .map(|(fund, stock, detail, report)| RawHolding {
                fund_code: fund.clone(),
                stock_code: stock.clone(),
                fund_investment_type: self
                    .funds
                    .iter()
                    .find(|f| &f.code == fund)
                    .map(|f| f.investment_type.clone())
                    .unwrap_or_default(),
                detail_type: detail.clone(),
                report_date: *report,
                proportion: None,
            })
            .collect())
    }
}

/// Fundamentals whose every derived factor increases with `base`.
pub fn fundamentals(code: &str, base: f64) -> FundamentalRecord {
    FundamentalRecord {
        code: code.to_string(),
        date: None,
        pb_ratio: Some(10.0 / base),
        ps_ratio: Some(20.0 / base),
        pcf_ratio: Some(30.0 / base),
        market_cap: Some(100.0),
        total_assets: Some(base * 10.0),
        roe: Some(base / 100.0),
        roa: Some(base / 200.0),
        profit_growth: Some(base / 50.0),
        operating_profit_growth: Some(base / 40.0),
    }
}

/// Common factor driving every synthetic stock.
pub fn market_return(t: usize) -> f64 {
    0.01 * (t as f64 * 0.7).sin() + 0.002
}

/// Daily bars at 15:00 and four intraday bars per day for a stock with
/// returns `beta * market + tiny noise`. `amp` sets intraday swing size.
pub fn synthetic_bars(
    code: &str,
    beta: f64,
    amp: f64,
    seed: usize,
    days: &[NaiveDate],
) -> (Vec<PriceBar>, Vec<PriceBar>) {
    let mut daily = Vec::with_capacity(days.len());
    let mut intraday = Vec::with_capacity(days.len() * 4);
    let mut close = 10.0;

    for (t, &d) in days.iter().enumerate() {
        let prev = close;
        if t > 0 {
            let noise = 1e-5 * ((t * (seed + 1)) as f64).cos();
            close *= 1.0 + beta * market_return(t) + noise;
        }
        for (i, (h, m)) in [(10, 0), (11, 0), (13, 30)].into_iter().enumerate() {
            let swing = [1.0, -1.0, 0.5][i];
            intraday.push(PriceBar {
                code: code.to_string(),
                timestamp: at(d, h, m),
                close: prev * (1.0 + amp * swing),
            });
        }
        let bar = PriceBar {
            code: code.to_string(),
            timestamp: at(d, 15, 0),
            close,
        };
        intraday.push(bar.clone());
        daily.push(bar);
    }
    (daily, intraday)
}

pub fn stock_code(i: usize) -> String {
    format!("S{i:02}")
}

pub struct Market {
    pub data: MockDataPort,
    pub funds: MockFundPort,
    pub days: Vec<NaiveDate>,
}

fn add_stock(
    data: MockDataPort,
    days: &[NaiveDate],
    i: usize,
    name: &str,
    industries: &[&str],
    beta: f64,
) -> MockDataPort {
    let code = stock_code(i);
    let (daily, intraday) = synthetic_bars(&code, beta, 0.002 * i as f64, i, days);
    data.with_security(&code, name, industries)
        .with_fundamentals(fundamentals(&code, i as f64))
        .with_bars(&code, BarFrequency::Daily, daily)
        .with_bars(&code, BarFrequency::Minute5, intraday)
}

/// Twelve ordinary stocks S01..S12 whose beta and fundamentals both rise with
/// the index, plus a special-treatment S13 and a bank S14 with larger betas
/// that the universe filter must remove. Fund F1 reports S12 at 2023-12-31
/// and S01..S03 at 2024-03-31.
pub fn synthetic_market() -> Market {
    let days = weekdays(date(2024, 1, 1), date(2024, 4, 30));
    let mut data = MockDataPort::new(days.clone());

    for i in 1..=12 {
        data = add_stock(data, &days, i, &format!("Stock {i}"), &["C13"], 0.5 + 0.1 * i as f64);
    }
    data = add_stock(data, &days, 13, "*ST Thirteen", &["C13"], 3.0);
    data = add_stock(data, &days, 14, "Bank Fourteen", &["J66", "T27"], 2.5);

    let funds = MockFundPort::default()
        .with_fund("F1", "股票型")
        .with_fund("F2", "债券型")
        .with_holding("F1", "S01", "股票", date(2024, 3, 31))
        .with_holding("F1", "S02", "股票", date(2024, 3, 31))
        .with_holding("F1", "S03", "股票", date(2024, 3, 31))
        .with_holding("F1", "S12", "股票", date(2023, 12, 31))
        .with_holding("F1", "019547", "债券", date(2024, 3, 31))
        .with_holding("F2", "S04", "股票", date(2024, 3, 31));

    Market { data, funds, days }
}

/// Defaults with selection sizes and windows small enough for the synthetic
/// market.
pub fn test_config() -> StrategyConfig {
    let mut config = StrategyConfig::default();
    config.selection.num_first_stage = 6;
    config.selection.num_second_stage = 3;
    config.selection.beta_window_days = 20;
    config.weighting.volatility_window_days = 5;
    config.weighting.bars_per_day = 4;
    config.weighting.return_window_days = 20;
    config
}
