//! Fund holdings extraction.
//!
//! Raw fund and holding types arrive in the provider's vocabulary and are
//! mapped to English categories through the configured tables. Only stock
//! holdings of qualifying funds are kept.

use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::error::MispricerError;
use crate::ports::data_port::FundPort;

/// Asset category kept by `classify_holdings`.
pub const STOCK_CATEGORY: &str = "stock";

#[derive(Debug, Clone, PartialEq)]
pub struct FundInfo {
    pub code: String,
    pub investment_type: String,
}

/// One holding row as reported by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHolding {
    pub fund_code: String,
    pub stock_code: String,
    pub fund_investment_type: String,
    pub detail_type: String,
    pub report_date: NaiveDate,
    pub proportion: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FundHolding {
    pub fund_code: String,
    pub stock_code: String,
    pub fund_type: String,
    pub asset_type: String,
    pub report_date: NaiveDate,
    pub year: i32,
    pub month: u32,
    /// Calendar quarter, 1-4.
    pub season: u32,
    pub proportion: Option<f64>,
}

/// Codes of funds whose raw investment type is a key of `fund_type_map`.
pub fn qualifying_funds(funds: &[FundInfo], fund_type_map: &BTreeMap<String, String>) -> Vec<String> {
    let mut codes: Vec<String> = funds
        .iter()
        .filter(|f| fund_type_map.contains_key(f.investment_type.trim()))
        .map(|f| f.code.clone())
        .collect();
    codes.sort();
    codes.dedup();
    codes
}

pub fn classify_holdings(
    raw: &[RawHolding],
    fund_type_map: &BTreeMap<String, String>,
    asset_type_map: &BTreeMap<String, String>,
) -> Vec<FundHolding> {
    raw.iter()
        .filter_map(|h| {
            let asset_type = asset_type_map.get(h.detail_type.trim())?;
            if asset_type != STOCK_CATEGORY {
                return None;
            }
            let fund_type = fund_type_map
                .get(h.fund_investment_type.trim())
                .cloned()
                .unwrap_or_default();
            let month = h.report_date.month();
            Some(FundHolding {
                fund_code: h.fund_code.clone(),
                stock_code: h.stock_code.clone(),
                fund_type,
                asset_type: asset_type.clone(),
                report_date: h.report_date,
                year: h.report_date.year(),
                month,
                season: (month - 1) / 3 + 1,
                proportion: h.proportion,
            })
        })
        .collect()
}

/// Distinct stocks in each fund's most recent report dated on or before
/// `as_of`. Reports published later are ignored.
pub fn latest_held_stocks(holdings: &[FundHolding], as_of: NaiveDate) -> Vec<String> {
    let mut latest: BTreeMap<&str, NaiveDate> = BTreeMap::new();
    for h in holdings.iter().filter(|h| h.report_date <= as_of) {
        let entry = latest.entry(h.fund_code.as_str()).or_insert(h.report_date);
        *entry = (*entry).max(h.report_date);
    }
    holdings
        .iter()
        .filter(|h| latest.get(h.fund_code.as_str()) == Some(&h.report_date))
        .map(|h| h.stock_code.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Qualifying funds' stock holdings as known at `as_of`, via the fund port.
pub fn fund_benchmark_members(
    fund_port: &dyn FundPort,
    fund_type_map: &BTreeMap<String, String>,
    asset_type_map: &BTreeMap<String, String>,
    as_of: NaiveDate,
) -> Result<Vec<String>, MispricerError> {
    let funds = qualifying_funds(&fund_port.list_funds()?, fund_type_map);
    let raw = fund_port.fetch_holdings(&funds)?;
    let holdings = classify_holdings(&raw, fund_type_map, asset_type_map);
    let members = latest_held_stocks(&holdings, as_of);
    tracing::info!(
        %as_of,
        funds = funds.len(),
        holdings = holdings.len(),
        members = members.len(),
        "fund holdings extracted"
    );
    Ok(members)
}
