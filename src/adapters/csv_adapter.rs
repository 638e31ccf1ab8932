//! CSV directory data adapter.
//!
//! Layout under the base path:
//!
//! ```text
//! calendar.csv          date
//! securities.csv        code,display_name,industry_codes,start_date,end_date
//! fundamentals.csv      code,date,pb_ratio,ps_ratio,pcf_ratio,market_cap,
//!                       total_assets,roe,roa,profit_growth,operating_profit_growth
//! prices/<code>_<freq>.csv   timestamp,close     (freq is 5m or 1d)
//! funds.csv             code,investment_type
//! fund_holdings.csv     fund_code,stock_code,detail_type,report_date,proportion
//! ```
//!
//! `industry_codes` is `;`-separated. Empty numeric cells read as missing.

use crate::domain::error::MispricerError;
use crate::domain::fund_holdings::{FundInfo, RawHolding};
use crate::domain::fundamentals::FundamentalRecord;
use crate::domain::prices::{BarFrequency, PriceBar};
use crate::domain::universe::SecurityInfo;
use crate::ports::data_port::{DataPort, FundPort};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvAdapter {
    base_path: PathBuf,
}

/// One parsed file: header names and the raw records.
struct Table {
    path: PathBuf,
    headers: Vec<String>,
    records: Vec<csv::StringRecord>,
}

impl Table {
    fn read(path: &Path) -> Result<Self, MispricerError> {
        let content = fs::read_to_string(path).map_err(|e| MispricerError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| MispricerError::Data {
                reason: format!("CSV header error in {}: {}", path.display(), e),
            })?
            .iter()
            .map(|h| h.to_lowercase())
            .collect();
        let mut records = Vec::new();
        for result in rdr.records() {
            records.push(result.map_err(|e| MispricerError::Data {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?);
        }
        Ok(Self {
            path: path.to_path_buf(),
            headers,
            records,
        })
    }

    fn column(&self, name: &str) -> Result<usize, MispricerError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| MispricerError::Data {
                reason: format!("missing {} column in {}", name, self.path.display()),
            })
    }

    fn optional_column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

fn text(record: &csv::StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("")
}

fn parse_date(value: &str, path: &Path) -> Result<NaiveDate, MispricerError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| MispricerError::Data {
        reason: format!("invalid date '{}' in {}: {}", value, path.display(), e),
    })
}

fn parse_timestamp(value: &str, path: &Path) -> Result<NaiveDateTime, MispricerError> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M"))
        .or_else(|_| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
        .map_err(|e| MispricerError::Data {
            reason: format!("invalid timestamp '{}' in {}: {}", value, path.display(), e),
        })
}

fn parse_optional_f64(value: &str, column: &str, path: &Path) -> Result<Option<f64>, MispricerError> {
    if value.is_empty() || value.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    value.parse().map(Some).map_err(|e| MispricerError::Data {
        reason: format!("invalid {} value '{}' in {}: {}", column, value, path.display(), e),
    })
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn file(&self, name: &str) -> PathBuf {
        self.base_path.join(name)
    }

    fn price_path(&self, code: &str, frequency: BarFrequency) -> PathBuf {
        self.base_path
            .join("prices")
            .join(format!("{}_{}.csv", code, frequency))
    }

    fn fund_types(&self) -> Result<BTreeMap<String, String>, MispricerError> {
        Ok(self
            .list_funds()?
            .into_iter()
            .map(|f| (f.code, f.investment_type))
            .collect())
    }
}

impl DataPort for CsvAdapter {
    fn trading_days(&self, end_date: NaiveDate) -> Result<Vec<NaiveDate>, MispricerError> {
        let table = Table::read(&self.file("calendar.csv"))?;
        let date_col = table.column("date")?;
        let mut days = Vec::with_capacity(table.records.len());
        for record in &table.records {
            let date = parse_date(text(record, date_col), &table.path)?;
            if date <= end_date {
                days.push(date);
            }
        }
        days.sort();
        days.dedup();
        Ok(days)
    }

    fn list_securities(&self, date: NaiveDate) -> Result<Vec<SecurityInfo>, MispricerError> {
        let table = Table::read(&self.file("securities.csv"))?;
        let code_col = table.column("code")?;
        let name_col = table.column("display_name")?;
        let industry_col = table.optional_column("industry_codes");
        let start_col = table.optional_column("start_date");
        let end_col = table.optional_column("end_date");

        let mut securities = Vec::new();
        for record in &table.records {
            if let Some(idx) = start_col {
                let start = text(record, idx);
                if !start.is_empty() && parse_date(start, &table.path)? > date {
                    continue;
                }
            }
            if let Some(idx) = end_col {
                let end = text(record, idx);
                if !end.is_empty() && parse_date(end, &table.path)? < date {
                    continue;
                }
            }
            let industry_codes = industry_col
                .map(|idx| {
                    text(record, idx)
                        .split(';')
                        .map(|s| s.trim().to_uppercase())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            securities.push(SecurityInfo {
                code: text(record, code_col).to_string(),
                display_name: text(record, name_col).to_string(),
                industry_codes,
            });
        }
        Ok(securities)
    }

    fn fetch_fundamentals(
        &self,
        codes: &[String],
        date: NaiveDate,
    ) -> Result<Vec<FundamentalRecord>, MispricerError> {
        let table = Table::read(&self.file("fundamentals.csv"))?;
        let path = table.path.clone();
        let code_col = table.column("code")?;
        let date_col = table.column("date")?;
        let wanted: HashSet<&str> = codes.iter().map(String::as_str).collect();

        let numeric = |record: &csv::StringRecord, name: &str| -> Result<Option<f64>, MispricerError> {
            match table.optional_column(name) {
                Some(idx) => parse_optional_f64(text(record, idx), name, &path),
                None => Ok(None),
            }
        };

        // Latest snapshot on or before `date` per code.
        let mut latest: BTreeMap<String, FundamentalRecord> = BTreeMap::new();
        for record in &table.records {
            let code = text(record, code_col);
            if !wanted.contains(code) {
                continue;
            }
            let snapshot_date = parse_date(text(record, date_col), &path)?;
            if snapshot_date > date {
                continue;
            }
            if let Some(existing) = latest.get(code) {
                if existing.date.is_some_and(|d| d >= snapshot_date) {
                    continue;
                }
            }
            latest.insert(
                code.to_string(),
                FundamentalRecord {
                    code: code.to_string(),
                    date: Some(snapshot_date),
                    pb_ratio: numeric(record, "pb_ratio")?,
                    ps_ratio: numeric(record, "ps_ratio")?,
                    pcf_ratio: numeric(record, "pcf_ratio")?,
                    market_cap: numeric(record, "market_cap")?,
                    total_assets: numeric(record, "total_assets")?,
                    roe: numeric(record, "roe")?,
                    roa: numeric(record, "roa")?,
                    profit_growth: numeric(record, "profit_growth")?,
                    operating_profit_growth: numeric(record, "operating_profit_growth")?,
                },
            );
        }

        // Codes without a snapshot still appear so scoring can report them.
        Ok(codes
            .iter()
            .map(|code| {
                latest.remove(code).unwrap_or_else(|| FundamentalRecord {
                    code: code.clone(),
                    ..FundamentalRecord::default()
                })
            })
            .collect())
    }

    fn fetch_prices(
        &self,
        code: &str,
        frequency: BarFrequency,
        end_date: NaiveDate,
        count: usize,
    ) -> Result<Vec<PriceBar>, MispricerError> {
        let table = Table::read(&self.price_path(code, frequency))?;
        let ts_col = table.column("timestamp")?;
        let close_col = table.column("close")?;

        let mut bars = Vec::new();
        for record in &table.records {
            let timestamp = parse_timestamp(text(record, ts_col), &table.path)?;
            if timestamp.date() > end_date {
                continue;
            }
            let close = parse_optional_f64(text(record, close_col), "close", &table.path)?
                .ok_or_else(|| MispricerError::MissingField {
                    code: code.to_string(),
                    field: "close",
                })?;
            bars.push(PriceBar {
                code: code.to_string(),
                timestamp,
                close,
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        let skip = bars.len().saturating_sub(count);
        Ok(bars.split_off(skip))
    }
}

impl FundPort for CsvAdapter {
    fn list_funds(&self) -> Result<Vec<FundInfo>, MispricerError> {
        let table = Table::read(&self.file("funds.csv"))?;
        let code_col = table.column("code")?;
        let type_col = table.column("investment_type")?;
        Ok(table
            .records
            .iter()
            .map(|r| FundInfo {
                code: text(r, code_col).to_string(),
                investment_type: text(r, type_col).to_string(),
            })
            .collect())
    }

    fn fetch_holdings(&self, fund_codes: &[String]) -> Result<Vec<RawHolding>, MispricerError> {
        let fund_types = self.fund_types()?;
        let table = Table::read(&self.file("fund_holdings.csv"))?;
        let fund_col = table.column("fund_code")?;
        let stock_col = table.column("stock_code")?;
        let detail_col = table.column("detail_type")?;
        let date_col = table.column("report_date")?;
        let proportion_col = table.optional_column("proportion");
        let wanted: HashSet<&str> = fund_codes.iter().map(String::as_str).collect();

        let mut holdings = Vec::new();
        for record in &table.records {
            let fund_code = text(record, fund_col);
            if !wanted.contains(fund_code) {
                continue;
            }
            let proportion = match proportion_col {
                Some(idx) => parse_optional_f64(text(record, idx), "proportion", &table.path)?,
                None => None,
            };
            holdings.push(RawHolding {
                fund_code: fund_code.to_string(),
                stock_code: text(record, stock_col).to_string(),
                fund_investment_type: fund_types.get(fund_code).cloned().unwrap_or_default(),
                detail_type: text(record, detail_col).to_string(),
                report_date: parse_date(text(record, date_col), &table.path)?,
                proportion,
            });
        }
        Ok(holdings)
    }
}
