//! Raw fundamentals snapshot and factor derivation.

use chrono::NaiveDate;

use crate::domain::error::MispricerError;

/// Raw financial fields for one instrument on one date. `None` marks a field
/// the provider could not supply.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FundamentalRecord {
    pub code: String,
    pub date: Option<NaiveDate>,
    pub pb_ratio: Option<f64>,
    pub ps_ratio: Option<f64>,
    pub pcf_ratio: Option<f64>,
    pub market_cap: Option<f64>,
    pub total_assets: Option<f64>,
    pub roe: Option<f64>,
    pub roa: Option<f64>,
    /// Net profit growth, year on year.
    pub profit_growth: Option<f64>,
    pub operating_profit_growth: Option<f64>,
}

/// The eight derived factors of one instrument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawFactors {
    pub bp: f64,
    pub sp: f64,
    pub cp: f64,
    pub asset_to_mktcap: f64,
    pub roe: f64,
    pub roa: f64,
    pub profit_growth: f64,
    pub operating_profit_growth: f64,
}

impl RawFactors {
    pub const COUNT: usize = 8;

    pub const NAMES: [&'static str; Self::COUNT] = [
        "bp",
        "sp",
        "cp",
        "asset_to_mktcap",
        "roe",
        "roa",
        "profit_growth",
        "operating_profit_growth",
    ];

    pub fn as_array(&self) -> [f64; Self::COUNT] {
        [
            self.bp,
            self.sp,
            self.cp,
            self.asset_to_mktcap,
            self.roe,
            self.roa,
            self.profit_growth,
            self.operating_profit_growth,
        ]
    }
}

impl FundamentalRecord {
    fn field(&self, value: Option<f64>, field: &'static str) -> Result<f64, MispricerError> {
        let v = value.ok_or_else(|| MispricerError::MissingField {
            code: self.code.clone(),
            field,
        })?;
        if !v.is_finite() {
            return Err(MispricerError::NonFinite {
                code: self.code.clone(),
                field,
            });
        }
        Ok(v)
    }

    fn ratio(
        &self,
        numerator: f64,
        denominator: Option<f64>,
        field: &'static str,
    ) -> Result<f64, MispricerError> {
        let d = self.field(denominator, field)?;
        if d == 0.0 {
            return Err(MispricerError::ZeroDenominator {
                code: self.code.clone(),
                field,
            });
        }
        Ok(numerator / d)
    }

    /// Inverted valuation ratios, size-adjusted assets, and the pass-through
    /// profitability and growth fields.
    pub fn derive_factors(&self) -> Result<RawFactors, MispricerError> {
        let total_assets = self.field(self.total_assets, "total_assets")?;
        let factors = RawFactors {
            bp: self.ratio(1.0, self.pb_ratio, "pb_ratio")?,
            sp: self.ratio(1.0, self.ps_ratio, "ps_ratio")?,
            cp: self.ratio(1.0, self.pcf_ratio, "pcf_ratio")?,
            asset_to_mktcap: self.ratio(total_assets, self.market_cap, "market_cap")?,
            roe: self.field(self.roe, "roe")?,
            roa: self.field(self.roa, "roa")?,
            profit_growth: self.field(self.profit_growth, "profit_growth")?,
            operating_profit_growth: self
                .field(self.operating_profit_growth, "operating_profit_growth")?,
        };

        // A finite ratio of finite inputs can still overflow.
        for (value, name) in factors.as_array().iter().zip(RawFactors::NAMES) {
            if !value.is_finite() {
                return Err(MispricerError::NonFinite {
                    code: self.code.clone(),
                    field: name,
                });
            }
        }
        Ok(factors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_record(code: &str) -> FundamentalRecord {
        FundamentalRecord {
            code: code.to_string(),
            date: None,
            pb_ratio: Some(2.0),
            ps_ratio: Some(4.0),
            pcf_ratio: Some(5.0),
            market_cap: Some(200.0),
            total_assets: Some(500.0),
            roe: Some(0.12),
            roa: Some(0.05),
            profit_growth: Some(0.3),
            operating_profit_growth: Some(-0.1),
        }
    }

    #[test]
    fn derives_all_factors() {
        let f = sample_record("600519.XSHG").derive_factors().unwrap();
        assert_relative_eq!(f.bp, 0.5);
        assert_relative_eq!(f.sp, 0.25);
        assert_relative_eq!(f.cp, 0.2);
        assert_relative_eq!(f.asset_to_mktcap, 2.5);
        assert_relative_eq!(f.roe, 0.12);
        assert_relative_eq!(f.roa, 0.05);
        assert_relative_eq!(f.profit_growth, 0.3);
        assert_relative_eq!(f.operating_profit_growth, -0.1);
    }

    #[test]
    fn negative_ratios_invert() {
        let mut r = sample_record("000002.XSHE");
        r.pcf_ratio = Some(-4.0);
        let f = r.derive_factors().unwrap();
        assert_relative_eq!(f.cp, -0.25);
    }

    #[test]
    fn zero_denominator_is_data_error() {
        let mut r = sample_record("000002.XSHE");
        r.ps_ratio = Some(0.0);
        assert_eq!(
            r.derive_factors().unwrap_err(),
            MispricerError::ZeroDenominator {
                code: "000002.XSHE".into(),
                field: "ps_ratio"
            }
        );
    }

    #[test]
    fn zero_market_cap_is_data_error() {
        let mut r = sample_record("000002.XSHE");
        r.market_cap = Some(0.0);
        assert!(matches!(
            r.derive_factors(),
            Err(MispricerError::ZeroDenominator { field: "market_cap", .. })
        ));
    }

    #[test]
    fn missing_field_is_data_error() {
        let mut r = sample_record("000002.XSHE");
        r.roa = None;
        assert!(matches!(
            r.derive_factors(),
            Err(MispricerError::MissingField { field: "roa", .. })
        ));
    }

    #[test]
    fn nan_input_is_rejected() {
        let mut r = sample_record("000002.XSHE");
        r.profit_growth = Some(f64::NAN);
        assert!(matches!(
            r.derive_factors(),
            Err(MispricerError::NonFinite { field: "profit_growth", .. })
        ));
    }

    #[test]
    fn overflowing_ratio_is_rejected() {
        let mut r = sample_record("000002.XSHE");
        r.pb_ratio = Some(f64::MIN_POSITIVE / 16.0);
        assert!(matches!(
            r.derive_factors(),
            Err(MispricerError::NonFinite { field: "bp", .. })
        ));
    }
}
