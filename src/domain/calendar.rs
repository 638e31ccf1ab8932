//! Trading calendar queries.

use chrono::{Datelike, NaiveDate};

/// Trading days per month used to size the month-end lookback.
const DAYS_PER_MONTH: usize = 25;
/// Trading days per quarter used to size the quarter-end lookback.
const DAYS_PER_SEASON: usize = 65;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TradingCalendar {
    days: Vec<NaiveDate>,
}

impl TradingCalendar {
    pub fn new(mut days: Vec<NaiveDate>) -> Self {
        days.sort();
        days.dedup();
        Self { days }
    }

    pub fn days(&self) -> &[NaiveDate] {
        &self.days
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        self.days.binary_search(&date).is_ok()
    }

    /// The last `count` trading days on or before `end`, ascending.
    pub fn recent_days(&self, end: NaiveDate, count: usize) -> &[NaiveDate] {
        let upto = self.days.partition_point(|d| *d <= end);
        &self.days[upto.saturating_sub(count)..upto]
    }

    /// Last trading day of each month completed inside the trailing
    /// `months * 25` trading days. The month still open at the end of the
    /// window is not reported.
    pub fn month_end_days(&self, end: NaiveDate, months: usize) -> Vec<NaiveDate> {
        period_ends(self.recent_days(end, months * DAYS_PER_MONTH), |d| {
            (d.year(), d.month())
        })
    }

    /// Last trading day of each quarter completed inside the trailing
    /// `seasons * 65` trading days.
    pub fn season_end_days(&self, end: NaiveDate, seasons: usize) -> Vec<NaiveDate> {
        period_ends(self.recent_days(end, seasons * DAYS_PER_SEASON), |d| {
            (d.year(), d.month0() / 3)
        })
    }
}

fn period_ends<K: PartialEq>(days: &[NaiveDate], key: impl Fn(&NaiveDate) -> K) -> Vec<NaiveDate> {
    days.windows(2)
        .filter(|w| key(&w[0]) != key(&w[1]))
        .map(|w| w[0])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// Weekdays between two dates, inclusive.
    fn weekdays(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
        from.iter_days()
            .take_while(|x| *x <= to)
            .filter(|x| x.weekday().number_from_monday() <= 5)
            .collect()
    }

    #[test]
    fn recent_days_ends_at_or_before_date() {
        let cal = TradingCalendar::new(weekdays(d(2024, 1, 1), d(2024, 1, 31)));
        let days = cal.recent_days(d(2024, 1, 14), 3);
        assert_eq!(days, &[d(2024, 1, 10), d(2024, 1, 11), d(2024, 1, 12)]);
    }

    #[test]
    fn recent_days_short_history() {
        let cal = TradingCalendar::new(vec![d(2024, 1, 3), d(2024, 1, 2)]);
        assert_eq!(cal.recent_days(d(2024, 1, 5), 10), &[d(2024, 1, 2), d(2024, 1, 3)]);
        assert!(cal.recent_days(d(2023, 12, 1), 10).is_empty());
    }

    #[test]
    fn month_ends_skip_open_month() {
        let cal = TradingCalendar::new(weekdays(d(2023, 10, 1), d(2024, 3, 15)));
        let ends = cal.month_end_days(d(2024, 3, 15), 3);
        // 75 trading days back from mid-March starts in early December
        assert_eq!(ends, vec![d(2023, 12, 29), d(2024, 1, 31), d(2024, 2, 29)]);

        let ends = cal.month_end_days(d(2024, 3, 15), 4);
        assert_eq!(ends.first(), Some(&d(2023, 10, 31)));
        assert_eq!(ends.len(), 5);
    }

    #[test]
    fn season_ends() {
        let cal = TradingCalendar::new(weekdays(d(2023, 1, 1), d(2024, 2, 15)));
        let ends = cal.season_end_days(d(2024, 2, 15), 4);
        assert_eq!(ends, vec![d(2023, 3, 31), d(2023, 6, 30), d(2023, 9, 29), d(2023, 12, 29)]);
    }

    #[test]
    fn trading_day_lookup() {
        let cal = TradingCalendar::new(weekdays(d(2024, 1, 1), d(2024, 1, 7)));
        assert!(cal.is_trading_day(d(2024, 1, 5)));
        assert!(!cal.is_trading_day(d(2024, 1, 6)));
    }
}
