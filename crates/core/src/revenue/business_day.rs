//! Business-day arithmetic
//!
//! A bar's accounting day does not end at midnight: business day `D` runs
//! from `D` at the closing hour (local time) to `D + 1` at the closing hour.
//! A sale rung up at 02:00 on the 5th with a 06:00 closing hour belongs to
//! business day the 4th.

use std::str::FromStr;

use barsync_common::error::{CommonError, CommonResult};
use barsync_domain::BusinessDayConfig;
use chrono::{DateTime, Days, LocalResult, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Maps timestamps to business dates for one establishment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessDayCalendar {
    closing_hour: u32,
    timezone: Tz,
}

impl BusinessDayCalendar {
    pub fn new(closing_hour: u32, timezone: Tz) -> CommonResult<Self> {
        if closing_hour > 23 {
            return Err(CommonError::config_field(
                "business_day.closing_hour",
                format!("must be between 0 and 23, got {closing_hour}"),
            ));
        }
        Ok(Self { closing_hour, timezone })
    }

    pub fn from_config(config: &BusinessDayConfig) -> CommonResult<Self> {
        let timezone = Tz::from_str(&config.timezone).map_err(|_| {
            CommonError::config_field(
                "business_day.timezone",
                format!("unknown IANA timezone '{}'", config.timezone),
            )
        })?;
        Self::new(config.closing_hour, timezone)
    }

    pub const fn closing_hour(&self) -> u32 {
        self.closing_hour
    }

    pub const fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Business date a timestamp belongs to.
    pub fn business_date(&self, timestamp: DateTime<Utc>) -> NaiveDate {
        let local = timestamp.with_timezone(&self.timezone);
        let date = local.date_naive();
        if local.hour() < self.closing_hour {
            date.pred_opt().unwrap_or(date)
        } else {
            date
        }
    }

    /// Business date of "now".
    pub fn current_business_date(&self) -> NaiveDate {
        self.business_date(Utc::now())
    }

    /// Instant business day `date` opens. On a DST gap the first valid
    /// local instant after the closing hour is used.
    pub fn day_start(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        let time = NaiveTime::from_hms_opt(self.closing_hour, 0, 0)?;
        let local = date.and_time(time);
        let resolved = match self.timezone.from_local_datetime(&local) {
            LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt,
            LocalResult::None => {
                let shifted = local + chrono::Duration::hours(1);
                self.timezone.from_local_datetime(&shifted).earliest()?
            }
        };
        Some(resolved.with_timezone(&Utc))
    }

    /// Half-open `[start, end)` instants covering business day `date`.
    pub fn day_bounds(&self, date: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let next = date.checked_add_days(Days::new(1))?;
        Some((self.day_start(date)?, self.day_start(next)?))
    }
}

/// Inclusive range of business dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessDateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl BusinessDateRange {
    /// Range from `start` to `end`, swapped if given in reverse.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    pub const fn single(date: NaiveDate) -> Self {
        Self { start: date, end: date }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abidjan(closing_hour: u32) -> BusinessDayCalendar {
        BusinessDayCalendar::new(closing_hour, chrono_tz::Africa::Abidjan).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn early_morning_belongs_to_previous_day() {
        let calendar = abidjan(6);
        let before_close = Utc.with_ymd_and_hms(2026, 3, 5, 5, 59, 0).unwrap();
        let at_close = Utc.with_ymd_and_hms(2026, 3, 5, 6, 0, 0).unwrap();
        let after_close = Utc.with_ymd_and_hms(2026, 3, 5, 6, 1, 0).unwrap();

        assert_eq!(calendar.business_date(before_close), date(2026, 3, 4));
        assert_eq!(calendar.business_date(at_close), date(2026, 3, 5));
        assert_eq!(calendar.business_date(after_close), date(2026, 3, 5));
    }

    #[test]
    fn closing_hour_is_local_time() {
        let calendar = BusinessDayCalendar::new(6, chrono_tz::Europe::Paris).unwrap();
        // 05:30 UTC is 06:30 in Paris (UTC+1 in March before DST).
        let ts = Utc.with_ymd_and_hms(2026, 3, 5, 5, 30, 0).unwrap();
        assert_eq!(calendar.business_date(ts), date(2026, 3, 5));
    }

    #[test]
    fn midnight_closing_matches_calendar_days() {
        let calendar = abidjan(0);
        let ts = Utc.with_ymd_and_hms(2026, 3, 5, 0, 0, 0).unwrap();
        assert_eq!(calendar.business_date(ts), date(2026, 3, 5));
    }

    #[test]
    fn bounds_are_half_open_at_closing_hour() {
        let calendar = abidjan(6);
        let (start, end) = calendar.day_bounds(date(2026, 3, 4)).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 3, 4, 6, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 3, 5, 6, 0, 0).unwrap());
        assert_eq!(calendar.business_date(end - chrono::Duration::seconds(1)), date(2026, 3, 4));
        assert_eq!(calendar.business_date(end), date(2026, 3, 5));
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        assert!(BusinessDayCalendar::new(24, chrono_tz::UTC).is_err());
        let config =
            BusinessDayConfig { closing_hour: 6, timezone: "Mars/Olympus_Mons".to_string() };
        assert!(BusinessDayCalendar::from_config(&config).is_err());
        assert!(BusinessDayCalendar::from_config(&BusinessDayConfig::default()).is_ok());
    }

    #[test]
    fn reversed_range_is_normalized() {
        let range = BusinessDateRange::new(date(2026, 3, 9), date(2026, 3, 2));
        assert_eq!(range.start, date(2026, 3, 2));
        assert!(range.contains(date(2026, 3, 5)));
        assert!(!BusinessDateRange::single(date(2026, 3, 5)).contains(date(2026, 3, 6)));
    }
}
