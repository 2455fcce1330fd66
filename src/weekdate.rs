use {
    anyhow::Context,
    jiff::{
        ToSpan,
        civil::{Date, Weekday},
    },
};

/// A date in a week numbering calendar whose weeks begin on `start`.
///
/// This is what `BYWEEKNO` and `WKST` refer to. Unlike
/// `jiff::civil::ISOWeekDate`, which always starts weeks on Monday, the first
/// day of the week is configurable. Week 1 is always the first week with at
/// least 4 days in the year, per RFC 5545.
#[derive(Clone, Copy, Debug)]
pub struct WeekDate {
    start: Weekday,
    year: i16,
    week: i8,
    // Resolved eagerly so that converting back to a Gregorian date is
    // infallible.
    date: Date,
}

impl WeekDate {
    /// Create a new week date for the given `weekday` in `week` of `year`.
    ///
    /// `week` must be in the range `1..=53`, although `53` is only valid for
    /// "long" years. An error is also returned if the corresponding Gregorian
    /// date is outside Jiff's supported range.
    pub fn new(
        start: Weekday,
        year: i16,
        week: i8,
        weekday: Weekday,
    ) -> anyhow::Result<WeekDate> {
        anyhow::ensure!(
            1 <= week && week <= weeks_in_year(start, year),
            "week number `{week}` (for weeks starting on {start:?}) \
             is invalid for year `{year}`",
        );
        let first = first_week_start(start, year)?;
        let days = i32::from(week - 1) * 7 + i32::from(weekday.since(start));
        let date = first.checked_add(days.days()).with_context(|| {
            format!(
                "week date `{year:04}-W{week:02}-{weekday:?}` \
                 (for weeks starting on {start:?}) is invalid",
            )
        })?;
        Ok(WeekDate { start, year, week, date })
    }

    /// Returns the Gregorian date of this week date.
    pub fn date(self) -> Date {
        self.date
    }

    /// Returns the number of weeks in the year containing this week date.
    pub fn weeks_in_year(self) -> i8 {
        weeks_in_year(self.start, self.year)
    }

    pub fn week(self) -> i8 {
        self.week
    }
}

/// Returns the number of weeks (52 or 53) in `year`, for weeks beginning on
/// `start`.
pub fn weeks_in_year(start: Weekday, year: i16) -> i8 {
    // A year has 53 weeks when its last day falls on the fourth day of a
    // week, or on the fifth day in a leap year.
    // See: https://en.wikipedia.org/wiki/ISO_week_date#Weeks_per_year
    let last = jiff::civil::date(year, 12, 31);
    let weekday = last.weekday();
    let long = weekday == start.wrapping_add(3)
        || (last.in_leap_year() && weekday == start.wrapping_add(4));
    if long { 53 } else { 52 }
}

/// Returns the first day of the week that `date` falls in.
pub fn first_of_week(start: Weekday, date: Date) -> anyhow::Result<Date> {
    if date.weekday() == start {
        return Ok(date);
    }
    date.nth_weekday(-1, start).with_context(|| {
        format!(
            "failed to find first day of week containing \
             {date}, for weeks starting on {start:?}",
        )
    })
}

/// Returns the last day of the week that `date` falls in.
pub fn last_of_week(start: Weekday, date: Date) -> anyhow::Result<Date> {
    let last = start.wrapping_sub(1);
    if date.weekday() == last {
        return Ok(date);
    }
    date.nth_weekday(1, last).with_context(|| {
        format!(
            "failed to find last day of week containing \
             {date}, for weeks starting on {start:?}",
        )
    })
}

/// Returns the first date of week 1 of `year`. Its weekday is `start`.
fn first_week_start(start: Weekday, year: i16) -> anyhow::Result<Date> {
    // January 4 is always in the first week, since the first week is the
    // first one with at least 4 days in the year.
    let jan4 = Date::new(year, 1, 4).with_context(|| {
        format!("year `{year}` is out of supported range for week dates")
    })?;
    let back = jan4.weekday().since(start);
    jan4.checked_sub(back.days()).with_context(|| {
        format!(
            "first week of `{year}` for weeks starting on \
             {start:?} is out of supported range",
        )
    })
}

#[cfg(test)]
mod tests {
    use jiff::civil::{Weekday::*, date};

    use super::*;

    #[test]
    fn first_week_with_non_monday_start() {
        // For weeks starting on Saturday, 2025-01-04 starts week 1 and
        // 2025-01-03 is the last day of week 53 of 2024.
        let wd = WeekDate::new(Saturday, 2025, 1, Saturday).unwrap();
        assert_eq!(wd.date(), date(2025, 1, 4));
        let wd = WeekDate::new(Saturday, 2024, 53, Friday).unwrap();
        assert_eq!(wd.date(), date(2025, 1, 3));
        assert_eq!(wd.weeks_in_year(), 53);
        assert_eq!(wd.week(), 53);
    }

    /// For weeks starting on Monday, the week dates should agree with Jiff's
    /// ISO 8601 week dates.
    #[test]
    fn consistent_with_iso_week_dates() {
        let month_days: &[(i8, i8)] = &[
            (1, 1),
            (1, 2),
            (1, 3),
            (1, 4),
            (1, 5),
            (1, 8),
            (7, 1),
            (12, 28),
            (12, 29),
            (12, 30),
            (12, 31),
        ];
        for year in 1900..=2100 {
            for &(month, day) in month_days {
                let d = date(year, month, day);
                let iso = d.iso_week_date();
                let (y, w, wd) = (iso.year(), iso.week(), iso.weekday());
                let wd = WeekDate::new(Monday, y, w, wd).unwrap();
                assert_eq!(d, wd.date(), "mismatch for {d}");
            }
        }
    }

    #[test]
    fn week_53_only_in_long_years() {
        assert_eq!(weeks_in_year(Monday, 2020), 53);
        assert_eq!(weeks_in_year(Monday, 2021), 52);
        assert!(WeekDate::new(Monday, 2020, 53, Monday).is_ok());
        assert!(WeekDate::new(Monday, 2021, 53, Monday).is_err());
        assert!(WeekDate::new(Monday, 2021, 0, Monday).is_err());
    }

    #[test]
    fn week_boundaries() {
        // 2024-01-03 is a Wednesday.
        let d = date(2024, 1, 3);
        assert_eq!(first_of_week(Monday, d).unwrap(), date(2024, 1, 1));
        assert_eq!(last_of_week(Monday, d).unwrap(), date(2024, 1, 7));
        assert_eq!(first_of_week(Sunday, d).unwrap(), date(2023, 12, 31));
        assert_eq!(last_of_week(Sunday, d).unwrap(), date(2024, 1, 6));
        assert_eq!(first_of_week(Wednesday, d).unwrap(), d);
        assert_eq!(last_of_week(Thursday, d).unwrap(), d);
    }
}
