use jiff::civil::Date;

use crate::{
    date::DateValue,
    rule::{ByWeekday, Frequency, RecurrenceRule},
    weekdate,
};

/// Computes the candidate occurrences of a recurrence rule for one period.
///
/// The period is the one containing a "cursor" date. Starting with just the
/// cursor, each `BY*` part of the rule is applied in a fixed order: `BYMONTH`,
/// `BYWEEKNO`, `BYYEARDAY`, `BYMONTHDAY`, `BYDAY`, `BYHOUR`, `BYMINUTE`,
/// `BYSECOND` and finally `BYSETPOS`. A part that is empty passes its input
/// through unchanged. Every other part (except `BYDAY`, see below) replaces
/// each input with one candidate per listed value.
///
/// `BYDAY` works in one of two ways. When `BYYEARDAY` or `BYMONTHDAY` is
/// present, it filters the candidates down to those on one of the listed
/// weekdays, and any ordinals are ignored. Otherwise, it generates every
/// matching weekday in the period containing each candidate. That period is
/// a day for `DAILY` (and shorter) frequencies, a week for `WEEKLY` or when
/// `BYWEEKNO` is present, a month for `MONTHLY` or when `BYMONTH` is present,
/// and a year otherwise. An ordinal like `-1FR` then selects the single
/// matching date at that position.
///
/// Candidates that don't exist on the calendar, like February 30, are
/// dropped. The zone mode of the cursor is carried through to every
/// candidate.
#[derive(Clone, Debug)]
pub struct Expander {
    rule: RecurrenceRule,
}

impl Expander {
    pub fn new(rule: &RecurrenceRule) -> Expander {
        Expander { rule: rule.clone() }
    }

    pub fn rule(&self) -> &RecurrenceRule {
        &self.rule
    }

    /// Returns the candidates of the period containing `cursor`, sorted in
    /// ascending order and without duplicates.
    pub fn expand(&self, cursor: &DateValue) -> Vec<DateValue> {
        let rule = &self.rule;
        let ws = rule.week_start();

        let mut dates = vec![cursor.clone()];
        dates = cross("BYMONTH", dates, rule.by_month(), |d, month| {
            d.roll_month(month)
        });
        dates = cross("BYWEEKNO", dates, rule.by_week_no(), |d, week| {
            d.with_week_of_year(ws, week)
        });
        dates = cross("BYYEARDAY", dates, rule.by_year_day(), |d, day| {
            d.with_day_of_year(day)
        });
        dates = cross("BYMONTHDAY", dates, rule.by_month_day(), |d, day| {
            d.with_day_of_month(day)
        });
        dates = self.by_day(dates);
        dates = cross("BYHOUR", dates, rule.by_hour(), |d, hour| {
            d.with_hour(hour)
        });
        dates = cross("BYMINUTE", dates, rule.by_minute(), |d, minute| {
            d.with_minute(minute)
        });
        dates = cross("BYSECOND", dates, rule.by_second(), |d, second| {
            d.with_second(second)
        });
        dates.sort();
        dates.dedup();
        dates = self.by_set_pos(dates);
        dates.sort();
        dates.dedup();
        dates
    }

    fn by_day(&self, dates: Vec<DateValue>) -> Vec<DateValue> {
        let by_day = self.rule.by_day();
        if by_day.is_empty() {
            return dates;
        }
        let filter = !self.rule.by_year_day().is_empty()
            || !self.rule.by_month_day().is_empty();
        if filter {
            let matches = |d: &DateValue| {
                by_day.iter().any(|wd| wd.weekday() == d.weekday())
            };
            let dates: Vec<DateValue> =
                dates.into_iter().filter(|d| matches(d)).collect();
            log::debug!("after BYDAY (filter): {}", Dates(&dates));
            return dates;
        }

        let mut out = vec![];
        for date in dates.iter() {
            let (start, end) = match self.period_of(date.date_part()) {
                Ok(period) => period,
                Err(err) => {
                    log::trace!("dropping candidate {date}: {err:#}");
                    continue;
                }
            };
            for wd in by_day.iter() {
                out.extend(generate(date, wd, start, end));
            }
        }
        log::debug!("after BYDAY: {}", Dates(&out));
        out
    }

    /// Returns the first and last days (inclusive) of the period that `BYDAY`
    /// generates weekdays within.
    fn period_of(&self, date: Date) -> anyhow::Result<(Date, Date)> {
        let rule = &self.rule;
        let freq = rule.frequency();
        let period = if freq == Frequency::Daily || freq.is_sub_daily() {
            (date, date)
        } else if freq == Frequency::Weekly || !rule.by_week_no().is_empty() {
            let ws = rule.week_start();
            (
                weekdate::first_of_week(ws, date)?,
                weekdate::last_of_week(ws, date)?,
            )
        } else if freq == Frequency::Monthly || !rule.by_month().is_empty() {
            (date.first_of_month(), date.last_of_month())
        } else {
            (date.first_of_year(), date.last_of_year())
        };
        Ok(period)
    }

    fn by_set_pos(&self, dates: Vec<DateValue>) -> Vec<DateValue> {
        let positions = self.rule.by_set_pos();
        if positions.is_empty() {
            return dates;
        }
        let selected: Vec<DateValue> = positions
            .iter()
            .filter_map(|&pos| {
                let index = if pos > 0 {
                    usize::try_from(pos - 1).ok()?
                } else {
                    let back = usize::try_from(pos.unsigned_abs()).ok()?;
                    dates.len().checked_sub(back)?
                };
                dates.get(index).cloned()
            })
            .collect();
        log::debug!("after BYSETPOS: {}", Dates(&selected));
        selected
    }
}

/// Replaces each date with one date per value, as set by `set`.
///
/// When `values` is empty, `dates` is returned unchanged.
fn cross<T: Copy>(
    part: &str,
    dates: Vec<DateValue>,
    values: &[T],
    set: impl Fn(&DateValue, T) -> anyhow::Result<DateValue>,
) -> Vec<DateValue> {
    if values.is_empty() {
        return dates;
    }
    let mut out = Vec::with_capacity(dates.len() * values.len());
    for date in dates.iter() {
        for &value in values.iter() {
            match set(date, value) {
                Ok(d) => out.push(d),
                Err(err) => log::trace!(
                    "dropping {part} candidate from {date}: {err:#}"
                ),
            }
        }
    }
    log::debug!("after {part}: {}", Dates(&out));
    out
}

/// Generates the dates matching `wd` between `start` and `end` (inclusive)
/// with the time and zone of `date`.
fn generate<'a>(
    date: &'a DateValue,
    wd: &ByWeekday,
    start: Date,
    end: Date,
) -> impl Iterator<Item = DateValue> + 'a {
    wd.dates_between(start, end).filter_map(move |day| {
        match date.with_date(day) {
            Ok(d) => Some(d),
            Err(err) => {
                log::trace!("dropping BYDAY candidate {day}: {err:#}");
                None
            }
        }
    })
}

/// A list of dates that is formatted compactly for logging.
struct Dates<'a>(&'a [DateValue]);

impl<'a> std::fmt::Display for Dates<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(rule: &str, cursor: &str) -> String {
        let rule: RecurrenceRule = rule.parse().unwrap();
        let cursor: DateValue = cursor.parse().unwrap();
        let dates = Expander::new(&rule).expand(&cursor);
        dates.iter().map(|d| d.to_string()).collect::<Vec<_>>().join("\n")
    }

    #[test]
    fn no_by_parts_yields_cursor() {
        insta::assert_snapshot!(
            expand("FREQ=DAILY", "20240101T090000"),
            @"20240101T090000",
        );
    }

    #[test]
    fn by_month_rolls_and_clamps() {
        insta::assert_snapshot!(
            expand("FREQ=YEARLY;BYMONTH=4,2", "20240131"),
            @r"
        20240229
        20240430
        ",
        );
    }

    #[test]
    fn by_week_no() {
        insta::assert_snapshot!(
            expand("FREQ=YEARLY;BYWEEKNO=20;BYDAY=MO", "20240101"),
            @"20240513",
        );
        insta::assert_snapshot!(
            expand("FREQ=YEARLY;BYWEEKNO=-1;BYDAY=MO", "20240101"),
            @"20241223",
        );
        // For weeks starting on Sunday, the first week of 2025 starts on
        // 2024-12-29.
        insta::assert_snapshot!(
            expand("FREQ=YEARLY;WKST=SU;BYWEEKNO=1;BYDAY=SU", "20250101"),
            @"20241229",
        );
        // 2021 has only 52 weeks.
        insta::assert_snapshot!(
            expand("FREQ=YEARLY;BYWEEKNO=53", "20210104"),
            @"",
        );
    }

    #[test]
    fn by_year_day() {
        insta::assert_snapshot!(
            expand("FREQ=YEARLY;BYYEARDAY=-1,1", "20240615"),
            @r"
        20240101
        20241231
        ",
        );
    }

    #[test]
    fn by_month_day_drops_missing_days() {
        insta::assert_snapshot!(
            expand("FREQ=MONTHLY;BYMONTHDAY=1,30,31", "20240201"),
            @"20240201",
        );
        insta::assert_snapshot!(
            expand("FREQ=MONTHLY;BYMONTHDAY=-1", "20240201"),
            @"20240229",
        );
    }

    #[test]
    fn by_day_filters_with_month_day() {
        // 2024-09-13 is a Friday, but 2024-10-13 is not.
        insta::assert_snapshot!(
            expand("FREQ=MONTHLY;BYMONTHDAY=13;BYDAY=FR", "20240901"),
            @"20240913",
        );
        insta::assert_snapshot!(
            expand("FREQ=MONTHLY;BYMONTHDAY=13;BYDAY=FR", "20241001"),
            @"",
        );
        // Ordinals are ignored when filtering.
        insta::assert_snapshot!(
            expand("FREQ=MONTHLY;BYMONTHDAY=13;BYDAY=-2FR", "20240901"),
            @"20240913",
        );
    }

    #[test]
    fn by_day_filters_with_year_day() {
        // 2024-01-01 is a Monday.
        insta::assert_snapshot!(
            expand("FREQ=YEARLY;BYYEARDAY=1,2;BYDAY=MO", "20240601"),
            @"20240101",
        );
    }

    #[test]
    fn by_day_generates_within_month() {
        insta::assert_snapshot!(
            expand("FREQ=MONTHLY;BYDAY=1MO,-1FR", "20240115"),
            @r"
        20240101
        20240126
        ",
        );
        insta::assert_snapshot!(
            expand("FREQ=MONTHLY;BYDAY=TU", "20240215"),
            @r"
        20240206
        20240213
        20240220
        20240227
        ",
        );
        // February 2024 has only four Fridays.
        insta::assert_snapshot!(
            expand("FREQ=MONTHLY;BYDAY=5FR", "20240201"),
            @"",
        );
    }

    #[test]
    fn by_day_with_by_month_uses_month() {
        insta::assert_snapshot!(
            expand("FREQ=YEARLY;BYMONTH=1;BYDAY=-1FR", "20240101"),
            @"20240126",
        );
    }

    #[test]
    fn by_day_generates_within_year() {
        insta::assert_snapshot!(
            expand("FREQ=YEARLY;BYDAY=20MO", "20240101"),
            @"20240513",
        );
        insta::assert_snapshot!(
            expand("FREQ=YEARLY;BYDAY=-1SU", "20240101"),
            @"20241229",
        );
    }

    #[test]
    fn by_day_generates_within_week() {
        insta::assert_snapshot!(
            expand("FREQ=WEEKLY;BYDAY=MO,FR", "20240103"),
            @r"
        20240101
        20240105
        ",
        );
        insta::assert_snapshot!(
            expand("FREQ=WEEKLY;WKST=SU;BYDAY=SU,SA", "20240103"),
            @r"
        20231231
        20240106
        ",
        );
    }

    #[test]
    fn by_day_generates_within_day() {
        insta::assert_snapshot!(
            expand("FREQ=DAILY;BYDAY=MO", "20240101"),
            @"20240101",
        );
        insta::assert_snapshot!(
            expand("FREQ=DAILY;BYDAY=MO", "20240102"),
            @"",
        );
        insta::assert_snapshot!(
            expand("FREQ=HOURLY;BYDAY=MO,TU", "20240102T100000"),
            @"20240102T100000",
        );
    }

    #[test]
    fn time_parts_are_cross_products() {
        insta::assert_snapshot!(
            expand("FREQ=DAILY;BYHOUR=17,9;BYMINUTE=0,30", "20240101T080000"),
            @r"
        20240101T090000
        20240101T093000
        20240101T170000
        20240101T173000
        ",
        );
        insta::assert_snapshot!(
            expand("FREQ=MINUTELY;BYSECOND=15,45", "20240101T080000Z"),
            @r"
        20240101T080015Z
        20240101T080045Z
        ",
        );
    }

    #[test]
    fn time_parts_ignored_for_dates() {
        insta::assert_snapshot!(
            expand("FREQ=DAILY;BYHOUR=9,10;BYMINUTE=5", "20240101"),
            @"20240101",
        );
    }

    #[test]
    fn by_set_pos() {
        let rule = "FREQ=DAILY;BYHOUR=9,17;BYMINUTE=0,30;BYSETPOS=-1,1";
        insta::assert_snapshot!(
            expand(rule, "20240101T080000"),
            @r"
        20240101T090000
        20240101T173000
        ",
        );
        // Out of range positions are ignored.
        let rule = "FREQ=DAILY;BYHOUR=9,17;BYSETPOS=3,-3";
        insta::assert_snapshot!(expand(rule, "20240101T080000"), @"");
        // The last weekday of the month.
        let rule = "FREQ=MONTHLY;BYDAY=MO,TU,WE,TH,FR;BYSETPOS=-1";
        insta::assert_snapshot!(expand(rule, "20240301"), @"20240329");
    }

    #[test]
    fn zone_is_preserved() {
        insta::assert_snapshot!(
            expand(
                "FREQ=DAILY;BYHOUR=10",
                "TZID=America/New_York:20240101T090000",
            ),
            @"TZID=America/New_York:20240101T100000",
        );
        insta::assert_snapshot!(
            expand("FREQ=WEEKLY;BYDAY=TU", "20240101T090000Z"),
            @"20240102T090000Z",
        );
    }
}
