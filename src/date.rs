use std::cmp::Ordering;

use {
    anyhow::Context,
    jiff::{
        Span, Timestamp,
        civil::{self, Weekday},
        fmt,
        tz::{Offset, TimeZone},
    },
};

use crate::weekdate::{self, WeekDate};

static TEMPORAL_PARSER: fmt::temporal::DateTimeParser =
    fmt::temporal::DateTimeParser::new();

/// Whether a value carries a time of day or not.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub enum Granularity {
    /// A calendar date. The time of day is always midnight and setting the
    /// hour, minute or second of a date is a no-op.
    Date,
    /// A calendar date with a time of day, to second precision.
    DateTime,
}

/// How the civil time of a value maps to a physical instant.
#[derive(Clone, Debug)]
pub enum ZoneMode {
    /// Civil time with no time zone.
    ///
    /// For the purposes of ordering, floating values are interpreted as if
    /// they were in UTC.
    Floating,
    /// Civil time in UTC.
    Utc,
    /// Civil time in the given time zone.
    Zoned(TimeZone),
}

impl ZoneMode {
    fn offset_for(&self, ts: Timestamp) -> Offset {
        match *self {
            ZoneMode::Floating | ZoneMode::Utc => Offset::UTC,
            ZoneMode::Zoned(ref tz) => tz.to_offset(ts),
        }
    }
}

impl PartialEq for ZoneMode {
    fn eq(&self, rhs: &ZoneMode) -> bool {
        match (self, rhs) {
            (ZoneMode::Floating, ZoneMode::Floating) => true,
            (ZoneMode::Utc, ZoneMode::Utc) => true,
            (ZoneMode::Zoned(lhs), ZoneMode::Zoned(rhs)) => {
                match (lhs.iana_name(), rhs.iana_name()) {
                    (Some(lhs), Some(rhs)) => lhs == rhs,
                    (None, None) => {
                        lhs.to_fixed_offset().ok()
                            == rhs.to_fixed_offset().ok()
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

impl Eq for ZoneMode {}

/// An immutable date or datetime, tagged with a granularity and a zone mode.
///
/// Every calendar field operation on a `DateValue` returns a new value with
/// the same granularity and zone mode. Operations that would produce an
/// invalid calendar date (like February 30) return an error instead of
/// overflowing into an adjacent field.
///
/// Values are ordered by the physical instant they refer to. Date values
/// and floating values are interpreted in UTC for this purpose.
#[derive(Clone, Debug)]
pub struct DateValue {
    civil: civil::DateTime,
    granularity: Granularity,
    zone: ZoneMode,
    instant: Timestamp,
}

impl DateValue {
    /// Create a new value from its constituent parts.
    ///
    /// When the granularity is `Date`, the time of `civil` is discarded.
    ///
    /// When the zone is a time zone and `civil` is ambiguous in that time
    /// zone (i.e., it falls in a gap or a fold), then it is resolved using
    /// the "compatible" strategy from RFC 5545. In the case of a gap, this
    /// means the civil time of the value returned will differ from `civil`.
    ///
    /// This returns an error when the resulting instant is outside of the
    /// range supported by Jiff.
    pub fn new(
        civil: civil::DateTime,
        granularity: Granularity,
        zone: ZoneMode,
    ) -> anyhow::Result<DateValue> {
        let civil = match granularity {
            Granularity::Date => {
                civil.date().to_datetime(civil::Time::midnight())
            }
            Granularity::DateTime => civil,
        };
        let (civil, instant) = match zone {
            ZoneMode::Floating | ZoneMode::Utc => {
                let ts = Offset::UTC.to_timestamp(civil).with_context(|| {
                    format!("datetime `{civil}` is out of supported range")
                })?;
                (civil, ts)
            }
            ZoneMode::Zoned(ref tz) => {
                let ts = tz
                    .to_ambiguous_timestamp(civil)
                    .compatible()
                    .with_context(|| {
                        format!(
                            "datetime `{civil}` could not be resolved \
                             in time zone `{name}`",
                            name = tz.iana_name().unwrap_or("<unknown>"),
                        )
                    })?;
                (tz.to_datetime(ts), ts)
            }
        };
        Ok(DateValue { civil, granularity, zone, instant })
    }

    /// Create a new date-only floating value.
    pub fn date(date: civil::Date) -> anyhow::Result<DateValue> {
        DateValue::new(
            date.to_datetime(civil::Time::midnight()),
            Granularity::Date,
            ZoneMode::Floating,
        )
    }

    /// Create a new floating datetime.
    pub fn floating(dt: civil::DateTime) -> anyhow::Result<DateValue> {
        DateValue::new(dt, Granularity::DateTime, ZoneMode::Floating)
    }

    /// Create a new datetime in UTC.
    pub fn utc(dt: civil::DateTime) -> anyhow::Result<DateValue> {
        DateValue::new(dt, Granularity::DateTime, ZoneMode::Utc)
    }

    /// Create a new datetime in the given time zone.
    pub fn zoned(
        dt: civil::DateTime,
        tz: TimeZone,
    ) -> anyhow::Result<DateValue> {
        DateValue::new(dt, Granularity::DateTime, ZoneMode::Zoned(tz))
    }

    /// Create a new datetime in the IANA time zone with the given name.
    pub fn in_tz(
        dt: civil::DateTime,
        name: &str,
    ) -> anyhow::Result<DateValue> {
        let tz = TimeZone::get(name)
            .with_context(|| format!("unknown time zone `{name}`"))?;
        DateValue::zoned(dt, tz)
    }

    /// Returns the civil (wall clock) datetime of this value.
    pub fn civil(&self) -> civil::DateTime {
        self.civil
    }

    /// Returns the civil date of this value.
    pub fn date_part(&self) -> civil::Date {
        self.civil.date()
    }

    /// Returns the physical instant this value corresponds to.
    pub fn timestamp(&self) -> Timestamp {
        self.instant
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn zone(&self) -> &ZoneMode {
        &self.zone
    }

    /// Returns true when this is a date-only value.
    pub fn is_date(&self) -> bool {
        self.granularity == Granularity::Date
    }

    pub fn weekday(&self) -> Weekday {
        self.civil.weekday()
    }

    /// Returns this value converted to UTC.
    ///
    /// Floating values have their civil time reinterpreted as UTC. Zoned
    /// values keep their instant and get the corresponding UTC civil time.
    /// Date values are returned unchanged.
    pub fn to_utc(&self) -> DateValue {
        if self.is_date() {
            return self.clone();
        }
        let civil = match self.zone {
            ZoneMode::Floating | ZoneMode::Utc => self.civil,
            ZoneMode::Zoned(_) => Offset::UTC.to_datetime(self.instant),
        };
        DateValue {
            civil,
            granularity: Granularity::DateTime,
            zone: ZoneMode::Utc,
            instant: self.instant,
        }
    }

    /// Returns a new value with the given civil datetime, but with the same
    /// granularity and zone mode as this one.
    pub fn with_civil(
        &self,
        civil: civil::DateTime,
    ) -> anyhow::Result<DateValue> {
        DateValue::new(civil, self.granularity, self.zone.clone())
    }

    /// Returns a new value with the date replaced and the time kept.
    pub fn with_date(&self, date: civil::Date) -> anyhow::Result<DateValue> {
        self.with_civil(self.civil.with().date(date).build()?)
    }

    /// Adds the given span to the civil time of this value.
    pub fn checked_add(&self, span: Span) -> anyhow::Result<DateValue> {
        self.with_civil(self.civil.checked_add(span)?)
    }

    /// Rolls the month of this value to `month` (1-12), within the same year.
    ///
    /// The day of the month is clamped to the last day of the target month.
    /// So rolling January 31 to February gives February 28 (or 29).
    pub fn roll_month(&self, month: i8) -> anyhow::Result<DateValue> {
        let first = civil::Date::new(self.civil.year(), month, 1)?;
        let day = self.civil.day().min(first.days_in_month());
        self.with_civil(self.civil.with().month(month).day(day).build()?)
    }

    /// Sets the week of the year, keeping the year and the weekday.
    ///
    /// Weeks are numbered from 1 according to `start`. The first week of the
    /// year is the first week with at least four days in that year. A
    /// negative week counts back from the last week of the year, with `-1`
    /// corresponding to the last week.
    pub fn with_week_of_year(
        &self,
        start: Weekday,
        week: i8,
    ) -> anyhow::Result<DateValue> {
        let year = self.civil.year();
        let week = if week.is_negative() {
            // Add 1 because -1 is the last week of the year, and the weeks
            // of the year are 1-indexed.
            weekdate::weeks_in_year(start, year) + week + 1
        } else {
            week
        };
        anyhow::ensure!(
            week >= 1,
            "week number is before the first week of `{year}`",
        );
        let wd = WeekDate::new(start, year, week, self.weekday())?;
        self.with_date(wd.date())
    }

    /// Sets the day of the year. A negative day counts back from the end of
    /// the year, with `-1` corresponding to December 31.
    pub fn with_day_of_year(&self, day: i16) -> anyhow::Result<DateValue> {
        let day = if day.is_negative() {
            self.civil.days_in_year() + day + 1
        } else {
            day
        };
        self.with_civil(self.civil.with().day_of_year(day).build()?)
    }

    /// Sets the day of the month. A negative day counts back from the end of
    /// the month, with `-1` corresponding to its last day.
    pub fn with_day_of_month(&self, day: i8) -> anyhow::Result<DateValue> {
        let day = if day.is_negative() {
            self.civil.days_in_month() + day + 1
        } else {
            day
        };
        self.with_civil(self.civil.with().day(day).build()?)
    }

    pub fn with_hour(&self, hour: i8) -> anyhow::Result<DateValue> {
        if self.is_date() {
            return Ok(self.clone());
        }
        self.with_civil(self.civil.with().hour(hour).build()?)
    }

    pub fn with_minute(&self, minute: i8) -> anyhow::Result<DateValue> {
        if self.is_date() {
            return Ok(self.clone());
        }
        self.with_civil(self.civil.with().minute(minute).build()?)
    }

    pub fn with_second(&self, second: i8) -> anyhow::Result<DateValue> {
        if self.is_date() {
            return Ok(self.clone());
        }
        self.with_civil(self.civil.with().second(second).build()?)
    }

    /// Adds the given span to the physical instant of this value. Unlike
    /// `checked_add`, the result always differs by exactly `span`, even when
    /// a time zone transition falls between the two.
    ///
    /// The span must not have units of days or greater.
    pub(crate) fn checked_add_exact(
        &self,
        span: Span,
    ) -> anyhow::Result<DateValue> {
        let ts = self.instant.checked_add(span)?;
        self.with_civil(self.civil_at(ts))
    }

    /// Returns the civil time, in this value's zone, of the given instant.
    pub(crate) fn civil_at(&self, ts: Timestamp) -> civil::DateTime {
        self.zone.offset_for(ts).to_datetime(ts)
    }

    /// Returns true when this value is strictly after `limit`.
    ///
    /// When `limit` is a date, the comparison is done on calendar dates
    /// alone. That is, every time on the date of `limit` is not after it.
    pub(crate) fn is_after(&self, limit: &DateValue) -> bool {
        if limit.is_date() {
            self.civil.date() > limit.civil.date()
        } else {
            self.instant > limit.instant
        }
    }
}

impl Eq for DateValue {}

impl PartialEq for DateValue {
    fn eq(&self, rhs: &DateValue) -> bool {
        self.cmp(rhs) == Ordering::Equal
    }
}

impl Ord for DateValue {
    fn cmp(&self, rhs: &DateValue) -> Ordering {
        (self.instant, self.civil, self.granularity).cmp(&(
            rhs.instant,
            rhs.civil,
            rhs.granularity,
        ))
    }
}

impl PartialOrd for DateValue {
    fn partial_cmp(&self, rhs: &DateValue) -> Option<Ordering> {
        Some(self.cmp(rhs))
    }
}

/// Formats this value in the iCalendar form, e.g., `20240101`,
/// `20240101T090000`, `20240101T090000Z` or
/// `TZID=America/New_York:20240101T090000`.
///
/// Zoned values whose time zone has no IANA name are written in UTC.
impl std::fmt::Display for DateValue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let civil = match self.zone {
            ZoneMode::Zoned(ref tz) => match tz.iana_name() {
                Some(name) => {
                    write!(f, "TZID={name}:")?;
                    self.civil
                }
                None if self.is_date() => self.civil,
                None => return self.to_utc().fmt(f),
            },
            _ => self.civil,
        };
        write!(
            f,
            "{:04}{:02}{:02}",
            civil.year(),
            civil.month(),
            civil.day()
        )?;
        if self.is_date() {
            return Ok(());
        }
        write!(
            f,
            "T{:02}{:02}{:02}",
            civil.hour(),
            civil.minute(),
            civil.second()
        )?;
        if matches!(self.zone, ZoneMode::Utc) {
            write!(f, "Z")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for DateValue {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<DateValue> {
        let s = s.trim();
        if let Some(rest) = strip_prefix_ignore_case(s, "TZID=") {
            let Some((name, value)) = rest.split_once(':') else {
                anyhow::bail!(
                    "invalid zoned value `{s}` \
                     (expected `TZID=<zone>:<value>`)"
                );
            };
            let tz = TimeZone::get(name)
                .with_context(|| format!("unknown time zone `{name}`"))?;
            let (civil, granularity) = parse_civil(value)?;
            return DateValue::new(civil, granularity, ZoneMode::Zoned(tz));
        }
        if s.contains('[') {
            let zdt = TEMPORAL_PARSER
                .parse_zoned(s)
                .with_context(|| format!("invalid datetime `{s}`"))?;
            return DateValue::zoned(zdt.datetime(), zdt.time_zone().clone());
        }
        if let Some(value) = s.strip_suffix(['Z', 'z']) {
            let (civil, granularity) = parse_civil(value)?;
            anyhow::ensure!(
                granularity == Granularity::DateTime,
                "invalid UTC value `{s}` (a date cannot be in UTC)",
            );
            return DateValue::utc(civil);
        }
        let (civil, granularity) = parse_civil(s)?;
        DateValue::new(civil, granularity, ZoneMode::Floating)
    }
}

impl serde::Serialize for DateValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Parses a civil date or datetime, without any zone information.
///
/// This accepts the iCalendar basic formats (`20240101` and
/// `20240101T090000`) along with the ISO 8601 extended formats accepted by
/// Jiff (e.g., `2024-01-01` and `2024-01-01T09:00:00`).
fn parse_civil(s: &str) -> anyhow::Result<(civil::DateTime, Granularity)> {
    match s.split_once(['T', 't']) {
        None => {
            let date = match parse_basic_date(s) {
                Some(result) => result?,
                None => TEMPORAL_PARSER
                    .parse_date(s)
                    .with_context(|| format!("invalid date `{s}`"))?,
            };
            Ok((date.to_datetime(civil::Time::midnight()), Granularity::Date))
        }
        Some((date_part, time_part)) => {
            let basic =
                (parse_basic_date(date_part), parse_basic_time(time_part));
            let dt = match basic {
                (Some(date), Some(time)) => date?.to_datetime(time?),
                _ => TEMPORAL_PARSER
                    .parse_datetime(s)
                    .with_context(|| format!("invalid datetime `{s}`"))?,
            };
            Ok((dt, Granularity::DateTime))
        }
    }
}

/// Parses `YYYYMMDD`. Returns `None` when `s` isn't 8 ASCII digits.
fn parse_basic_date(s: &str) -> Option<anyhow::Result<civil::Date>> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i16 = s[0..4].parse().ok()?;
    let month: i8 = s[4..6].parse().ok()?;
    let day: i8 = s[6..8].parse().ok()?;
    Some(
        civil::Date::new(year, month, day)
            .with_context(|| format!("invalid date `{s}`")),
    )
}

/// Parses `HHMMSS`. Returns `None` when `s` isn't 6 ASCII digits.
///
/// A leap second (`60`) is clamped to `59`.
fn parse_basic_time(s: &str) -> Option<anyhow::Result<civil::Time>> {
    if s.len() != 6 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hour: i8 = s[0..2].parse().ok()?;
    let minute: i8 = s[2..4].parse().ok()?;
    let second: i8 = s[4..6].parse().ok()?;
    Some(
        civil::Time::new(hour, minute, second.min(59), 0)
            .with_context(|| format!("invalid time `{s}`")),
    )
}

fn strip_prefix_ignore_case<'a>(
    s: &'a str,
    prefix: &str,
) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}
