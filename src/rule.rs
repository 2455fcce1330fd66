use std::{
    collections::{BTreeMap, BTreeSet},
    ops::RangeInclusive,
    sync::{Arc, LazyLock},
};

use {
    jiff::{
        Span, ToSpan, Unit,
        civil::{Date, Weekday},
    },
    regex::Regex,
};

use crate::{
    date::{DateValue, Granularity},
    error::{InvalidRuleError, InvalidRuleErrorKind},
};

/// An RFC 5545 recurrence rule.
///
/// A rule is immutable. Methods like [`RecurrenceRule::with_count`] return a
/// new rule and leave the original untouched. Cloning a rule is cheap.
///
/// A rule is usually created by parsing the `RRULE` text grammar, e.g.,
/// `FREQ=MONTHLY;BYDAY=2TU;COUNT=10`, or via [`RecurrenceRule::builder`].
/// Its `Display` impl writes it back out in a canonical order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecurrenceRule {
    inner: Arc<RecurrenceRuleInner>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct RecurrenceRuleInner {
    freq: Frequency,
    // `None` when not given, which is the same as `1`.
    interval: Option<i32>,
    terminator: Terminator,
    by_second: Box<[i8]>,
    by_minute: Box<[i8]>,
    by_hour: Box<[i8]>,
    by_day: Box<[ByWeekday]>,
    // can be negative
    by_month_day: Box<[i8]>,
    // can be negative
    by_year_day: Box<[i16]>,
    // can be negative
    by_week_no: Box<[i8]>,
    by_month: Box<[i8]>,
    // can be negative
    by_set_pos: Box<[i32]>,
    // `None` when not given, which is the same as Monday.
    week_start: Option<Weekday>,
    extensions: BTreeMap<String, String>,
}

impl RecurrenceRule {
    /// Returns a builder for constructing a `RecurrenceRule`.
    ///
    /// The frequency is the only thing required to create a rule.
    pub fn builder(freq: Frequency) -> RecurrenceRuleBuilder {
        RecurrenceRuleBuilder::new(freq)
    }

    /// Parse a recurrence rule from its `RRULE` text form.
    ///
    /// The text is a sequence of `;` separated `KEY=VALUE` parts. Keys are
    /// case insensitive and a leading `RRULE:` property name is permitted.
    /// Parts that aren't defined by RFC 5545 are kept as extensions and
    /// written back out when the rule is serialized.
    ///
    /// When a rule has both `COUNT` and `UNTIL`, the one that appears last
    /// wins.
    pub fn parse(text: &str) -> Result<RecurrenceRule, InvalidRuleError> {
        let mut text = text.trim();
        if let Some(head) = text.get(..6) {
            if head.eq_ignore_ascii_case("RRULE:") {
                text = &text[6..];
            }
        }

        let mut freq = None;
        let mut seen = BTreeSet::new();
        let mut b = RecurrenceRuleBuilder::new(Frequency::Daily);
        for part in text.split(';').map(|part| part.trim()) {
            if part.is_empty() {
                continue;
            }
            let Some((key, value)) = part.split_once('=') else {
                return Err(InvalidRuleError::new(
                    InvalidRuleErrorKind::MissingValue(part.to_string()),
                ));
            };
            let name = key.trim().to_ascii_uppercase();
            let value = value.trim();
            if !seen.insert(name.clone()) {
                return Err(InvalidRuleError::new(
                    InvalidRuleErrorKind::DuplicatePart(name),
                ));
            }
            if value.is_empty() {
                return Err(InvalidRuleError::new(
                    InvalidRuleErrorKind::MissingValue(name),
                ));
            }
            match &*name {
                "FREQ" => freq = Some(value.parse::<Frequency>()?),
                "UNTIL" => {
                    b.until(parse_until(value)?);
                }
                "COUNT" => {
                    let count = parse_integer("COUNT", value)?;
                    let count = u32::try_from(count).map_err(|_| {
                        InvalidRuleError::out_of_range(
                            "COUNT",
                            count,
                            RANGE_COUNT,
                        )
                    })?;
                    b.count(count);
                }
                "INTERVAL" => {
                    let interval = parse_integer("INTERVAL", value)?;
                    let interval = i32::try_from(interval).map_err(|_| {
                        InvalidRuleError::out_of_range(
                            "INTERVAL",
                            interval,
                            RANGE_INTERVAL,
                        )
                    })?;
                    b.interval(interval);
                }
                "BYSECOND" => {
                    b.by_second(parse_list::<i8>("BYSECOND", value)?);
                }
                "BYMINUTE" => {
                    b.by_minute(parse_list::<i8>("BYMINUTE", value)?);
                }
                "BYHOUR" => {
                    b.by_hour(parse_list::<i8>("BYHOUR", value)?);
                }
                "BYDAY" => {
                    for token in value.split(',') {
                        b.by_day(token.trim().parse::<ByWeekday>()?);
                    }
                }
                "BYMONTHDAY" => {
                    b.by_month_day(parse_list::<i8>("BYMONTHDAY", value)?);
                }
                "BYYEARDAY" => {
                    b.by_year_day(parse_list::<i16>("BYYEARDAY", value)?);
                }
                "BYWEEKNO" => {
                    b.by_week_no(parse_list::<i8>("BYWEEKNO", value)?);
                }
                "BYMONTH" => {
                    b.by_month(parse_list::<i8>("BYMONTH", value)?);
                }
                "BYSETPOS" => {
                    b.by_set_pos(parse_list::<i32>("BYSETPOS", value)?);
                }
                "WKST" => {
                    let weekday = parse_weekday(value).ok_or_else(|| {
                        InvalidRuleError::new(
                            InvalidRuleErrorKind::InvalidWeekday(
                                value.to_string(),
                            ),
                        )
                    })?;
                    b.week_start(weekday);
                }
                _ => {
                    b.extension(key.trim(), value);
                }
            }
        }
        let Some(freq) = freq else {
            return Err(InvalidRuleError::new(
                InvalidRuleErrorKind::MissingFrequency,
            ));
        };
        b.freq = freq;
        b.build()
    }

    /// Create a rule with the given frequency that ends after `count`
    /// occurrences.
    pub fn with_frequency_count(
        freq: Frequency,
        count: u32,
    ) -> RecurrenceRule {
        let inner = RecurrenceRuleInner {
            terminator: Terminator::Count(count),
            ..RecurrenceRuleInner::new(freq)
        };
        RecurrenceRule { inner: Arc::new(inner) }
    }

    /// Create a rule with the given frequency that ends at `until`
    /// (inclusive).
    pub fn with_frequency_until(
        freq: Frequency,
        until: DateValue,
    ) -> RecurrenceRule {
        let inner = RecurrenceRuleInner {
            terminator: Terminator::Until(until),
            ..RecurrenceRuleInner::new(freq)
        };
        RecurrenceRule { inner: Arc::new(inner) }
    }

    /// Returns a new rule that ends after `count` occurrences.
    ///
    /// This replaces any `UNTIL` terminator on this rule.
    pub fn with_count(&self, count: u32) -> RecurrenceRule {
        self.modify(|inner| inner.terminator = Terminator::Count(count))
    }

    /// Returns a new rule that ends at `until` (inclusive).
    ///
    /// This replaces any `COUNT` terminator on this rule.
    pub fn with_until(&self, until: DateValue) -> RecurrenceRule {
        self.modify(|inner| inner.terminator = Terminator::Until(until))
    }

    /// Returns a new rule without any terminator.
    pub fn without_terminator(&self) -> RecurrenceRule {
        self.modify(|inner| inner.terminator = Terminator::Never)
    }

    /// Returns a new rule with the given interval. Values less than `1` are
    /// treated as if no interval were given.
    pub fn with_interval(&self, interval: i32) -> RecurrenceRule {
        let interval = (interval >= 1).then_some(interval);
        self.modify(|inner| inner.interval = interval)
    }

    /// Returns a new rule whose weeks start on the given weekday.
    pub fn with_week_start(&self, weekday: Weekday) -> RecurrenceRule {
        self.modify(|inner| inner.week_start = Some(weekday))
    }

    pub fn frequency(&self) -> Frequency {
        self.inner.freq
    }

    /// Returns the interval between periods, which is at least `1`.
    pub fn interval(&self) -> i32 {
        self.inner.interval.unwrap_or(1)
    }

    pub fn terminator(&self) -> &Terminator {
        &self.inner.terminator
    }

    pub fn count(&self) -> Option<u32> {
        match self.inner.terminator {
            Terminator::Count(count) => Some(count),
            _ => None,
        }
    }

    pub fn until(&self) -> Option<&DateValue> {
        match self.inner.terminator {
            Terminator::Until(ref until) => Some(until),
            _ => None,
        }
    }

    pub fn by_second(&self) -> &[i8] {
        &self.inner.by_second
    }

    pub fn by_minute(&self) -> &[i8] {
        &self.inner.by_minute
    }

    pub fn by_hour(&self) -> &[i8] {
        &self.inner.by_hour
    }

    pub fn by_day(&self) -> &[ByWeekday] {
        &self.inner.by_day
    }

    pub fn by_month_day(&self) -> &[i8] {
        &self.inner.by_month_day
    }

    pub fn by_year_day(&self) -> &[i16] {
        &self.inner.by_year_day
    }

    pub fn by_week_no(&self) -> &[i8] {
        &self.inner.by_week_no
    }

    pub fn by_month(&self) -> &[i8] {
        &self.inner.by_month
    }

    pub fn by_set_pos(&self) -> &[i32] {
        &self.inner.by_set_pos
    }

    /// Returns the first day of the week, which is Monday unless set.
    pub fn week_start(&self) -> Weekday {
        self.inner.week_start.unwrap_or(Weekday::Monday)
    }

    /// Returns the parts of this rule that aren't defined by RFC 5545.
    pub fn extensions(&self) -> &BTreeMap<String, String> {
        &self.inner.extensions
    }

    fn modify(
        &self,
        f: impl FnOnce(&mut RecurrenceRuleInner),
    ) -> RecurrenceRule {
        let mut inner = RecurrenceRuleInner::clone(&self.inner);
        f(&mut inner);
        RecurrenceRule { inner: Arc::new(inner) }
    }
}

impl RecurrenceRuleInner {
    fn new(freq: Frequency) -> RecurrenceRuleInner {
        RecurrenceRuleInner {
            freq,
            interval: None,
            terminator: Terminator::Never,
            by_second: Box::new([]),
            by_minute: Box::new([]),
            by_hour: Box::new([]),
            by_day: Box::new([]),
            by_month_day: Box::new([]),
            by_year_day: Box::new([]),
            by_week_no: Box::new([]),
            by_month: Box::new([]),
            by_set_pos: Box::new([]),
            week_start: None,
            extensions: BTreeMap::new(),
        }
    }
}

/// The default rule is `FREQ=DAILY;COUNT=1`.
impl Default for RecurrenceRule {
    fn default() -> RecurrenceRule {
        RecurrenceRule::with_frequency_count(Frequency::Daily, 1)
    }
}

impl std::str::FromStr for RecurrenceRule {
    type Err = InvalidRuleError;

    fn from_str(s: &str) -> Result<RecurrenceRule, InvalidRuleError> {
        RecurrenceRule::parse(s)
    }
}

/// Writes the rule in `RRULE` text form, without the `RRULE:` prefix.
///
/// Parts are always written in the same order, regardless of the order in
/// which they were given: `FREQ`, `WKST`, `INTERVAL`, `UNTIL`, `COUNT`,
/// `BYMONTH`, `BYWEEKNO`, `BYYEARDAY`, `BYMONTHDAY`, `BYDAY`, `BYHOUR`,
/// `BYMINUTE`, `BYSECOND`, `BYSETPOS` and then any extensions. Parts that
/// weren't given aren't written.
impl std::fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        fn list<T: std::fmt::Display>(
            f: &mut std::fmt::Formatter,
            name: &str,
            values: &[T],
        ) -> std::fmt::Result {
            if values.is_empty() {
                return Ok(());
            }
            write!(f, ";{name}=")?;
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{v}")?;
            }
            Ok(())
        }

        let r = &self.inner;
        write!(f, "FREQ={}", r.freq)?;
        if let Some(weekday) = r.week_start {
            write!(f, ";WKST={}", weekday_code(weekday))?;
        }
        if let Some(interval) = r.interval {
            write!(f, ";INTERVAL={interval}")?;
        }
        match r.terminator {
            Terminator::Never => {}
            Terminator::Until(ref until) => {
                write!(f, ";UNTIL={}", until.to_utc())?
            }
            Terminator::Count(count) => write!(f, ";COUNT={count}")?,
        }
        list(f, "BYMONTH", &r.by_month)?;
        list(f, "BYWEEKNO", &r.by_week_no)?;
        list(f, "BYYEARDAY", &r.by_year_day)?;
        list(f, "BYMONTHDAY", &r.by_month_day)?;
        list(f, "BYDAY", &r.by_day)?;
        list(f, "BYHOUR", &r.by_hour)?;
        list(f, "BYMINUTE", &r.by_minute)?;
        list(f, "BYSECOND", &r.by_second)?;
        list(f, "BYSETPOS", &r.by_set_pos)?;
        for (name, value) in r.extensions.iter() {
            write!(f, ";{name}={value}")?;
        }
        Ok(())
    }
}

/// A builder for constructing a valid recurrence rule.
#[derive(Clone, Debug)]
pub struct RecurrenceRuleBuilder {
    freq: Frequency,
    interval: Option<i32>,
    terminator: Terminator,
    by_second: Vec<i8>,
    by_minute: Vec<i8>,
    by_hour: Vec<i8>,
    by_day: Vec<ByWeekday>,
    by_month_day: Vec<i8>,
    by_year_day: Vec<i16>,
    by_week_no: Vec<i8>,
    by_month: Vec<i8>,
    by_set_pos: Vec<i32>,
    week_start: Option<Weekday>,
    extensions: BTreeMap<String, String>,
}

impl RecurrenceRuleBuilder {
    fn new(freq: Frequency) -> RecurrenceRuleBuilder {
        RecurrenceRuleBuilder {
            freq,
            interval: None,
            terminator: Terminator::Never,
            by_second: vec![],
            by_minute: vec![],
            by_hour: vec![],
            by_day: vec![],
            by_month_day: vec![],
            by_year_day: vec![],
            by_week_no: vec![],
            by_month: vec![],
            by_set_pos: vec![],
            week_start: None,
            extensions: BTreeMap::new(),
        }
    }

    /// Validate the values given to this builder and build a rule.
    ///
    /// Values in each list are kept in the order given, since the order
    /// is preserved when the rule is serialized.
    pub fn build(&self) -> Result<RecurrenceRule, InvalidRuleError> {
        fn check<T: Copy + Into<i64>>(
            part: &str,
            values: &[T],
        ) -> Result<Box<[T]>, InvalidRuleError> {
            for &v in values.iter() {
                validate(part, v.into())?;
            }
            Ok(values.to_vec().into_boxed_slice())
        }

        let mut by_day = Vec::with_capacity(self.by_day.len());
        for &v in self.by_day.iter() {
            let v = match v {
                // An ordinal of zero means every occurrence.
                ByWeekday::Numbered { nth: 0, weekday } => {
                    ByWeekday::Any(weekday)
                }
                ByWeekday::Numbered { nth, .. } => {
                    validate("BYDAY", i64::from(nth))?;
                    v
                }
                ByWeekday::Any(_) => v,
            };
            by_day.push(v);
        }
        let inner = RecurrenceRuleInner {
            freq: self.freq,
            interval: self.interval,
            terminator: self.terminator.clone(),
            by_second: check("BYSECOND", &self.by_second)?,
            by_minute: check("BYMINUTE", &self.by_minute)?,
            by_hour: check("BYHOUR", &self.by_hour)?,
            by_day: by_day.into_boxed_slice(),
            by_month_day: check("BYMONTHDAY", &self.by_month_day)?,
            by_year_day: check("BYYEARDAY", &self.by_year_day)?,
            by_week_no: check("BYWEEKNO", &self.by_week_no)?,
            by_month: check("BYMONTH", &self.by_month)?,
            by_set_pos: check("BYSETPOS", &self.by_set_pos)?,
            week_start: self.week_start,
            extensions: self.extensions.clone(),
        };
        Ok(RecurrenceRule { inner: Arc::new(inner) })
    }

    /// End the rule after `count` occurrences. This replaces any `until`.
    pub fn count(&mut self, count: u32) -> &mut RecurrenceRuleBuilder {
        self.terminator = Terminator::Count(count);
        self
    }

    /// End the rule at `until` (inclusive). This replaces any `count`.
    pub fn until(&mut self, until: DateValue) -> &mut RecurrenceRuleBuilder {
        self.terminator = Terminator::Until(until);
        self
    }

    /// Values less than `1` are treated as if no interval were given.
    pub fn interval(&mut self, interval: i32) -> &mut RecurrenceRuleBuilder {
        self.interval = (interval >= 1).then_some(interval);
        self
    }

    pub fn by_second<I: IntoI8Iter>(
        &mut self,
        seconds: I,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_second.extend(seconds.into_i8_iter());
        self
    }

    pub fn by_minute<I: IntoI8Iter>(
        &mut self,
        minutes: I,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_minute.extend(minutes.into_i8_iter());
        self
    }

    pub fn by_hour<I: IntoI8Iter>(
        &mut self,
        hours: I,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_hour.extend(hours.into_i8_iter());
        self
    }

    pub fn by_day<I: IntoByWeekdayIter>(
        &mut self,
        weekdays: I,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_day.extend(weekdays.into_by_weekday_iter());
        self
    }

    pub fn by_month_day<I: IntoI8Iter>(
        &mut self,
        days: I,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_month_day.extend(days.into_i8_iter());
        self
    }

    pub fn by_year_day<I: IntoI16Iter>(
        &mut self,
        days: I,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_year_day.extend(days.into_i16_iter());
        self
    }

    pub fn by_week_no<I: IntoI8Iter>(
        &mut self,
        weeks: I,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_week_no.extend(weeks.into_i8_iter());
        self
    }

    pub fn by_month<I: IntoI8Iter>(
        &mut self,
        months: I,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_month.extend(months.into_i8_iter());
        self
    }

    pub fn by_set_pos<I: IntoI32Iter>(
        &mut self,
        positions: I,
    ) -> &mut RecurrenceRuleBuilder {
        self.by_set_pos.extend(positions.into_i32_iter());
        self
    }

    pub fn week_start(
        &mut self,
        weekday: Weekday,
    ) -> &mut RecurrenceRuleBuilder {
        self.week_start = Some(weekday);
        self
    }

    /// Add a part that isn't defined by RFC 5545, e.g., `X-NAME=value`.
    ///
    /// Extensions aren't interpreted, but are preserved when the rule is
    /// serialized.
    pub fn extension(
        &mut self,
        name: &str,
        value: &str,
    ) -> &mut RecurrenceRuleBuilder {
        self.extensions.insert(name.to_string(), value.to_string());
        self
    }
}

/// How a recurrence rule ends.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum Terminator {
    /// The rule repeats forever.
    #[default]
    Never,
    /// The rule produces at most this many occurrences.
    Count(u32),
    /// The rule produces no occurrences after this value (inclusive).
    ///
    /// When this is a date, every occurrence on that date is included.
    Until(DateValue),
}

/// The unit of time at which a recurrence rule repeats.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Frequency {
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// Returns a span of `interval` units of this frequency.
    pub(crate) fn to_span(&self, interval: i32) -> anyhow::Result<Span> {
        let base = match *self {
            Frequency::Yearly => 1.year(),
            Frequency::Monthly => 1.month(),
            Frequency::Weekly => 1.week(),
            Frequency::Daily => 1.day(),
            Frequency::Hourly => 1.hour(),
            Frequency::Minutely => 1.minute(),
            Frequency::Secondly => 1.second(),
        };
        Ok(base.checked_mul(i64::from(interval))?)
    }

    pub(crate) fn unit(&self) -> Unit {
        match *self {
            Frequency::Yearly => Unit::Year,
            Frequency::Monthly => Unit::Month,
            Frequency::Weekly => Unit::Week,
            Frequency::Daily => Unit::Day,
            Frequency::Hourly => Unit::Hour,
            Frequency::Minutely => Unit::Minute,
            Frequency::Secondly => Unit::Second,
        }
    }

    /// Returns true for frequencies shorter than a day.
    pub(crate) fn is_sub_daily(&self) -> bool {
        matches!(
            *self,
            Frequency::Hourly | Frequency::Minutely | Frequency::Secondly
        )
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            Frequency::Yearly => "YEARLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Daily => "DAILY",
            Frequency::Hourly => "HOURLY",
            Frequency::Minutely => "MINUTELY",
            Frequency::Secondly => "SECONDLY",
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Frequency {
    type Err = InvalidRuleError;

    fn from_str(s: &str) -> Result<Frequency, InvalidRuleError> {
        use self::Frequency::*;

        let freq = match &*s.trim().to_ascii_uppercase() {
            "YEARLY" => Yearly,
            "MONTHLY" => Monthly,
            "WEEKLY" => Weekly,
            "DAILY" => Daily,
            "HOURLY" => Hourly,
            "MINUTELY" => Minutely,
            "SECONDLY" => Secondly,
            _ => {
                return Err(InvalidRuleError::new(
                    InvalidRuleErrorKind::UnknownFrequency(s.to_string()),
                ));
            }
        };
        Ok(freq)
    }
}

/// A `BYDAY` token: a weekday with an optional signed ordinal.
///
/// `Any(Friday)` is every Friday in a period. `Numbered { nth: -1, weekday:
/// Friday }` is the last Friday in a period. What the period is depends on
/// the rule (see [`crate::Expander`]).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ByWeekday {
    Any(Weekday),
    Numbered { nth: i8, weekday: Weekday },
}

impl ByWeekday {
    pub fn weekday(&self) -> Weekday {
        match *self {
            ByWeekday::Any(weekday) => weekday,
            ByWeekday::Numbered { weekday, .. } => weekday,
        }
    }

    /// Returns the dates matching this token between `start` and `end`
    /// (inclusive).
    ///
    /// For a numbered weekday, this is the single date at that 1-based
    /// position counting forward from `start` (positive) or backward from
    /// `end` (negative). If there is no such date, then nothing is returned.
    pub(crate) fn dates_between(
        &self,
        start: Date,
        end: Date,
    ) -> impl Iterator<Item = Date> + use<> {
        match *self {
            ByWeekday::Any(weekday) => {
                Either::Left(iter_weekdays_between(weekday, start, end))
            }
            ByWeekday::Numbered { nth, weekday } => {
                let all: Vec<Date> =
                    iter_weekdays_between(weekday, start, end).collect();
                let index = if nth > 0 {
                    usize::try_from(nth - 1).ok()
                } else {
                    all.len().checked_sub(usize::from(nth.unsigned_abs()))
                };
                let date = index.and_then(|i| all.get(i).copied());
                Either::Right(date.into_iter())
            }
        }
    }
}

impl From<Weekday> for ByWeekday {
    fn from(weekday: Weekday) -> ByWeekday {
        ByWeekday::Any(weekday)
    }
}

impl std::str::FromStr for ByWeekday {
    type Err = InvalidRuleError;

    fn from_str(s: &str) -> Result<ByWeekday, InvalidRuleError> {
        static RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^(?i)([+-]?[0-9]+)?(MO|TU|WE|TH|FR|SA|SU)$").unwrap()
        });

        let invalid = || {
            InvalidRuleError::new(InvalidRuleErrorKind::InvalidWeekday(
                s.to_string(),
            ))
        };
        let caps = RE.captures(s).ok_or_else(invalid)?;
        let weekday = parse_weekday(&caps[2]).ok_or_else(invalid)?;
        let Some(nth) = caps.get(1) else {
            return Ok(ByWeekday::Any(weekday));
        };
        let nth = parse_integer("BYDAY", nth.as_str())?;
        validate("BYDAY", nth)?;
        match i8::try_from(nth) {
            Ok(0) => Ok(ByWeekday::Any(weekday)),
            Ok(nth) => Ok(ByWeekday::Numbered { nth, weekday }),
            Err(_) => Err(InvalidRuleError::out_of_range(
                "BYDAY",
                nth,
                RANGE_ORDINAL,
            )),
        }
    }
}

impl std::fmt::Display for ByWeekday {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            ByWeekday::Any(weekday) => f.write_str(weekday_code(weekday)),
            ByWeekday::Numbered { nth, weekday } => {
                write!(f, "{nth}{}", weekday_code(weekday))
            }
        }
    }
}

const RANGE_COUNT: &str = "0..=4294967295";
const RANGE_INTERVAL: &str = "1..=2147483647";
const RANGE_ORDINAL: &str = "1..=53 or -53..=-1";

/// Checks that `value` is in the legal range for the named part.
///
/// For `BYDAY`, the value checked is the ordinal of a numbered weekday.
fn validate(part: &str, value: i64) -> Result<(), InvalidRuleError> {
    let nonzero = |max: i64| -max <= value && value <= max && value != 0;
    let (ok, range) = match part {
        "BYSECOND" => ((0..=60).contains(&value), "0..=60"),
        "BYMINUTE" => ((0..=59).contains(&value), "0..=59"),
        "BYHOUR" => ((0..=23).contains(&value), "0..=23"),
        "BYMONTH" => ((1..=12).contains(&value), "1..=12"),
        "BYMONTHDAY" => (nonzero(31), "1..=31 or -31..=-1"),
        "BYYEARDAY" => (nonzero(366), "1..=366 or -366..=-1"),
        "BYWEEKNO" => (nonzero(53), "1..=53 or -53..=-1"),
        "BYSETPOS" => (nonzero(366), "1..=366 or -366..=-1"),
        "BYDAY" => (-53 <= value && value <= 53, RANGE_ORDINAL),
        _ => (true, ""),
    };
    if !ok {
        return Err(InvalidRuleError::out_of_range(part, value, range));
    }
    Ok(())
}

fn parse_integer(part: &str, value: &str) -> Result<i64, InvalidRuleError> {
    value
        .trim()
        .parse::<i64>()
        .map_err(|_| InvalidRuleError::invalid_integer(part, value))
}

/// Parses a comma separated list of integers for the named part.
///
/// Each value is range checked before being narrowed to `T`.
fn parse_list<T: TryFrom<i64>>(
    part: &str,
    value: &str,
) -> Result<Vec<T>, InvalidRuleError> {
    let mut list = vec![];
    for item in value.split(',') {
        let v = parse_integer(part, item)?;
        validate(part, v)?;
        let v = T::try_from(v).map_err(|_| {
            InvalidRuleError::invalid_integer(part, item.trim())
        })?;
        list.push(v);
    }
    Ok(list)
}

/// Parses an `UNTIL` value.
///
/// Datetimes are always converted to UTC. A floating datetime has its civil
/// time interpreted as UTC.
fn parse_until(value: &str) -> Result<DateValue, InvalidRuleError> {
    let until = value.parse::<DateValue>().map_err(|_| {
        InvalidRuleError::new(InvalidRuleErrorKind::InvalidUntil(
            value.to_string(),
        ))
    })?;
    Ok(match until.granularity() {
        Granularity::Date => until,
        Granularity::DateTime => until.to_utc(),
    })
}

fn parse_weekday(s: &str) -> Option<Weekday> {
    let weekday = match &*s.trim().to_ascii_uppercase() {
        "MO" => Weekday::Monday,
        "TU" => Weekday::Tuesday,
        "WE" => Weekday::Wednesday,
        "TH" => Weekday::Thursday,
        "FR" => Weekday::Friday,
        "SA" => Weekday::Saturday,
        "SU" => Weekday::Sunday,
        _ => return None,
    };
    Some(weekday)
}

fn weekday_code(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Monday => "MO",
        Weekday::Tuesday => "TU",
        Weekday::Wednesday => "WE",
        Weekday::Thursday => "TH",
        Weekday::Friday => "FR",
        Weekday::Saturday => "SA",
        Weekday::Sunday => "SU",
    }
}

/// A simple `Either` type for easy construction of `impl Iterator`.
enum Either<L, R> {
    Left(L),
    Right(R),
}

impl<L, R, I> Iterator for Either<L, R>
where
    L: Iterator<Item = I>,
    R: Iterator<Item = I>,
{
    type Item = I;

    fn next(&mut self) -> Option<I> {
        match *self {
            Either::Left(ref mut it) => it.next(),
            Either::Right(ref mut it) => it.next(),
        }
    }
}

/// Returns an iterator for every weekday between `start` and `end`
/// (inclusive).
fn iter_weekdays_between(
    weekday: Weekday,
    start: Date,
    end: Date,
) -> impl Iterator<Item = Date> + use<> {
    let first = if start.weekday() == weekday {
        Some(start)
    } else {
        start.nth_weekday(1, weekday).ok()
    };
    let mut cur = first.filter(|&d| d <= end);
    std::iter::from_fn(move || {
        let next = cur.take()?;
        cur = next.checked_add(1.week()).ok().filter(|&d| d <= end);
        Some(next)
    })
}

/// A trait for types that can be turned into a sequence of `i8` values.
///
/// This lets builder methods accept a single value, an inclusive range, an
/// array or a slice.
pub trait IntoI8Iter {
    fn into_i8_iter(self) -> impl Iterator<Item = i8>;
}

/// A trait for types that can be turned into a sequence of `i16` values.
pub trait IntoI16Iter {
    fn into_i16_iter(self) -> impl Iterator<Item = i16>;
}

/// A trait for types that can be turned into a sequence of `i32` values.
pub trait IntoI32Iter {
    fn into_i32_iter(self) -> impl Iterator<Item = i32>;
}

/// A trait for types that can be turned into a sequence of `BYDAY` tokens.
pub trait IntoByWeekdayIter {
    fn into_by_weekday_iter(self) -> impl Iterator<Item = ByWeekday>;
}

macro_rules! impl_into_int_iter {
    ($trait:ident, $method:ident, $ty:ty) => {
        impl $trait for $ty {
            fn $method(self) -> impl Iterator<Item = $ty> {
                std::iter::once(self)
            }
        }

        impl $trait for RangeInclusive<$ty> {
            fn $method(self) -> impl Iterator<Item = $ty> {
                self
            }
        }

        impl $trait for Vec<$ty> {
            fn $method(self) -> impl Iterator<Item = $ty> {
                self.into_iter()
            }
        }

        impl<const N: usize> $trait for [$ty; N] {
            fn $method(self) -> impl Iterator<Item = $ty> {
                self.into_iter()
            }
        }

        impl<'a> $trait for &'a [$ty] {
            fn $method(self) -> impl Iterator<Item = $ty> {
                self.iter().copied()
            }
        }
    };
}

impl_into_int_iter!(IntoI8Iter, into_i8_iter, i8);
impl_into_int_iter!(IntoI16Iter, into_i16_iter, i16);
impl_into_int_iter!(IntoI32Iter, into_i32_iter, i32);

impl IntoByWeekdayIter for ByWeekday {
    fn into_by_weekday_iter(self) -> impl Iterator<Item = ByWeekday> {
        std::iter::once(self)
    }
}

impl IntoByWeekdayIter for Weekday {
    fn into_by_weekday_iter(self) -> impl Iterator<Item = ByWeekday> {
        std::iter::once(ByWeekday::Any(self))
    }
}

impl IntoByWeekdayIter for (i8, Weekday) {
    fn into_by_weekday_iter(self) -> impl Iterator<Item = ByWeekday> {
        let (nth, weekday) = self;
        let by_weekday = if nth == 0 {
            ByWeekday::Any(weekday)
        } else {
            ByWeekday::Numbered { nth, weekday }
        };
        std::iter::once(by_weekday)
    }
}

impl<T, const N: usize> IntoByWeekdayIter for [T; N]
where
    T: IntoByWeekdayIter,
{
    fn into_by_weekday_iter(self) -> impl Iterator<Item = ByWeekday> {
        self.into_iter().flat_map(|t| t.into_by_weekday_iter())
    }
}

#[cfg(test)]
mod tests {
    use jiff::civil::{Weekday::*, date};

    use super::*;

    fn rule(s: &str) -> RecurrenceRule {
        s.parse().unwrap()
    }

    fn expect_err(s: &str) -> InvalidRuleError {
        match s.parse::<RecurrenceRule>() {
            Err(err) => err,
            Ok(ok) => {
                panic!("expected recurrence rule error, but got:\n{ok:?}")
            }
        }
    }

    #[test]
    fn serialize_in_canonical_order() {
        insta::assert_snapshot!(
            rule("BYDAY=-1FR;COUNT=2;BYMONTH=1;FREQ=YEARLY"),
            @"FREQ=YEARLY;COUNT=2;BYMONTH=1;BYDAY=-1FR",
        );
        insta::assert_snapshot!(
            rule(
                "BYSETPOS=-1;BYSECOND=0;BYMINUTE=30;BYHOUR=9,17;\
                 BYDAY=MO,TU;BYMONTHDAY=1,-1;BYYEARDAY=100;BYWEEKNO=20;\
                 BYMONTH=3,1;UNTIL=20301231;INTERVAL=2;WKST=SU;FREQ=YEARLY",
            ),
            @"FREQ=YEARLY;WKST=SU;INTERVAL=2;UNTIL=20301231;BYMONTH=3,1;BYWEEKNO=20;BYYEARDAY=100;BYMONTHDAY=1,-1;BYDAY=MO,TU;BYHOUR=9,17;BYMINUTE=30;BYSECOND=0;BYSETPOS=-1",
        );
    }

    #[test]
    fn parse_is_case_insensitive() {
        insta::assert_snapshot!(
            rule("freq=weekly;byday=mo,+2we,-1fr;wkst=su"),
            @"FREQ=WEEKLY;WKST=SU;BYDAY=MO,2WE,-1FR",
        );
    }

    #[test]
    fn parse_property_prefix() {
        insta::assert_snapshot!(
            rule("RRULE:FREQ=DAILY;COUNT=10"),
            @"FREQ=DAILY;COUNT=10",
        );
        insta::assert_snapshot!(
            rule("rrule:FREQ=DAILY;COUNT=10;"),
            @"FREQ=DAILY;COUNT=10",
        );
    }

    #[test]
    fn extensions_round_trip() {
        let r = rule("FREQ=MONTHLY;X-NAME=hello;BYMONTHDAY=1;X-OTHER=a,b");
        assert_eq!(r.extensions().get("X-NAME").map(|s| &**s), Some("hello"));
        insta::assert_snapshot!(
            r,
            @"FREQ=MONTHLY;BYMONTHDAY=1;X-NAME=hello;X-OTHER=a,b",
        );
        assert_eq!(rule(&r.to_string()), r);
    }

    #[test]
    fn until_is_forced_to_utc() {
        let r = rule("FREQ=DAILY;UNTIL=19971224T000000");
        insta::assert_snapshot!(r, @"FREQ=DAILY;UNTIL=19971224T000000Z");
        let r = rule("FREQ=DAILY;UNTIL=19971224T000000Z");
        insta::assert_snapshot!(r, @"FREQ=DAILY;UNTIL=19971224T000000Z");
        let r = rule("FREQ=DAILY;UNTIL=19971224");
        insta::assert_snapshot!(r, @"FREQ=DAILY;UNTIL=19971224");
        assert!(r.until().unwrap().is_date());

        let until: DateValue =
            "TZID=America/New_York:19971224T090000".parse().unwrap();
        let r = rule("FREQ=DAILY").with_until(until);
        insta::assert_snapshot!(r, @"FREQ=DAILY;UNTIL=19971224T140000Z");
    }

    #[test]
    fn terminators_replace_each_other() {
        let r = rule("FREQ=DAILY;COUNT=5");
        assert_eq!(r.count(), Some(5));
        let until: DateValue = "20240101".parse().unwrap();
        let r = r.with_until(until.clone());
        assert_eq!(r.count(), None);
        assert_eq!(r.until(), Some(&until));
        let r = r.with_count(3);
        assert_eq!(r.terminator(), &Terminator::Count(3));
        assert_eq!(r.without_terminator().terminator(), &Terminator::Never);

        // When both are given in text, the last one wins.
        let r = rule("FREQ=DAILY;COUNT=5;UNTIL=20240101");
        assert_eq!(r.terminator(), &Terminator::Until(until));
        let r = rule("FREQ=DAILY;UNTIL=20240101;COUNT=5");
        assert_eq!(r.terminator(), &Terminator::Count(5));
    }

    #[test]
    fn setters_leave_original_unchanged() {
        let r = rule("FREQ=WEEKLY;COUNT=5");
        let r2 = r.with_interval(2).with_week_start(Sunday);
        assert_eq!(r.interval(), 1);
        assert_eq!(r.week_start(), Monday);
        assert_eq!(r2.interval(), 2);
        assert_eq!(r2.week_start(), Sunday);
        insta::assert_snapshot!(r2, @"FREQ=WEEKLY;WKST=SU;INTERVAL=2;COUNT=5");
    }

    #[test]
    fn interval_less_than_one_is_unset() {
        let r = rule("FREQ=DAILY;INTERVAL=0");
        assert_eq!(r.interval(), 1);
        insta::assert_snapshot!(r, @"FREQ=DAILY");
        let r = rule("FREQ=DAILY;INTERVAL=-3");
        assert_eq!(r.interval(), 1);
    }

    #[test]
    fn default_rule() {
        insta::assert_snapshot!(
            RecurrenceRule::default(),
            @"FREQ=DAILY;COUNT=1",
        );
        let until: DateValue = "20240101T000000Z".parse().unwrap();
        let r = RecurrenceRule::with_frequency_until(Frequency::Weekly, until);
        insta::assert_snapshot!(r, @"FREQ=WEEKLY;UNTIL=20240101T000000Z");
    }

    #[test]
    fn builder() {
        let r = RecurrenceRule::builder(Frequency::Monthly)
            .by_day([(1, Monday), (-1, Friday)])
            .by_day(Wednesday)
            .by_hour(9..=11)
            .by_set_pos([-1, 1])
            .count(4)
            .build()
            .unwrap();
        insta::assert_snapshot!(
            r,
            @"FREQ=MONTHLY;COUNT=4;BYDAY=1MO,-1FR,WE;BYHOUR=9,10,11;BYSETPOS=-1,1",
        );

        let err = RecurrenceRule::builder(Frequency::Yearly)
            .by_month(13)
            .build()
            .unwrap_err();
        insta::assert_snapshot!(
            err,
            @"invalid 'BYMONTH' value `13` (values must be in range 1..=12)",
        );
        let err = RecurrenceRule::builder(Frequency::Yearly)
            .by_day((54, Monday))
            .build()
            .unwrap_err();
        insta::assert_snapshot!(
            err,
            @"invalid 'BYDAY' value `54` (values must be in range 1..=53 or -53..=-1)",
        );
    }

    #[test]
    fn builder_zero_ordinal_is_any() {
        let r = RecurrenceRule::builder(Frequency::Monthly)
            .by_day((0, Monday))
            .by_day(ByWeekday::Numbered { nth: 0, weekday: Friday })
            .build()
            .unwrap();
        assert_eq!(
            r.by_day(),
            &[ByWeekday::Any(Monday), ByWeekday::Any(Friday)],
        );
        insta::assert_snapshot!(r, @"FREQ=MONTHLY;BYDAY=MO,FR");
    }

    #[test]
    fn frequency_errors() {
        let err = expect_err("COUNT=5");
        assert_eq!(err.kind(), &InvalidRuleErrorKind::MissingFrequency);
        insta::assert_snapshot!(
            err,
            @"recurrence rule is missing required 'FREQ' part",
        );

        let err = expect_err("FREQ=FORTNIGHTLY;COUNT=5");
        insta::assert_snapshot!(
            err,
            @"unrecognized frequency `FORTNIGHTLY` (expected one of SECONDLY, MINUTELY, HOURLY, DAILY, WEEKLY, MONTHLY or YEARLY)",
        );
    }

    #[test]
    fn malformed_part_errors() {
        insta::assert_snapshot!(
            expect_err("FREQ=DAILY;COUNT"),
            @"recurrence rule part `COUNT` has no value",
        );
        insta::assert_snapshot!(
            expect_err("FREQ=DAILY;COUNT="),
            @"recurrence rule part `COUNT` has no value",
        );
        insta::assert_snapshot!(
            expect_err("FREQ=DAILY;COUNT=3;COUNT=4"),
            @"recurrence rule part `COUNT` was given more than once",
        );
    }

    #[test]
    fn integer_errors() {
        insta::assert_snapshot!(
            expect_err("FREQ=DAILY;COUNT=ten"),
            @"invalid 'COUNT' value `ten` (expected an integer)",
        );
        insta::assert_snapshot!(
            expect_err("FREQ=DAILY;INTERVAL=2x"),
            @"invalid 'INTERVAL' value `2x` (expected an integer)",
        );
        insta::assert_snapshot!(
            expect_err("FREQ=DAILY;COUNT=-1"),
            @"invalid 'COUNT' value `-1` (values must be in range 0..=4294967295)",
        );
        insta::assert_snapshot!(
            expect_err("FREQ=DAILY;BYHOUR=9,,10"),
            @"invalid 'BYHOUR' value `` (expected an integer)",
        );
        insta::assert_snapshot!(
            expect_err("FREQ=DAILY;BYHOUR=24"),
            @"invalid 'BYHOUR' value `24` (values must be in range 0..=23)",
        );
        insta::assert_snapshot!(
            expect_err("FREQ=MONTHLY;BYMONTHDAY=0"),
            @"invalid 'BYMONTHDAY' value `0` (values must be in range 1..=31 or -31..=-1)",
        );
        insta::assert_snapshot!(
            expect_err("FREQ=YEARLY;BYYEARDAY=1000"),
            @"invalid 'BYYEARDAY' value `1000` (values must be in range 1..=366 or -366..=-1)",
        );
        insta::assert_snapshot!(
            expect_err("FREQ=YEARLY;BYWEEKNO=-54"),
            @"invalid 'BYWEEKNO' value `-54` (values must be in range 1..=53 or -53..=-1)",
        );
        insta::assert_snapshot!(
            expect_err("FREQ=YEARLY;BYMONTH=0"),
            @"invalid 'BYMONTH' value `0` (values must be in range 1..=12)",
        );
        insta::assert_snapshot!(
            expect_err("FREQ=MONTHLY;BYSETPOS=0"),
            @"invalid 'BYSETPOS' value `0` (values must be in range 1..=366 or -366..=-1)",
        );
        // BYSECOND allows for a leap second.
        assert_eq!(rule("FREQ=MINUTELY;BYSECOND=60").by_second(), &[60]);
    }

    #[test]
    fn weekday_errors() {
        insta::assert_snapshot!(
            expect_err("FREQ=WEEKLY;BYDAY=MO,XX"),
            @"invalid weekday `XX` (expected an optional signed ordinal followed by one of MO, TU, WE, TH, FR, SA or SU)",
        );
        insta::assert_snapshot!(
            expect_err("FREQ=WEEKLY;BYDAY=1"),
            @"invalid weekday `1` (expected an optional signed ordinal followed by one of MO, TU, WE, TH, FR, SA or SU)",
        );
        insta::assert_snapshot!(
            expect_err("FREQ=YEARLY;BYDAY=60MO"),
            @"invalid 'BYDAY' value `60` (values must be in range 1..=53 or -53..=-1)",
        );
        insta::assert_snapshot!(
            expect_err("FREQ=WEEKLY;WKST=MONDAY"),
            @"invalid weekday `MONDAY` (expected an optional signed ordinal followed by one of MO, TU, WE, TH, FR, SA or SU)",
        );
        // An ordinal of zero means every occurrence.
        let r = rule("FREQ=MONTHLY;BYDAY=0MO");
        assert_eq!(r.by_day(), &[ByWeekday::Any(Monday)]);
    }

    #[test]
    fn until_errors() {
        insta::assert_snapshot!(
            expect_err("FREQ=DAILY;UNTIL=tomorrow"),
            @"invalid 'UNTIL' value `tomorrow` (expected a date or a datetime)",
        );
        insta::assert_snapshot!(
            expect_err("FREQ=DAILY;UNTIL=20240231"),
            @"invalid 'UNTIL' value `20240231` (expected a date or a datetime)",
        );
    }

    #[test]
    fn weekday_dates_between() {
        let (start, end) = (date(2024, 1, 1), date(2024, 1, 31));
        let fridays: Vec<Date> =
            ByWeekday::Any(Friday).dates_between(start, end).collect();
        assert_eq!(
            fridays,
            vec![
                date(2024, 1, 5),
                date(2024, 1, 12),
                date(2024, 1, 19),
                date(2024, 1, 26),
            ],
        );
        let nth = |nth, weekday| {
            ByWeekday::Numbered { nth, weekday }
                .dates_between(start, end)
                .collect::<Vec<Date>>()
        };
        assert_eq!(nth(1, Monday), vec![date(2024, 1, 1)]);
        assert_eq!(nth(-1, Wednesday), vec![date(2024, 1, 31)]);
        assert_eq!(nth(-2, Friday), vec![date(2024, 1, 19)]);
        assert_eq!(nth(5, Wednesday), vec![date(2024, 1, 31)]);
        assert_eq!(nth(5, Friday), Vec::<Date>::new());
        assert_eq!(nth(-5, Friday), Vec::<Date>::new());
    }
}
