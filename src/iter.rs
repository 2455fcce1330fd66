use std::collections::VecDeque;

use anyhow::Context;
use jiff::{Span, Timestamp, ToSpan, Unit, civil};

use crate::{
    date::DateValue,
    expand::Expander,
    rule::{Frequency, RecurrenceRule},
};

/// The default maximum number of periods examined by an expansion.
pub const DEFAULT_MAX_PERIODS: u64 = 1_000_000;

/// An expansion of a recurrence rule from a seed, within a window.
///
/// The seed is the first occurrence of the recurring item. The window is a
/// half-open interval `[start, end)`. When no start is given, it defaults to
/// the seed. When no end is given, the expansion only stops once the rule's
/// `COUNT` or `UNTIL` is exhausted (or the period limit is reached).
///
/// Occurrences are produced one period at a time by an [`Occurrences`]
/// iterator. Use [`Expansion::to_vec`] to collect them into a sorted list.
///
/// Note that when a rule has a `COUNT`, candidates that fall outside of the
/// window still count toward it. So a window that starts after the seed
/// can see fewer occurrences than `COUNT`, even when more exist in the
/// window.
#[derive(Clone, Debug)]
pub struct Expansion {
    rule: RecurrenceRule,
    seed: DateValue,
    start: DateValue,
    end: Option<DateValue>,
    max_periods: u64,
}

impl Expansion {
    pub fn new(rule: &RecurrenceRule, seed: DateValue) -> Expansion {
        Expansion {
            rule: rule.clone(),
            start: seed.clone(),
            seed,
            end: None,
            max_periods: DEFAULT_MAX_PERIODS,
        }
    }

    /// Set the window of this expansion to `[start, end)`.
    pub fn window(self, start: DateValue, end: DateValue) -> Expansion {
        Expansion { start, end: Some(end), ..self }
    }

    /// Set the inclusive start of the window.
    pub fn start(self, start: DateValue) -> Expansion {
        Expansion { start, ..self }
    }

    /// Set the exclusive end of the window.
    pub fn end(self, end: Option<DateValue>) -> Expansion {
        Expansion { end, ..self }
    }

    /// Set the maximum number of periods to examine before giving up.
    ///
    /// This bounds the work done for rules that would otherwise never end,
    /// or that produce no candidates for a long time.
    pub fn max_periods(self, max_periods: u64) -> Expansion {
        Expansion { max_periods, ..self }
    }

    pub fn rule(&self) -> &RecurrenceRule {
        &self.rule
    }

    pub fn seed(&self) -> &DateValue {
        &self.seed
    }

    /// Returns a lazy iterator over the occurrences of this expansion.
    ///
    /// Occurrences are yielded in ascending order and without duplicates.
    /// A candidate that isn't after the last occurrence yielded is dropped,
    /// but it still counts toward the rule's `COUNT`.
    pub fn iter(&self) -> Occurrences {
        Occurrences::new(self)
    }

    /// Returns every occurrence of this expansion, in ascending order and
    /// without duplicates.
    pub fn to_vec(&self) -> Vec<DateValue> {
        self.iter().collect()
    }
}

impl<'a> IntoIterator for &'a Expansion {
    type IntoIter = Occurrences;
    type Item = DateValue;

    fn into_iter(self) -> Occurrences {
        self.iter()
    }
}

impl RecurrenceRule {
    /// Returns an expansion of this rule starting at `seed`.
    pub fn expansion(&self, seed: DateValue) -> Expansion {
        Expansion::new(self, seed)
    }

    /// Returns the occurrences of this rule from `seed` within the window
    /// `[start, end)`, in ascending order.
    pub fn dates(
        &self,
        seed: &DateValue,
        start: &DateValue,
        end: &DateValue,
    ) -> Vec<DateValue> {
        self.expansion(seed.clone())
            .window(start.clone(), end.clone())
            .to_vec()
    }

    /// Like [`RecurrenceRule::dates`], but with `start` as the seed.
    pub fn dates_in(
        &self,
        start: &DateValue,
        end: &DateValue,
    ) -> Vec<DateValue> {
        self.dates(start, start, end)
    }
}

/// A lazy iterator over the occurrences of an [`Expansion`].
///
/// Cloning this iterator is cheap and the clone resumes from the same
/// point.
#[derive(Clone, Debug)]
pub struct Occurrences {
    expander: Expander,
    seed: DateValue,
    start: DateValue,
    end: Option<DateValue>,
    /// The number of periods from the seed of the next cursor.
    step: i64,
    /// The civil time of the next cursor. `None` once it overflows.
    civil: Option<civil::DateTime>,
    pending: VecDeque<DateValue>,
    /// The last occurrence yielded.
    last: Option<DateValue>,
    emitted: u64,
    /// Candidates on or after the seed, but outside of the window.
    invalid: u64,
    /// The greatest candidate seen so far, including those before the seed.
    max_seen: Option<DateValue>,
    periods: u64,
    max_periods: u64,
    done: bool,
}

impl Occurrences {
    fn new(exp: &Expansion) -> Occurrences {
        let mut it = Occurrences {
            expander: Expander::new(&exp.rule),
            seed: exp.seed.clone(),
            start: exp.start.clone(),
            end: exp.end.clone(),
            step: 0,
            civil: Some(exp.seed.civil()),
            pending: VecDeque::new(),
            last: None,
            emitted: 0,
            invalid: 0,
            max_seen: None,
            periods: 0,
            max_periods: exp.max_periods,
            done: false,
        };
        if let Some(ref end) = it.end {
            if end.timestamp() <= it.start.timestamp() {
                log::debug!(
                    "window [{}, {end}) is empty, so there are no occurrences",
                    it.start,
                );
                it.done = true;
                return it;
            }
        }
        it.fast_forward();
        it
    }

    fn rule(&self) -> &RecurrenceRule {
        self.expander.rule()
    }

    /// Returns the cursor of the next period.
    ///
    /// Sub-daily cursors are an exact duration from the seed. Every other
    /// cursor is the previous cursor's civil time plus one step, so a day
    /// clamped at the end of a short month stays clamped. That is, a monthly
    /// rule from January 31 has cursors on February 29, March 29 and so on.
    fn cursor(&self) -> anyhow::Result<DateValue> {
        if self.rule().frequency().is_sub_daily() {
            return self.cursor_at(self.step);
        }
        let civil = self.civil.with_context(|| {
            format!("cursor {} periods after seed is out of range", self.step)
        })?;
        self.seed.with_civil(civil)
    }

    /// Moves the cursor forward by one period.
    fn advance(&mut self) {
        self.step += 1;
        let span = self.rule().frequency().to_span(self.rule().interval());
        self.civil = match (self.civil, span) {
            (Some(civil), Ok(span)) => civil.checked_add(span).ok(),
            _ => None,
        };
    }

    /// Returns the cursor that is `step` periods after the seed, computed
    /// directly from the seed.
    ///
    /// For monthly and yearly rules, this differs from the cursor reached
    /// by stepping once the day of the month has been clamped.
    fn cursor_at(&self, step: i64) -> anyhow::Result<DateValue> {
        let freq = self.rule().frequency();
        let span = freq.to_span(self.rule().interval())?.checked_mul(step)?;
        if freq.is_sub_daily() {
            self.seed.checked_add_exact(span)
        } else {
            self.seed.checked_add(span)
        }
    }

    /// Skips over the periods that can't have any occurrences in the
    /// window.
    ///
    /// This never happens for rules with a `COUNT`, since every candidate
    /// from the seed onwards counts toward it.
    fn fast_forward(&mut self) {
        if self.rule().count().is_some() {
            return;
        }
        let start = self.start.timestamp();
        if self.seed.timestamp() >= start {
            return;
        }
        let freq = self.rule().frequency();
        if matches!(freq, Frequency::Monthly | Frequency::Yearly) {
            self.walk_to(start);
        } else {
            self.jump_to(start);
        }
        log::debug!(
            "skipped {} periods to reach start of window {}",
            self.step,
            self.start,
        );
    }

    /// Steps the cursor forward one period at a time until the period
    /// before the last cursor preceding `start`.
    ///
    /// Stepping is needed because clamped days carry over from one cursor
    /// to the next. There are at most twelve steps per year.
    fn walk_to(&mut self, start: Timestamp) {
        let Ok(span) =
            self.rule().frequency().to_span(self.rule().interval())
        else {
            return;
        };
        let seed = self.seed.civil();
        let (mut behind, mut at, mut step) = (seed, seed, 0i64);
        while let Ok(next) = at.checked_add(span) {
            let before = self
                .seed
                .with_civil(next)
                .is_ok_and(|c| c.timestamp() < start);
            if !before {
                break;
            }
            (behind, at, step) = (at, next, step + 1);
        }
        // Back off one period, since a period's candidates can come before
        // its cursor.
        self.step = step.saturating_sub(1);
        self.civil = Some(behind);
    }

    /// Moves the cursor to the period before the last cursor preceding
    /// `start`, computing it directly from the seed.
    fn jump_to(&mut self, start: Timestamp) {
        let unit = self.rule().frequency().unit();
        let target = self.seed.civil_at(start);
        let span = match self.seed.civil().until((unit, target)) {
            Ok(span) => span,
            Err(err) => {
                log::debug!("could not skip to start of window: {err}");
                return;
            }
        };
        let mut step = units(span, unit) / i64::from(self.rule().interval());
        while step > 0 && !self.is_cursor_before(step, start) {
            step -= 1;
        }
        while self.is_cursor_before(step + 1, start) {
            step += 1;
        }
        // Back off one more period, since a period's candidates can come
        // before its cursor.
        self.step = step.saturating_sub(1).max(0);
        let span = self
            .rule()
            .frequency()
            .to_span(self.rule().interval())
            .and_then(|span| Ok(span.checked_mul(self.step)?));
        let seed = self.seed.civil();
        self.civil = span.ok().and_then(|span| seed.checked_add(span).ok());
    }

    fn is_cursor_before(&self, step: i64, ts: Timestamp) -> bool {
        self.cursor_at(step).is_ok_and(|c| c.timestamp() < ts)
    }

    /// Returns true when no period from here on can produce an occurrence.
    fn is_exhausted(&self) -> bool {
        let rule = self.rule();
        if let Some(ref max) = self.max_seen {
            if rule.until().is_some_and(|until| max.is_after(until)) {
                return true;
            }
            if let Some(ref end) = self.end {
                if max.timestamp() > end.timestamp() {
                    return true;
                }
            }
        }
        if let Some(count) = rule.count() {
            if self.emitted + self.invalid >= u64::from(count) {
                return true;
            }
        }
        if self.periods >= self.max_periods {
            log::warn!(
                "stopped expanding `{rule}` after examining {} periods",
                self.periods,
            );
            return true;
        }
        false
    }

    /// Returns true when every candidate of the period containing `cursor`
    /// (and every period after it) must come after the end of the window or
    /// after `UNTIL`.
    ///
    /// No candidate can come more than a week before the start of the
    /// year containing its cursor. The extra day accounts for time zones.
    fn is_beyond(&self, cursor: &DateValue) -> bool {
        let floor = cursor.date_part().first_of_year().checked_sub(8.days());
        let Some(floor) = floor.ok().and_then(|d| cursor.with_date(d).ok())
        else {
            return false;
        };
        if let Some(ref end) = self.end {
            if floor.timestamp() >= end.timestamp() {
                return true;
            }
        }
        self.rule().until().is_some_and(|until| floor.is_after(until))
    }

    /// Expands the next period, adding its occurrences to `pending`.
    fn next_period(&mut self) {
        if self.is_exhausted() {
            self.done = true;
            return;
        }
        let cursor = match self.cursor() {
            Ok(cursor) => cursor,
            Err(err) => {
                log::debug!("stopping at period {}: {err:#}", self.step);
                self.done = true;
                return;
            }
        };
        self.advance();
        self.periods += 1;
        if self.is_beyond(&cursor) {
            log::trace!("period with cursor {cursor} is beyond the window");
            self.done = true;
            return;
        }
        log::trace!("expanding period with cursor {cursor}");

        let (start, end) = (self.start.timestamp(), self.end.clone());
        let count = self.rule().count().map(u64::from);
        let until = self.rule().until().cloned();
        for candidate in self.expander.expand(&cursor) {
            if self.max_seen.as_ref().is_none_or(|max| candidate > *max) {
                self.max_seen = Some(candidate.clone());
            }
            let ts = candidate.timestamp();
            if ts < self.seed.timestamp() {
                continue;
            }
            let after_end =
                end.as_ref().is_some_and(|end| ts >= end.timestamp());
            if ts < start || after_end {
                self.invalid += 1;
                continue;
            }
            if count.is_some_and(|n| self.emitted + self.invalid >= n) {
                self.done = true;
                break;
            }
            if until.as_ref().is_some_and(|u| candidate.is_after(u)) {
                self.done = true;
                break;
            }
            self.emitted += 1;
            // A later period can fold back onto dates already yielded, e.g.,
            // a daily rule with BYMONTH=1 maps February 2 to January 2.
            // These still count toward COUNT.
            if self.last.as_ref().is_some_and(|last| candidate <= *last) {
                log::trace!("dropping {candidate}, already past it");
                continue;
            }
            self.last = Some(candidate.clone());
            self.pending.push_back(candidate);
        }
    }
}

impl Iterator for Occurrences {
    type Item = DateValue;

    fn next(&mut self) -> Option<DateValue> {
        loop {
            if let Some(date) = self.pending.pop_front() {
                return Some(date);
            }
            if self.done {
                return None;
            }
            self.next_period();
        }
    }
}

impl std::iter::FusedIterator for Occurrences {}

/// Returns the value of `span` in `unit`, where `unit` is the largest unit
/// of `span`.
fn units(span: Span, unit: Unit) -> i64 {
    match unit {
        Unit::Year => i64::from(span.get_years()),
        Unit::Month => i64::from(span.get_months()),
        Unit::Week => i64::from(span.get_weeks()),
        Unit::Day => i64::from(span.get_days()),
        Unit::Hour => i64::from(span.get_hours()),
        Unit::Minute => span.get_minutes(),
        _ => span.get_seconds(),
    }
}
