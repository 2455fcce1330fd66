use std::io::BufRead;

use {anyhow::Context, lexopt::ValueExt};

use occur::{DateValue, RecurrenceRule};

use crate::args::{Configurable, Usage};

/// A single required positional argument.
#[derive(Clone, Debug)]
struct Single<T> {
    name: &'static str,
    value: Option<T>,
}

impl<T> Single<T> {
    const fn new(name: &'static str) -> Single<T> {
        Single { name, value: None }
    }

    fn get(&self) -> anyhow::Result<&T> {
        self.value
            .as_ref()
            .with_context(|| format!("missing required {}", self.name))
    }

    /// Fills this argument with `arg` if it's a positional value and this
    /// hasn't been filled yet.
    fn fill(
        &mut self,
        arg: &mut lexopt::Arg,
        parse: impl FnOnce(&str) -> anyhow::Result<T>,
    ) -> anyhow::Result<bool> {
        let lexopt::Arg::Value(ref mut v) = *arg else { return Ok(false) };
        if self.value.is_some() {
            return Ok(false);
        }
        let v = std::mem::take(v).string()?;
        let name = self.name;
        let value = parse(&v).with_context(|| format!("{name} `{v}`"))?;
        self.value = Some(value);
        Ok(true)
    }
}

/// The `<rule>` positional argument.
#[derive(Clone, Debug)]
pub struct Rule(Single<RecurrenceRule>);

impl Rule {
    const ARG: Usage = Usage::arg(
        "<rule>",
        "A recurrence rule, e.g., FREQ=WEEKLY;BYDAY=MO,FR;COUNT=4.",
        r#"
A recurrence rule, e.g., FREQ=WEEKLY;BYDAY=MO,FR;COUNT=4.

Rules use the RFC 5545 RRULE grammar. A leading `RRULE:` is accepted and
ignored, and rule part names are case insensitive. Unrecognized rule parts are
kept as extensions and otherwise ignored.

Remember to quote rules in your shell, since `;` separates commands.
"#,
    );

    pub fn get(&self) -> anyhow::Result<&RecurrenceRule> {
        self.0.get()
    }
}

impl Default for Rule {
    fn default() -> Rule {
        Rule(Single::new("<rule>"))
    }
}

impl Configurable for Rule {
    fn configure(
        &mut self,
        _: &mut lexopt::Parser,
        arg: &mut lexopt::Arg,
    ) -> anyhow::Result<bool> {
        self.0.fill(arg, |s| Ok(RecurrenceRule::parse(s)?))
    }

    fn usage(&self) -> &[Usage] {
        &[Rule::ARG]
    }
}

/// A positional date or datetime, e.g., `<seed>` or `<cursor>`.
#[derive(Clone, Debug)]
pub struct Date {
    single: Single<DateValue>,
    usage: &'static [Usage],
}

impl Date {
    /// The first occurrence of the recurring item.
    pub fn seed() -> Date {
        const ARG: Usage = Usage::arg(
            "<seed>",
            "The first occurrence, e.g., 20240101T090000Z.",
            r#"
The first occurrence of the recurring item, e.g., 20240101T090000Z.

The rule is expanded from this point forward. It also supplies every field
the rule doesn't constrain, so with FREQ=DAILY and a seed at 09:00, every
occurrence is at 09:00. The seed itself is only an occurrence when it matches
the rule.

Accepted formats are a date (`20240101`), a floating datetime
(`20240101T090000`), a UTC datetime (`20240101T090000Z`), a datetime in a
time zone (`TZID=America/New_York:20240101T090000`) or an RFC 9557 datetime
with a time zone annotation (`2024-01-01T09:00:00-05:00[America/New_York]`).
"#,
        );
        Date { single: Single::new("<seed>"), usage: &[ARG] }
    }

    /// The point from which a single period of candidates is computed.
    pub fn cursor() -> Date {
        const ARG: Usage = Usage::arg(
            "<cursor>",
            "The point to compute candidates for.",
            r#"
The point to compute candidates for.

The candidates are every date generated by the rule's BY* parts for the
period containing this point. The cursor supplies every field the rule
doesn't constrain.

Accepted formats are a date (`20240101`), a floating datetime
(`20240101T090000`), a UTC datetime (`20240101T090000Z`), a datetime in a
time zone (`TZID=America/New_York:20240101T090000`) or an RFC 9557 datetime
with a time zone annotation (`2024-01-01T09:00:00-05:00[America/New_York]`).
"#,
        );
        Date { single: Single::new("<cursor>"), usage: &[ARG] }
    }

    pub fn get(&self) -> anyhow::Result<&DateValue> {
        self.single.get()
    }
}

impl Configurable for Date {
    fn configure(
        &mut self,
        _: &mut lexopt::Parser,
        arg: &mut lexopt::Arg,
    ) -> anyhow::Result<bool> {
        self.single.fill(arg, |s| s.parse())
    }

    fn usage(&self) -> &[Usage] {
        self.usage
    }
}

/// Any number of `<rule>` positional arguments.
///
/// When none are given, rules are read from stdin, one per line. Blank lines
/// are skipped.
#[derive(Clone, Debug, Default)]
pub struct Rules {
    positional: Vec<String>,
}

impl Rules {
    const ARG: Usage = Usage::arg(
        "<rule>...",
        "Zero or more recurrence rules.",
        r#"
Zero or more recurrence rules.

When no rules are given, they are read from stdin, one per line. Blank lines
are skipped.
"#,
    );

    /// Run `f` over every rule, in order.
    ///
    /// Errors are tagged with where the rule came from.
    pub fn try_for_each(
        self,
        mut f: impl FnMut(RecurrenceRule) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        if !self.positional.is_empty() {
            for rule in self.positional.iter() {
                let parsed = RecurrenceRule::parse(rule)
                    .with_context(|| format!("<rule> `{rule}`"))?;
                f(parsed)?;
            }
            return Ok(());
        }
        for (i, line) in std::io::stdin().lock().lines().enumerate() {
            let line = line.context("failed to read <stdin>")?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let parsed = RecurrenceRule::parse(line)
                .with_context(|| format!("line {} of <stdin>", i + 1))?;
            f(parsed)?;
        }
        Ok(())
    }
}

impl Configurable for Rules {
    fn configure(
        &mut self,
        _: &mut lexopt::Parser,
        arg: &mut lexopt::Arg,
    ) -> anyhow::Result<bool> {
        let lexopt::Arg::Value(ref mut v) = *arg else { return Ok(false) };
        self.positional.push(std::mem::take(v).string()?);
        Ok(true)
    }

    fn usage(&self) -> &[Usage] {
        &[Rules::ARG]
    }
}
