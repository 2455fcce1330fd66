use std::io::Write;

use {anyhow::Context, serde::ser::SerializeStruct};

use occur::{DEFAULT_MAX_PERIODS, DateValue};

use crate::args::{self, Configurable, Usage};

/// The `-s/--start` and `-e/--end` flags bounding an expansion.
///
/// Together these form the half-open window `[start, end)`.
#[derive(Clone, Debug, Default)]
pub struct Window {
    start: Option<DateValue>,
    end: Option<DateValue>,
}

impl Window {
    /// The start of the window, or `seed` when none was given.
    pub fn start(&self, seed: &DateValue) -> DateValue {
        self.start.clone().unwrap_or_else(|| seed.clone())
    }

    /// The exclusive end of the window, if given.
    pub fn end(&self) -> Option<DateValue> {
        self.end.clone()
    }
}

impl Configurable for Window {
    fn configure(
        &mut self,
        p: &mut lexopt::Parser,
        arg: &mut lexopt::Arg,
    ) -> anyhow::Result<bool> {
        use lexopt::Arg::*;

        match *arg {
            Short('s') | Long("start") => {
                self.start = Some(args::parse(p, "-s/--start")?);
            }
            Short('e') | Long("end") => {
                self.end = Some(args::parse(p, "-e/--end")?);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn usage(&self) -> &[Usage] {
        const START: Usage = Usage::flag(
            "-s/--start <datetime>",
            "The inclusive start of the window (default: the seed).",
            r#"
The inclusive start of the window (default: the seed).

Occurrences before this point are not printed. They still count toward the
rule's COUNT, since COUNT is always measured from the seed.

This accepts the same formats as <seed>.
"#,
        );
        const END: Usage = Usage::flag(
            "-e/--end <datetime>",
            "The exclusive end of the window.",
            r#"
The exclusive end of the window.

When absent, occurrences are printed until the rule's COUNT or UNTIL is
exhausted. For rules with neither, output only stops at the period limit
(see --max-periods), so piping into `head` is useful.

When given, all occurrences are collected before any are printed, and the
output is sorted with duplicates removed.

This accepts the same formats as <seed>.
"#,
        );
        &[START, END]
    }
}

/// The `--max-periods` flag.
///
/// This bounds the number of periods an expansion may examine.
#[derive(Clone, Debug, Default)]
pub struct MaxPeriods {
    limit: Option<u64>,
}

impl MaxPeriods {
    /// Returns the limit to use.
    ///
    /// When the flag isn't given, `OCCUR_MAX_PERIODS` is consulted before
    /// falling back to the library's default.
    pub fn get(&self) -> anyhow::Result<u64> {
        if let Some(limit) = self.limit {
            return Ok(limit);
        }
        let Some(value) = std::env::var_os("OCCUR_MAX_PERIODS") else {
            return Ok(DEFAULT_MAX_PERIODS);
        };
        let value = value.to_str().with_context(|| {
            format!("OCCUR_MAX_PERIODS value {value:?} is not valid UTF-8")
        })?;
        if value.is_empty() {
            return Ok(DEFAULT_MAX_PERIODS);
        }
        let limit = value.parse().with_context(|| {
            format!("failed to parse OCCUR_MAX_PERIODS value `{value}`")
        })?;
        log::debug!("using period limit {limit} from OCCUR_MAX_PERIODS");
        Ok(limit)
    }
}

impl Configurable for MaxPeriods {
    fn configure(
        &mut self,
        p: &mut lexopt::Parser,
        arg: &mut lexopt::Arg,
    ) -> anyhow::Result<bool> {
        match *arg {
            lexopt::Arg::Long("max-periods") => {
                self.limit = Some(args::parse(p, "--max-periods")?);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn usage(&self) -> &[Usage] {
        const MAX_PERIODS: Usage = Usage::flag(
            "--max-periods <number>",
            "The maximum number of periods to examine.",
            r#"
The maximum number of periods to examine.

Each step of the rule's frequency (e.g., each month for FREQ=MONTHLY) is one
period. Some rules never produce an occurrence, e.g., BYMONTHDAY=31 with
BYMONTH=2. This limit guarantees that expanding them still terminates.

When absent, the OCCUR_MAX_PERIODS environment variable is used. When that's
unset too, the limit is 1000000.
"#,
        );
        &[MAX_PERIODS]
    }
}

/// How occurrences are written to stdout.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Output {
    /// One iCalendar value per line.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl Output {
    /// Writes a single date to `wtr`, followed by a line terminator.
    pub fn write<W: Write>(
        &self,
        mut wtr: W,
        date: &DateValue,
    ) -> anyhow::Result<()> {
        match *self {
            Output::Text => writeln!(wtr, "{date}")?,
            Output::Json => {
                serde_json::to_writer(&mut wtr, &Occurrence(date))?;
                writeln!(wtr)?;
            }
        }
        Ok(())
    }
}

impl Configurable for Output {
    fn configure(
        &mut self,
        _: &mut lexopt::Parser,
        arg: &mut lexopt::Arg,
    ) -> anyhow::Result<bool> {
        match *arg {
            lexopt::Arg::Long("json") => *self = Output::Json,
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn usage(&self) -> &[Usage] {
        const JSON: Usage = Usage::flag(
            "--json",
            "Print each occurrence as a JSON object.",
            r#"
Print each occurrence as a JSON object, one per line.

Each object has a `value` field with the occurrence in iCalendar form and an
`instant` field with the physical instant it corresponds to, in RFC 3339
format. Floating and date values are treated as if they were in UTC.
"#,
        );
        &[JSON]
    }
}

/// The JSON representation of a single occurrence.
struct Occurrence<'a>(&'a DateValue);

impl<'a> serde::Serialize for Occurrence<'a> {
    fn serialize<S: serde::Serializer>(
        &self,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        let mut state = s.serialize_struct("Occurrence", 2)?;
        state.serialize_field("value", self.0)?;
        state.serialize_field("instant", &self.0.timestamp().to_string())?;
        state.end()
    }
}
