/*!
Expansion of RFC 5545 recurrence rules into concrete occurrences.

A [`RecurrenceRule`] is parsed from (or serialized to) the `RRULE` text
grammar, e.g., `FREQ=WEEKLY;BYDAY=MO,WE,FR;COUNT=6`. Given a seed date (the
first occurrence of the recurring item) and a query window, an [`Expansion`]
produces the occurrences of the rule that fall within that window:

```
use occur::{DateValue, RecurrenceRule};

let rule: RecurrenceRule = "FREQ=MONTHLY;BYMONTHDAY=-1;COUNT=3".parse()?;
let seed: DateValue = "20240101".parse()?;
let end: DateValue = "20250101".parse()?;
let dates = rule.dates(&seed, &seed, &end);
let got: Vec<String> = dates.iter().map(|d| d.to_string()).collect();
assert_eq!(got, vec!["20240131", "20240229", "20240331"]);

# Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
```

The pieces, from the bottom up:

* [`DateValue`] is an immutable date or datetime with a zone mode.
* [`RecurrenceRule`] is the structured rule.
* [`Expander`] computes the candidates for a single period of a rule.
* [`Expansion`] and [`Occurrences`] drive an expander across periods,
  applying the seed, window and COUNT/UNTIL terminators.
*/

pub use crate::{
    date::{DateValue, Granularity, ZoneMode},
    error::{InvalidRuleError, InvalidRuleErrorKind},
    expand::Expander,
    iter::{DEFAULT_MAX_PERIODS, Expansion, Occurrences},
    rule::{
        ByWeekday, Frequency, IntoByWeekdayIter, IntoI8Iter, IntoI16Iter,
        IntoI32Iter, RecurrenceRule, RecurrenceRuleBuilder, Terminator,
    },
};

mod date;
mod error;
mod expand;
mod iter;
mod rule;
mod weekdate;
