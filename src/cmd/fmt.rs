use std::io::Write;

use crate::args::{self, positional};

const USAGE: &'static str = r#"
Print recurrence rules in their canonical form.

Each rule is parsed and printed back out. Parts are printed in a fixed order,
part names are uppercased, UNTIL is converted to UTC and INTERVAL=1 is kept
only when it was given. Invalid rules are reported as errors.

USAGE:
    occur fmt [<rule> ...]

TIP:
    use -h for short docs and --help for long docs

EXAMPLES:
    Normalize a rule:

        $ occur fmt 'rrule:count=3;byday=mo,fr;freq=weekly'
        FREQ=WEEKLY;COUNT=3;BYDAY=MO,FR

    %snip-start%

    Rules are read from stdin when none are given:

        $ printf 'FREQ=DAILY\nfreq=yearly;bymonth=3\n' | occur fmt
        FREQ=DAILY
        FREQ=YEARLY;BYMONTH=3

    %snip-end%
ARGUMENTS:
%args%
OPTIONS:
%flags%
"#;

pub fn run(p: &mut lexopt::Parser) -> anyhow::Result<()> {
    let mut rules = positional::Rules::default();
    args::configure(p, USAGE, &mut [&mut rules])?;

    let mut wtr = std::io::stdout().lock();
    rules.try_for_each(|rule| {
        writeln!(wtr, "{rule}")?;
        Ok(())
    })
}
