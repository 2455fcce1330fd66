use occur::Expander;

use crate::args::{self, flags, positional};

const USAGE: &'static str = r#"
Print the candidates a recurrence rule generates for a single period.

The period is the one containing the given cursor, e.g., its month for
FREQ=MONTHLY. Candidates are every date produced by the rule's BY* parts, in
ascending order. Unlike `occur expand`, the rule's COUNT and UNTIL are not
applied and no seed is involved. This is mostly useful for understanding why
a rule does or doesn't produce a particular date.

USAGE:
    occur candidates <rule> <cursor>

TIP:
    use -h for short docs and --help for long docs

EXAMPLES:
    Print the second Tuesday and last Friday of a month:

        $ occur candidates 'FREQ=MONTHLY;BYDAY=2TU,-1FR' 20240315
        20240312
        20240329

    %snip-start%

    BYDAY filters the days selected by BYMONTHDAY, so this prints nothing
    in a month where the 13th isn't a Friday:

        $ occur candidates 'FREQ=MONTHLY;BYMONTHDAY=13;BYDAY=FR' 20240301
        $ occur candidates 'FREQ=MONTHLY;BYMONTHDAY=13;BYDAY=FR' 20240901
        20240913

    %snip-end%
REQUIRED ARGUMENTS:
%args%
OPTIONS:
%flags%
"#;

pub fn run(p: &mut lexopt::Parser) -> anyhow::Result<()> {
    let mut rule = positional::Rule::default();
    let mut cursor = positional::Date::cursor();
    let mut output = flags::Output::default();
    args::configure(p, USAGE, &mut [&mut rule, &mut cursor, &mut output])?;

    let expander = Expander::new(rule.get()?);
    let mut wtr = std::io::stdout().lock();
    for date in expander.expand(cursor.get()?) {
        output.write(&mut wtr, &date)?;
    }
    Ok(())
}
