use occur::Expansion;

use crate::args::{self, flags, positional};

const USAGE: &'static str = r#"
Print the occurrences of a recurrence rule within a window.

The rule is expanded forward from the seed, which is the first occurrence of
the recurring item. Only occurrences in the window `[start, end)` are printed.
The start defaults to the seed. Without an end, occurrences are printed as
they're found until the rule's COUNT or UNTIL is exhausted.

USAGE:
    occur expand <rule> <seed>

TIP:
    use -h for short docs and --help for long docs

EXAMPLES:
    Print the last day of the month, three times:

        $ occur expand 'FREQ=MONTHLY;BYMONTHDAY=-1;COUNT=3' 20240101
        20240131
        20240229
        20240331

    %snip-start%

    Print every Monday, Wednesday and Friday at 09:00 UTC in the first two
    weeks of 2024:

        $ occur expand 'FREQ=WEEKLY;BYDAY=MO,WE,FR' 20240101T090000Z \
            -e 20240115
        20240101T090000Z
        20240103T090000Z
        20240105T090000Z
        20240108T090000Z
        20240110T090000Z
        20240112T090000Z

    Occurrences before the window still count toward COUNT:

        $ occur expand 'FREQ=DAILY;COUNT=5' 20240101 -s 20240103
        20240103
        20240104
        20240105

    Print the last work day of each month in 2024 as JSON:

        $ occur expand 'FREQ=MONTHLY;BYDAY=MO,TU,WE,TH,FR;BYSETPOS=-1' \
            20240101T170000Z -e 20240401 --json
        {"value":"20240131T170000Z","instant":"2024-01-31T17:00:00Z"}
        {"value":"20240229T170000Z","instant":"2024-02-29T17:00:00Z"}
        {"value":"20240329T170000Z","instant":"2024-03-29T17:00:00Z"}

    %snip-end%
REQUIRED ARGUMENTS:
%args%
OPTIONS:
%flags%
"#;

pub fn run(p: &mut lexopt::Parser) -> anyhow::Result<()> {
    let mut rule = positional::Rule::default();
    let mut seed = positional::Date::seed();
    let mut window = flags::Window::default();
    let mut max_periods = flags::MaxPeriods::default();
    let mut output = flags::Output::default();
    args::configure(
        p,
        USAGE,
        &mut [
            &mut rule,
            &mut seed,
            &mut window,
            &mut max_periods,
            &mut output,
        ],
    )?;

    let (rule, seed) = (rule.get()?, seed.get()?);
    let expansion = Expansion::new(rule, seed.clone())
        .start(window.start(seed))
        .end(window.end())
        .max_periods(max_periods.get()?);
    log::debug!("expanding `{rule}` from {seed}");

    let mut wtr = std::io::stdout().lock();
    if window.end().is_some() {
        for date in expansion.to_vec() {
            output.write(&mut wtr, &date)?;
        }
    } else {
        // Unbounded windows are streamed, since there may be no end.
        for date in expansion.iter() {
            output.write(&mut wtr, &date)?;
        }
    }
    Ok(())
}
