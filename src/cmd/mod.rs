mod candidates;
mod expand;
mod fmt;

const USAGE: &'static str = "\
Expand RFC 5545 recurrence rules into the dates they describe.

USAGE:
    occur <command> ...

COMMANDS:
    candidates  Print the candidates a rule generates for a single period
    expand      Print the occurrences of a rule within a window
    fmt         Print recurrence rules in their canonical form
";

pub fn run(p: &mut lexopt::Parser) -> anyhow::Result<()> {
    let cmd = crate::args::next_as_command(USAGE, p)?;
    log::debug!("running command `{cmd}`");
    match &*cmd {
        "candidates" => candidates::run(p),
        "expand" => expand::run(p),
        "fmt" => fmt::run(p),
        unk => anyhow::bail!("unrecognized command '{}'", unk),
    }
}
