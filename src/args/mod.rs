use std::{
    ffi::OsString,
    fmt::{Debug, Display, Write},
    str::FromStr,
    sync::LazyLock,
};

use {
    anyhow::Context,
    lexopt::{Arg, Parser, ValueExt},
    regex::Regex,
};

pub mod flags;
pub mod positional;

/// A piece of CLI configuration that knows how to consume some subset of
/// flags and positional arguments.
pub trait Configurable: Debug {
    /// Attempt to consume `arg`, pulling its value from `p` if necessary.
    ///
    /// Returns `false` when `arg` isn't recognized, so that other targets
    /// may be asked.
    fn configure(
        &mut self,
        p: &mut Parser,
        arg: &mut Arg,
    ) -> anyhow::Result<bool>;

    /// Documentation for every flag and argument this target consumes.
    fn usage(&self) -> &[Usage] {
        &[]
    }
}

/// Feed every remaining argument in `p` to the first of `targets` that
/// accepts it.
///
/// `-h` and `--help` are intercepted here and turned into a `Help` error
/// built from `usage`. The `%args%` and `%flags%` placeholders in `usage`
/// are replaced with the documentation collected from `targets`.
pub fn configure(
    p: &mut Parser,
    usage: &str,
    targets: &mut [&mut dyn Configurable],
) -> anyhow::Result<()> {
    while let Some(arg) = p.next()? {
        let mut owned = match arg {
            Arg::Short('h') => {
                return Err(Help::render(usage, targets, false).into());
            }
            Arg::Long("help") => {
                return Err(Help::render(usage, targets, true).into());
            }
            Arg::Short(c) => OwnedArg::Short(c),
            Arg::Long(name) => OwnedArg::Long(name.to_string()),
            Arg::Value(value) => OwnedArg::Value(value),
        };
        let mut arg = owned.as_arg();
        if !try_targets(p, targets, &mut arg)? {
            return Err(arg.unexpected().into());
        }
    }
    Ok(())
}

fn try_targets(
    p: &mut Parser,
    targets: &mut [&mut dyn Configurable],
    arg: &mut Arg,
) -> anyhow::Result<bool> {
    for target in targets.iter_mut() {
        if target.configure(p, arg)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// An argument that doesn't borrow from the parser.
///
/// Targets need `&mut Parser` to read flag values, so the long flag name
/// can't keep borrowing from it.
enum OwnedArg {
    Short(char),
    Long(String),
    Value(OsString),
}

impl OwnedArg {
    fn as_arg(&mut self) -> Arg<'_> {
        match *self {
            OwnedArg::Short(c) => Arg::Short(c),
            OwnedArg::Long(ref name) => Arg::Long(name),
            OwnedArg::Value(ref mut value) => {
                Arg::Value(std::mem::take(value))
            }
        }
    }
}

/// Reads the next argument as a command name.
///
/// With no argument at all, the usage is returned as an error. `-h/--help`
/// and `--version` are turned into `Help` and `Version` errors.
pub fn next_as_command(usage: &str, p: &mut Parser) -> anyhow::Result<String> {
    let usage = usage.trim();
    let Some(arg) = p.next()? else { anyhow::bail!("{usage}") };
    match arg {
        Arg::Value(cmd) => Ok(cmd.string()?),
        Arg::Short('h') | Arg::Long("help") => {
            Err(Help(usage.to_string()).into())
        }
        Arg::Long("version") => Err(Version.into()),
        arg => Err(arg.unexpected().into()),
    }
}

/// Reads the value of the current flag and parses it into a `T`.
///
/// Errors are tagged with `flag_name`.
pub fn parse<T>(p: &mut Parser, flag_name: &'static str) -> anyhow::Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: Display + Debug + Send + Sync + 'static,
{
    let value = p.value().context(flag_name)?;
    let value = value.string().context(flag_name)?;
    // `Error::msg` since `T::Err` may be an `anyhow::Error`, which doesn't
    // implement `std::error::Error`.
    value.parse().map_err(|err| anyhow::Error::msg(err).context(flag_name))
}

/// Documentation for a single flag or positional argument.
#[derive(Clone, Copy, Debug)]
pub struct Usage {
    /// `false` when this documents a required positional argument.
    pub flag: bool,
    /// How the flag is written, e.g., `-e/--end <datetime>`.
    pub format: &'static str,
    /// A one line description.
    pub short: &'static str,
    /// The full description. Paragraphs are separated by blank lines.
    pub long: &'static str,
}

impl Usage {
    pub const fn flag(
        format: &'static str,
        short: &'static str,
        long: &'static str,
    ) -> Usage {
        Usage { flag: true, format, short, long }
    }

    pub const fn arg(
        format: &'static str,
        short: &'static str,
        long: &'static str,
    ) -> Usage {
        Usage { flag: false, format, short, long }
    }

    /// Renders `usages` as an aligned two column table of formats and short
    /// descriptions.
    pub fn short(usages: &[Usage]) -> String {
        let width = usages.iter().map(|u| u.format.len()).max().unwrap_or(0);
        let mut out = String::new();
        for usage in usages.iter() {
            let _ = writeln!(
                out,
                "    {format:width$}  {short}",
                format = usage.format,
                short = usage.short,
            );
        }
        out
    }

    /// Renders each of `usages` as its format followed by its long
    /// description, indented and wrapped to 79 columns.
    pub fn long(usages: &[Usage]) -> String {
        let indent = " ".repeat(8);
        let wrap = textwrap::Options::new(79)
            .initial_indent(&indent)
            .subsequent_indent(&indent);
        let mut sections = vec![];
        for usage in usages.iter() {
            let mut section = format!("    {}\n", usage.format);
            let paragraphs = usage
                .long
                .trim()
                .split("\n\n")
                .map(|para| textwrap::fill(&para.replace('\n', " "), &wrap))
                .collect::<Vec<String>>();
            section.push_str(&paragraphs.join("\n\n"));
            section.push('\n');
            sections.push(section);
        }
        sections.join("\n")
    }
}

/// An error carrying `-h/--help` output.
///
/// `main` downcasts to this and prints it to stdout with a success exit
/// code.
#[derive(Debug)]
pub struct Help(String);

impl Help {
    const USAGE: Usage = Usage::flag(
        "-h/--help",
        "Print help output.",
        r#"
Print help output.

The short flag, -h, prints one line per flag. The long flag, --help, prints
the complete documentation for every flag and argument, along with any
extended examples.
"#,
    );

    /// Builds the help output for a command from its usage template.
    ///
    /// Anything between `%snip-start%` and `%snip-end%` is only shown in the
    /// long form.
    fn render(
        usage: &str,
        targets: &[&mut dyn Configurable],
        long: bool,
    ) -> Help {
        static SNIPPED: LazyLock<Regex> = LazyLock::new(|| {
            let re = r"(?m)^\s*%snip-start%\p{any}*?%snip-end%\s*$";
            Regex::new(re).unwrap()
        });
        static MARKERS: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"(?m)^\s*%snip-(start|end)%\s*$").unwrap()
        });

        let mut args = vec![];
        // Help and version are accepted everywhere.
        let mut flags = vec![Help::USAGE, Version::USAGE];
        for target in targets.iter() {
            for &usage in target.usage() {
                if usage.flag {
                    flags.push(usage);
                } else {
                    args.push(usage);
                }
            }
        }
        // Sort flags by their long name, if present.
        flags.sort_by_key(|u| {
            u.format.split_once('/').map_or(u.format, |(_, long)| long)
        });
        let (usage, args, flags) = if long {
            let usage = MARKERS.replace_all(usage, "");
            (usage, Usage::long(&args), Usage::long(&flags))
        } else {
            let usage = SNIPPED.replace_all(usage, "");
            (usage, Usage::short(&args), Usage::short(&flags))
        };
        let usage = usage.replace("%args%", &args).replace("%flags%", &flags);
        Help(usage.trim().to_string())
    }
}

impl std::fmt::Display for Help {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Help {}

/// An error carrying `--version` output.
///
/// Like `Help`, this is printed to stdout by `main`.
#[derive(Debug)]
pub struct Version;

impl Version {
    const USAGE: Usage = Usage::flag(
        "--version",
        "Print the version of occur.",
        r#"
Print the version of occur, along with the git revision it was built from
when known.
"#,
    );
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let semver = env!("CARGO_PKG_VERSION");
        match option_env!("OCCUR_BUILD_GIT_HASH") {
            None => write!(f, "occur {semver}"),
            Some(hash) => write!(f, "occur {semver} (rev {hash})"),
        }
    }
}

impl std::error::Error for Version {}
