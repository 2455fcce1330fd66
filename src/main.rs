use std::{
    env,
    io::{ErrorKind, Write},
    process::ExitCode,
};

mod args;
mod cmd;
mod logger;
mod style;

fn main() -> ExitCode {
    let Err(err) = run() else { return ExitCode::SUCCESS };
    let root = err.root_cause();
    if let Some(help) = root.downcast_ref::<args::Help>() {
        writeln!(&mut std::io::stdout(), "{help}").unwrap();
        return ExitCode::SUCCESS;
    }
    if let Some(version) = root.downcast_ref::<args::Version>() {
        writeln!(&mut std::io::stdout(), "{version}").unwrap();
        return ExitCode::SUCCESS;
    }
    // A closed stdout (e.g., `occur expand ... | head`) isn't a failure.
    // Rust ignores SIGPIPE, so it shows up here as an I/O error instead.
    if is_broken_pipe(&err) {
        return ExitCode::SUCCESS;
    }
    let backtrace = env::var("RUST_BACKTRACE").is_ok_and(|v| v == "1")
        && env::var("RUST_LIB_BACKTRACE").map_or(true, |v| v == "1");
    if backtrace {
        writeln!(&mut std::io::stderr(), "{err:?}").unwrap();
    } else {
        writeln!(&mut std::io::stderr(), "{err:#}").unwrap();
    }
    ExitCode::FAILURE
}

fn run() -> anyhow::Result<()> {
    let level = env::var("OCCUR_LOG").unwrap_or_default();
    let level = match &*level {
        "" => log::LevelFilter::Off,
        level => match level.parse::<log::LevelFilter>() {
            Ok(level) => level,
            Err(_) => anyhow::bail!("unrecognized log level '{level}'"),
        },
    };
    log::set_max_level(level);
    logger::Logger::init()?;
    cmd::run(&mut lexopt::Parser::from_env())
}

fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        if let Some(err) = cause.downcast_ref::<std::io::Error>() {
            return err.kind() == ErrorKind::BrokenPipe;
        }
        // `serde_json` wraps the I/O errors it hits while writing.
        if let Some(err) = cause.downcast_ref::<serde_json::Error>() {
            return err.io_error_kind() == Some(ErrorKind::BrokenPipe);
        }
        false
    })
}
