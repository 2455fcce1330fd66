// A minimal logger for the `log` crate. Records go to stderr with a UTC
// timestamp, the level and the source location. Filtering is done entirely
// via `log::set_max_level`.

use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use log::Log;

use crate::style::Theme;

/// A logger that writes every record it receives to stderr.
#[derive(Debug)]
pub struct Logger(());

impl Logger {
    /// Install a new logger as the global logger.
    ///
    /// This returns an error if a global logger has already been set.
    pub fn init() -> Result<&'static Logger, log::SetLoggerError> {
        static LOGGER: Logger = Logger(());
        log::set_logger(&LOGGER)?;
        Ok(&LOGGER)
    }
}

impl Log for Logger {
    fn enabled(&self, _: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        // Formatting a timestamp doesn't log anything in Jiff, so this can't
        // recurse back into the logger.
        let theme = Theme::stderr();
        let now = theme.highlight(jiff::Timestamp::now());
        let level = theme.level(record.level());
        match (record.file(), record.line()) {
            (Some(file), Some(line)) => {
                eprintln!(
                    "{now}|{level}|{}:{line}: {}",
                    relative(file),
                    record.args(),
                );
            }
            (Some(file), None) => {
                let file = relative(file);
                eprintln!("{now}|{level}|{file}: {}", record.args());
            }
            _ => eprintln!("{now}|{level}: {}", record.args()),
        }
    }

    fn flush(&self) {}
}

fn relative(path: &str) -> &str {
    let Some(cwd) = cwd() else { return path };
    let Ok(relative) = Path::new(path).strip_prefix(cwd) else { return path };
    relative.to_str().unwrap_or(path)
}

fn cwd() -> Option<&'static Path> {
    static CWD: LazyLock<Option<PathBuf>> =
        LazyLock::new(|| std::env::current_dir().ok());
    CWD.as_deref()
}
